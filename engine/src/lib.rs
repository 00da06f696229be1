//! Core engine for Duet - debate state machine and session orchestration.
//!
//! This crate contains the [`App`] state machine without TUI dependencies,
//! providing:
//!
//! - **Application state**: [`App`] owns the transcript, history, and input
//! - **Session orchestration**: [`Moderator`] drives both CLI sessions and
//!   surfaces their turns as [`EngineEvent`]s
//! - **Configuration**: [`DuetConfig`] loaded from `~/.duet/config.toml`
//! - **Health checks**: [`run_checks`] behind `duet doctor`
//!
//! The TUI layer (`duet_tui`) reads state from `App` and forwards input back
//! to it. No rendering logic lives in this crate.

mod config;
mod deps;
mod moderator;

pub mod app;

pub use app::{
    App, AtCompleter, CommandSpec, DisplayItem, DraftInput, LiveTurn, MAX_SUGGESTIONS, Mode,
    PendingApproval, ScrollState, command_specs,
};
pub use config::{
    ConfigError, DEFAULT_CLAUDE_MODEL, DEFAULT_GEMINI_MODEL, DuetConfig, config_path,
};
pub use deps::{
    CheckResult, CheckStatus, RunOutput, SystemTools, ToolInspector, run_checks, startup_warnings,
};
pub use moderator::{
    AgentState, DispatchError, EngineEvent, Moderator, action_note, clean_reply_text,
};
