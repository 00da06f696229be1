//! Core domain types for Duet.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod action;
mod sanitize;

pub use action::{DiffLine, DiffSign, ParsedConfirmation, ParsedResponse, ToolAction, ToolKind};
pub use sanitize::sanitize_terminal_text;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Trailing glyph appended to streamed partial replies while a pane is
/// still producing output. Stripped before anything enters history.
pub const STREAM_CURSOR: &str = " ▌";

/// Marker separating assistant prose from captured shell output inside a
/// raw extracted reply. Stripped from anything shown to the user.
pub const SHELL_OUTPUT_MARKER: &str = "__SHELL_OUTPUT__:";

// ============================================================================
// Routing Targets
// ============================================================================

/// A coding CLI the conversation can be routed to.
///
/// Each target maps to one binary on `$PATH` and one detached tmux session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiTarget {
    Claude,
    Gemini,
}

#[derive(Debug, Error)]
#[error("unknown target '{0}' (expected 'claude' or 'gemini')")]
pub struct TargetParseError(String);

impl AiTarget {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gemini => "gemini",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
        }
    }

    /// Binary name probed on `$PATH` and launched inside tmux.
    #[must_use]
    pub const fn binary(self) -> &'static str {
        self.as_str()
    }

    /// Glyph the CLI prints ahead of each of its replies. Used both for
    /// pane parsing and as the target's icon in the UI.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Claude => '●',
            Self::Gemini => '✦',
        }
    }

    /// Hotkey in the target selector.
    #[must_use]
    pub const fn hotkey(self) -> char {
        match self {
            Self::Claude => 'c',
            Self::Gemini => 'g',
        }
    }

    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::Claude, Self::Gemini]
    }

    pub fn parse(value: &str) -> Result<Self, TargetParseError> {
        match value.to_ascii_lowercase().as_str() {
            "claude" | "cc" => Ok(Self::Claude),
            "gemini" | "g" => Ok(Self::Gemini),
            other => Err(TargetParseError(other.to_owned())),
        }
    }
}

impl fmt::Display for AiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Chat Messages
// ============================================================================

/// Who produced a turn in the shared conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Claude,
    Gemini,
}

impl Speaker {
    /// Uppercase label used when turns are replayed into a prompt.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Claude => "CLAUDE",
            Self::Gemini => "GEMINI",
        }
    }

    #[must_use]
    pub const fn target(self) -> Option<AiTarget> {
        match self {
            Self::User => None,
            Self::Claude => Some(AiTarget::Claude),
            Self::Gemini => Some(AiTarget::Gemini),
        }
    }
}

impl From<AiTarget> for Speaker {
    fn from(target: AiTarget) -> Self {
        match target {
            AiTarget::Claude => Self::Claude,
            AiTarget::Gemini => Self::Gemini,
        }
    }
}

/// A single turn in the shared conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: SystemTime,
    /// Ephemeral turns render in the UI but never enter prompt context.
    pub ephemeral: bool,
}

impl ChatMessage {
    #[must_use]
    pub fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
            timestamp: SystemTime::now(),
            ephemeral: false,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, content)
    }

    #[must_use]
    pub fn from_target(target: AiTarget, content: impl Into<String>) -> Self {
        Self::new(target.into(), content)
    }

    #[must_use]
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

// ============================================================================
// Tool Confirmation
// ============================================================================

/// User verdict on a tool action a CLI is waiting to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    Approve,
    Reject,
}

impl ConfirmationDecision {
    #[must_use]
    pub const fn is_approved(self) -> bool {
        matches!(self, Self::Approve)
    }
}

// ============================================================================
// Display Preferences
// ============================================================================

/// Display preferences that flow from config into the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiOptions {
    /// Swap glyph markers and spinners for plain ASCII.
    pub ascii_only: bool,
    /// Brighter foreground palette for washed-out terminals.
    pub high_contrast: bool,
    /// Freeze the startup animation and spinners.
    pub reduced_motion: bool,
}

// ============================================================================
// Tests
// ============================================================================
