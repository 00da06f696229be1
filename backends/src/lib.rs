//! CLI session drivers for Duet.
//!
//! Each agent is a real coding CLI (`claude`, `gemini`) running inside a
//! detached tmux session. There is no API integration: prompts are pasted
//! into the pane the way a user would type them, and replies are read back
//! by polling `tmux capture-pane` and parsing the rendered text.
//!
//! The crate splits into three layers:
//!
//! - [`tmux`] - thin async wrapper over the tmux binary
//! - [`claude`] / [`gemini`] - per-CLI session drivers plus the pure
//!   functions that extract replies, tool results, and confirmation
//!   context from captured panes
//! - [`probe`] - filesystem lookups behind a trait so parsers stay
//!   testable

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod boxes;

pub mod claude;
pub mod gemini;
pub mod probe;
pub mod tmux;

pub use claude::{ClaudeParser, ClaudeSession};
pub use gemini::{GeminiParser, GeminiSession};
pub use probe::{PathProbe, SystemProbe};
pub use tmux::{TmuxError, TmuxSession};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use duet_types::{AiTarget, ConfirmationDecision, ParsedConfirmation, ParsedResponse};
use thiserror::Error;
use tokio::sync::mpsc;

/// Sender half used to stream partial replies while a pane is still
/// producing output. Each message is a full replacement, not a delta.
pub type StreamSink = mpsc::UnboundedSender<String>;

/// Default time budget for one prompt round-trip.
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(720);

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SessionError {
    /// The CLI never reached its input prompt after launch. Usually an
    /// auth problem rather than a crash.
    #[error("{} CLI did not start. Check: {} auth status", .0.display_name(), .0.binary())]
    StartTimeout(AiTarget),

    /// The tmux session disappeared underneath us.
    #[error("{} session is gone. Use /restart to relaunch it", .0.display_name())]
    SessionDead(AiTarget),

    /// No reply before the caller's deadline.
    #[error("timed out waiting for a reply")]
    ResponseTimeout,

    /// The user interrupted the in-flight request.
    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Tmux(#[from] TmuxError),
}

impl SessionError {
    /// Whether the session itself is still usable after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ResponseTimeout | Self::Interrupted)
    }
}

// ============================================================================
// Ask Outcomes
// ============================================================================

/// What a prompt round-trip produced.
///
/// A turn either runs to completion or parks on a permission prompt that
/// the user must approve before the CLI will continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    /// The CLI finished its reply.
    Reply(ParsedResponse),
    /// The CLI is waiting for the user to approve a tool action.
    Confirmation(ParsedConfirmation),
}

impl AskOutcome {
    #[must_use]
    pub const fn is_confirmation(&self) -> bool {
        matches!(self, Self::Confirmation(_))
    }
}

// ============================================================================
// Interrupts
// ============================================================================

/// Cross-task interrupt signal.
///
/// Raised from the UI thread, consumed inside a session's poll loop. The
/// session sends Escape to its pane and returns [`SessionError::Interrupted`]
/// so tmux state and driver state stay in sync; aborting the future instead
/// would leave the CLI mid-reply with nobody reading it.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the in-flight ask stop at its next poll.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Consume the signal. Returns true at most once per [`raise`].
    ///
    /// [`raise`]: InterruptFlag::raise
    #[must_use]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Session Dispatch
// ============================================================================

/// A running CLI session for one target, whichever CLI that is.
///
/// Plain enum dispatch: there are exactly two CLIs and their drivers share
/// a method surface, so a trait object buys nothing here.
#[derive(Debug)]
pub enum CliSession {
    Claude(ClaudeSession),
    Gemini(GeminiSession),
}

impl CliSession {
    #[must_use]
    pub fn launch(target: AiTarget, model: &str, interrupt: InterruptFlag) -> Self {
        match target {
            AiTarget::Claude => Self::Claude(ClaudeSession::new(model, interrupt)),
            AiTarget::Gemini => Self::Gemini(GeminiSession::new(model, interrupt)),
        }
    }

    #[must_use]
    pub const fn target(&self) -> AiTarget {
        match self {
            Self::Claude(_) => AiTarget::Claude,
            Self::Gemini(_) => AiTarget::Gemini,
        }
    }

    /// Tmux session name, e.g. `claude_1a2b3c4d`.
    #[must_use]
    pub fn session_name(&self) -> &str {
        match self {
            Self::Claude(session) => session.session_name(),
            Self::Gemini(session) => session.session_name(),
        }
    }

    /// Launch the CLI inside a fresh tmux session and wait for its prompt.
    pub async fn start(&self) -> Result<(), SessionError> {
        match self {
            Self::Claude(session) => session.start().await,
            Self::Gemini(session) => session.start().await,
        }
    }

    pub async fn is_alive(&self) -> bool {
        match self {
            Self::Claude(session) => session.is_alive().await,
            Self::Gemini(session) => session.is_alive().await,
        }
    }

    /// Paste `prompt` into the pane and poll until the reply completes or
    /// a permission prompt appears.
    pub async fn ask(
        &self,
        prompt: &str,
        timeout: Duration,
        updates: Option<&StreamSink>,
    ) -> Result<AskOutcome, SessionError> {
        match self {
            Self::Claude(session) => session.ask(prompt, timeout, updates).await,
            Self::Gemini(session) => session.ask(prompt, timeout, updates).await,
        }
    }

    /// Resume polling after a confirmation was answered.
    pub async fn wait_response(
        &self,
        timeout: Duration,
        updates: Option<&StreamSink>,
    ) -> Result<AskOutcome, SessionError> {
        match self {
            Self::Claude(session) => session.wait_response(timeout, updates).await,
            Self::Gemini(session) => session.wait_response(timeout, updates).await,
        }
    }

    /// Answer a pending permission prompt in the pane.
    pub async fn respond_confirmation(
        &self,
        decision: ConfirmationDecision,
    ) -> Result<(), SessionError> {
        match self {
            Self::Claude(session) => session.respond_confirmation(decision).await,
            Self::Gemini(session) => session.respond_confirmation(decision).await,
        }
    }

    /// Exit the CLI politely, then kill the tmux session. Best effort.
    pub async fn close(&self) {
        match self {
            Self::Claude(session) => session.close().await,
            Self::Gemini(session) => session.close().await,
        }
    }
}
