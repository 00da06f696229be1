//! Driver for the `gemini` CLI.

pub mod extract;
mod parser;

pub use parser::GeminiParser;

use std::time::Duration;

use duet_types::{
    AiTarget, ConfirmationDecision, ParsedConfirmation, ParsedResponse, STREAM_CURSOR,
};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};
use uuid::Uuid;

use crate::tmux::TmuxSession;
use crate::{AskOutcome, InterruptFlag, SessionError, StreamSink};

// Wider than the claude pane. Gemini hard-wraps long diff lines, and a
// wrapped continuation loses its line-number prefix.
const PANE_WIDTH: u16 = 200;
const PANE_HEIGHT: u16 = 50;

const STARTUP_POLLS: u32 = 15;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const PASTE_SETTLE: Duration = Duration::from_millis(300);
/// Gemini repaints its final frame later than claude, so the settle before
/// the definitive capture is longer.
const COMPLETION_SETTLE: Duration = Duration::from_secs(1);

/// One `gemini` process in a detached tmux session.
#[derive(Debug)]
pub struct GeminiSession {
    tmux: TmuxSession,
    model: String,
    interrupt: InterruptFlag,
}

impl GeminiSession {
    #[must_use]
    pub fn new(model: &str, interrupt: InterruptFlag) -> Self {
        let name = format!("gemini_{}", Uuid::new_v4().simple());
        Self {
            tmux: TmuxSession::new(name),
            model: model.to_owned(),
            interrupt,
        }
    }

    #[must_use]
    pub fn session_name(&self) -> &str {
        self.tmux.name()
    }

    /// Launch the CLI and wait for its input hint.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.tmux.kill().await;
        // SHELL is pinned so the user's shell config cannot pollute scraped
        // command output with banners or hooks.
        self.tmux
            .spawn(
                PANE_WIDTH,
                PANE_HEIGHT,
                &["env", "SHELL=/bin/bash", "gemini", "--model", &self.model],
            )
            .await?;

        for _ in 0..STARTUP_POLLS {
            sleep(POLL_INTERVAL).await;
            let pane = self.tmux.capture().await?;
            if pane.contains(extract::READY_HINT) {
                info!(session = self.tmux.name(), model = %self.model, "gemini ready");
                return Ok(());
            }
        }
        Err(SessionError::StartTimeout(AiTarget::Gemini))
    }

    pub async fn is_alive(&self) -> bool {
        self.tmux.exists().await
    }

    /// Paste `prompt` into the pane and poll until a new `✦` reply settles
    /// or a confirmation dialog appears.
    pub async fn ask(
        &self,
        prompt: &str,
        timeout: Duration,
        updates: Option<&StreamSink>,
    ) -> Result<AskOutcome, SessionError> {
        if !self.tmux.exists().await {
            return Err(SessionError::SessionDead(AiTarget::Gemini));
        }

        let before = self.tmux.capture_scrollback().await?;
        let markers_before = extract::count_markers(&before);

        self.tmux.paste_text(prompt).await?;
        sleep(PASTE_SETTLE).await;
        self.tmux.send_key("Enter").await?;

        self.poll_outcome(timeout, updates, markers_before, false)
            .await
    }

    /// Resume polling after a confirmation was answered.
    ///
    /// The reply being resumed already has its marker on screen, so the
    /// skip count drops by one and completion does not require a new one.
    pub async fn wait_response(
        &self,
        timeout: Duration,
        updates: Option<&StreamSink>,
    ) -> Result<AskOutcome, SessionError> {
        let before = self.tmux.capture_scrollback().await?;
        let skip = extract::count_markers(&before).saturating_sub(1);
        self.poll_outcome(timeout, updates, skip, true).await
    }

    /// Answer the pending confirmation dialog.
    pub async fn respond_confirmation(
        &self,
        decision: ConfirmationDecision,
    ) -> Result<(), SessionError> {
        let key = if decision.is_approved() {
            "Enter"
        } else {
            "Escape"
        };
        self.tmux.send_key(key).await?;
        Ok(())
    }

    /// Exit the CLI politely, then kill the tmux session. Best effort.
    pub async fn close(&self) {
        let _ = self.tmux.send_keys(&["/exit", "Enter"]).await;
        sleep(Duration::from_secs(1)).await;
        self.tmux.kill().await;
    }

    async fn poll_outcome(
        &self,
        timeout: Duration,
        updates: Option<&StreamSink>,
        skip: usize,
        after_confirmation: bool,
    ) -> Result<AskOutcome, SessionError> {
        let deadline = Instant::now() + timeout;
        let mut last_pane = String::new();
        let mut last_partial = String::new();

        while Instant::now() < deadline {
            sleep(POLL_INTERVAL).await;

            if self.interrupt.take() {
                let _ = self.tmux.send_key("Escape").await;
                return Err(SessionError::Interrupted);
            }

            let pane = self.tmux.capture_scrollback().await?;

            if let Some(sink) = updates {
                // Unchanged pane means the CLI is thinking; skip the parse.
                if pane != last_pane {
                    let partial = extract::extract_response(&pane, skip);
                    if after_confirmation {
                        // The pre-confirmation partial is already on screen;
                        // only forward genuinely new text.
                        if !partial.is_empty() && partial != last_partial {
                            let _ = sink.send(format!("{partial}{STREAM_CURSOR}"));
                            last_partial = partial;
                        }
                    } else {
                        let _ = sink.send(format!("{partial}{STREAM_CURSOR}"));
                    }
                    last_pane.clone_from(&pane);
                }
            }

            if extract::is_confirmation(&pane) {
                let mut confirmation =
                    ParsedConfirmation::new(extract::confirmation_context(&pane));
                if after_confirmation {
                    // A chained tool may have run between the two dialogs;
                    // keep its result so the chain does not lose it.
                    let prior = extract::extract_response(&pane, skip);
                    if !prior.is_empty() {
                        let (code, output) = extract::tool_result(&prior);
                        confirmation.prior_result =
                            Some(ParsedResponse::new(extract::strip_shell_marker(&prior)));
                        confirmation.prior_exit_code = code;
                        confirmation.prior_shell_output = output;
                    }
                }
                debug!(session = self.tmux.name(), "confirmation prompt detected");
                return Ok(AskOutcome::Confirmation(confirmation));
            }

            let marker_arrived = extract::count_markers(&pane) > skip;
            if (after_confirmation || marker_arrived) && extract::is_idle(&pane) {
                sleep(COMPLETION_SETTLE).await;
                let settled = self.tmux.capture_scrollback().await?;
                let raw = extract::extract_response(&settled, skip);
                let (code, output) = extract::tool_result(&raw);
                let mut reply = ParsedResponse::new(extract::strip_shell_marker(&raw));
                reply.exit_code = code;
                reply.shell_output = output;
                return Ok(AskOutcome::Reply(reply));
            }
        }

        Err(SessionError::ResponseTimeout)
    }
}
