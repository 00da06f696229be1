//! Driver for the `claude` CLI.

pub mod extract;
mod parser;

pub use parser::ClaudeParser;

use std::time::Duration;

use duet_types::{
    AiTarget, ConfirmationDecision, ParsedConfirmation, ParsedResponse, STREAM_CURSOR,
};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};
use uuid::Uuid;

use crate::tmux::TmuxSession;
use crate::{AskOutcome, InterruptFlag, SessionError, StreamSink};

const PANE_WIDTH: u16 = 150;
const PANE_HEIGHT: u16 = 50;

/// One-second polls against the launched CLI until its prompt appears.
const STARTUP_POLLS: u32 = 15;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Pasted text needs a beat to land before Enter, or the CLI treats the
/// keypress as part of the paste.
const PASTE_SETTLE: Duration = Duration::from_millis(300);
/// Gap between prompt-ready detection and the final capture, so the last
/// frame has finished rendering.
const COMPLETION_SETTLE: Duration = Duration::from_millis(500);

/// Marker-line fingerprint of a capture.
///
/// The pane scrolls while the CLI works, so line indexes are worthless
/// across captures. A reply is new when the content of its `●` marker line
/// changes, or when the bullet count grows (a fresh reply can repeat the
/// previous one verbatim).
#[derive(Default)]
struct ReplyFingerprint {
    marker_line: String,
    marker_count: usize,
}

impl ReplyFingerprint {
    fn of(pane: &str) -> Self {
        let (_, idx) = extract::extract_response(pane);
        Self {
            marker_line: extract::marker_line(pane, idx),
            marker_count: extract::count_markers(pane),
        }
    }

    fn is_new(&self, other: &Self) -> bool {
        other.marker_line != self.marker_line || other.marker_count > self.marker_count
    }
}

/// One `claude` process in a detached tmux session.
#[derive(Debug)]
pub struct ClaudeSession {
    tmux: TmuxSession,
    model: String,
    interrupt: InterruptFlag,
}

impl ClaudeSession {
    #[must_use]
    pub fn new(model: &str, interrupt: InterruptFlag) -> Self {
        let name = format!("claude_{}", Uuid::new_v4().simple());
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

    /// Launch the CLI and wait for its input prompt.
    ///
    /// A first run shows a consent screen instead of the prompt; it is
    /// accepted (Down, Enter) and the wait continues.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.tmux.kill().await;
        self.tmux
            .spawn(
                PANE_WIDTH,
                PANE_HEIGHT,
                &[
                    "claude",
                    "--permission-mode",
                    "default",
                    "--model",
                    &self.model,
                ],
            )
            .await?;

        for _ in 0..STARTUP_POLLS {
            sleep(POLL_INTERVAL).await;
            let pane = self.tmux.capture().await?;
            if pane.contains("Yes, I accept") {
                debug!(session = self.tmux.name(), "accepting consent screen");
                self.tmux.send_key("Down").await?;
                sleep(Duration::from_millis(200)).await;
                self.tmux.send_key("Enter").await?;
                continue;
            }
            if pane.contains('>') {
                info!(session = self.tmux.name(), model = %self.model, "claude ready");
                return Ok(());
            }
        }
        Err(SessionError::StartTimeout(AiTarget::Claude))
    }

    pub async fn is_alive(&self) -> bool {
        self.tmux.exists().await
    }

    /// Paste `prompt` into the pane and poll until the reply completes or
    /// a permission prompt appears.
    pub async fn ask(
        &self,
        prompt: &str,
        timeout: Duration,
        updates: Option<&StreamSink>,
    ) -> Result<AskOutcome, SessionError> {
        if !self.tmux.exists().await {
            return Err(SessionError::SessionDead(AiTarget::Claude));
        }

        // Fingerprint before sending, so the poll loop can tell our reply
        // from whatever was already on screen.
        let before = self.tmux.capture_scrollback().await?;
        let baseline = ReplyFingerprint::of(&before);

        self.tmux.paste_text(prompt).await?;
        sleep(PASTE_SETTLE).await;
        self.tmux.send_key("Enter").await?;

        self.poll_outcome(timeout, updates, baseline, false).await
    }

    /// Resume polling after a confirmation was answered.
    ///
    /// Unlike [`ask`](ClaudeSession::ask), the outcome carries the approved
    /// tool's exit code and output, and a confirmation outcome keeps any
    /// result produced between the two prompts.
    pub async fn wait_response(
        &self,
        timeout: Duration,
        updates: Option<&StreamSink>,
    ) -> Result<AskOutcome, SessionError> {
        self.poll_outcome(timeout, updates, ReplyFingerprint::default(), true)
            .await
    }

    /// Answer the pending permission menu.
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
        mut baseline: ReplyFingerprint,
        after_confirmation: bool,
    ) -> Result<AskOutcome, SessionError> {
        let deadline = Instant::now() + timeout;
        let mut last_pane = String::new();

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
                    let (partial, idx) = extract::extract_response(&pane);
                    let current = ReplyFingerprint {
                        marker_line: extract::marker_line(&pane, idx),
                        marker_count: extract::count_markers(&pane),
                    };
                    if !partial.is_empty() && baseline.is_new(&current) {
                        let _ = sink.send(format!("{partial}{STREAM_CURSOR}"));
                        baseline = current;
                    }
                    last_pane.clone_from(&pane);
                }
            }

            if extract::is_confirmation(&pane) {
                let mut confirmation =
                    ParsedConfirmation::new(extract::confirmation_context(&pane));
                if after_confirmation {
                    // A tool may have completed between the two prompts;
                    // keep its result so the chain does not lose it.
                    let (prior, _) = extract::extract_response(&pane);
                    if prior.is_empty() {
                        let (code, output) = extract::first_tool_result(&pane);
                        confirmation.prior_exit_code = code;
                        confirmation.prior_shell_output = output;
                    } else {
                        confirmation.prior_result = Some(ParsedResponse::new(prior));
                    }
                }
                debug!(session = self.tmux.name(), "confirmation prompt detected");
                return Ok(AskOutcome::Confirmation(confirmation));
            }

            if extract::is_complete(&pane) {
                sleep(COMPLETION_SETTLE).await;
                let settled = self.tmux.capture_scrollback().await?;
                let (content, _) = extract::extract_response(&settled);
                let mut reply = ParsedResponse::new(content);
                if after_confirmation {
                    let (code, output) = extract::first_tool_result(&settled);
                    reply.exit_code = code;
                    reply.shell_output = output;
                }
                return Ok(AskOutcome::Reply(reply));
            }
        }

        Err(SessionError::ResponseTimeout)
    }
}
