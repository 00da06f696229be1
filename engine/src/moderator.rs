//! Session lifecycle and turn orchestration.
//!
//! The [`Moderator`] owns one [`CliSession`] per target plus the event
//! channel everything async reports into. Session work (startup, prompt
//! round-trips, confirmation answers, shell commands) runs on spawned
//! tasks; the UI loop drains [`EngineEvent`]s once per tick and never
//! blocks on tmux.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use duet_backends::{
    AskOutcome, ClaudeParser, CliSession, GeminiParser, InterruptFlag, SessionError, StreamSink,
};
use duet_types::{
    AiTarget, ConfirmationDecision, ParsedConfirmation, ParsedResponse, Speaker, ToolAction,
    sanitize_terminal_text, SHELL_OUTPUT_MARKER, STREAM_CURSOR,
};
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Wall-clock budget for a `!command` before it is killed.
const SHELL_TIMEOUT: Duration = Duration::from_secs(30);

/// Caps applied when an approved action is summarised into history.
const NOTE_DIFF_CAP: usize = 50;
const NOTE_OUTPUT_CAP: usize = 20;

static EXIT_CODE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Command exited with code:\s*\d+").unwrap());

// ============================================================================
// Events
// ============================================================================

/// Everything the async side can tell the UI loop.
#[derive(Debug)]
pub enum EngineEvent {
    /// The CLI reached its input prompt.
    SessionReady(AiTarget),
    /// The CLI never came up; the session is unusable.
    SessionFailed { target: AiTarget, error: String },
    /// A partial reply while the pane is still producing output. Each
    /// update replaces the previous one.
    StreamUpdate { target: AiTarget, text: String },
    /// The reply finished.
    TurnCompleted {
        target: AiTarget,
        response: ParsedResponse,
    },
    /// The CLI stopped on a permission prompt and waits for a verdict.
    ConfirmationNeeded {
        target: AiTarget,
        confirmation: ParsedConfirmation,
    },
    /// The turn ended without a reply. `recoverable` says whether the
    /// session can take another prompt.
    TurnFailed {
        target: AiTarget,
        error: String,
        recoverable: bool,
    },
    /// A `!command` finished.
    ShellFinished {
        command: String,
        output: String,
        exit_code: Option<i32>,
    },
    /// A `!command` could not run or ran out of time.
    ShellFailed { error: String },
}

// ============================================================================
// Agent State
// ============================================================================

/// Lifecycle of one CLI session as the moderator sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    /// Never started.
    Offline,
    /// Launched, waiting for the CLI's input prompt.
    Starting,
    Ready,
    Failed(String),
}

impl AgentState {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{} is not ready: {}", .0.display_name(), .1)]
    NotReady(AiTarget, String),
    #[error("{} is still working, interrupt it first", .0.display_name())]
    Busy(AiTarget),
}

#[derive(Debug)]
struct AgentHandle {
    session: Option<Arc<CliSession>>,
    interrupt: InterruptFlag,
    state: AgentState,
}

impl AgentHandle {
    fn new() -> Self {
        Self {
            session: None,
            interrupt: InterruptFlag::new(),
            state: AgentState::Offline,
        }
    }
}

// ============================================================================
// Moderator
// ============================================================================

/// Owns the two CLI sessions and runs their turns on background tasks.
///
/// One turn at a time across both targets: the debate is a conversation,
/// not a fan-out, and a single in-flight ask keeps interrupt and approval
/// state unambiguous.
pub struct Moderator {
    handles: HashMap<AiTarget, AgentHandle>,
    models: HashMap<AiTarget, String>,
    response_timeout: Duration,
    claude_parser: ClaudeParser,
    gemini_parser: GeminiParser,
    events: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    busy: Option<AiTarget>,
}

impl Moderator {
    #[must_use]
    pub fn new(config: &crate::DuetConfig) -> Self {
        let (events, events_rx) = mpsc::unbounded_channel();
        let mut handles = HashMap::new();
        let mut models = HashMap::new();
        for target in AiTarget::all() {
            handles.insert(target, AgentHandle::new());
            models.insert(target, config.model(target));
        }
        Self {
            handles,
            models,
            response_timeout: config.response_timeout(),
            claude_parser: ClaudeParser::system(),
            gemini_parser: GeminiParser::system(),
            events,
            events_rx,
            busy: None,
        }
    }

    /// Launch both CLIs in fresh tmux sessions.
    pub fn start_all(&mut self) {
        for target in AiTarget::all() {
            self.start_session(target);
        }
    }

    /// Relaunch one CLI, closing any previous session first.
    pub fn restart(&mut self, target: AiTarget) {
        if self.busy == Some(target) {
            self.busy = None;
        }
        self.start_session(target);
    }

    fn start_session(&mut self, target: AiTarget) {
        let model = self.models[&target].clone();
        let handle = self
            .handles
            .get_mut(&target)
            .unwrap_or_else(|| unreachable!("handle exists for every target"));

        if let Some(old) = handle.session.take() {
            tokio::spawn(async move { old.close().await });
        }
        // Fresh flag: a stale raise must not cancel the new session's
        // first ask.
        handle.interrupt = InterruptFlag::new();
        let session = Arc::new(CliSession::launch(target, &model, handle.interrupt.clone()));
        handle.session = Some(Arc::clone(&session));
        handle.state = AgentState::Starting;

        let tx = self.events.clone();
        tokio::spawn(async move {
            match session.start().await {
                Ok(()) => {
                    info!(target = target.as_str(), "session ready");
                    let _ = tx.send(EngineEvent::SessionReady(target));
                }
                Err(err) => {
                    warn!(target = target.as_str(), error = %err, "session failed to start");
                    let _ = tx.send(EngineEvent::SessionFailed {
                        target,
                        error: err.to_string(),
                    });
                }
            }
        });
    }

    /// Whether `target` could take a prompt right now.
    pub fn ensure_ready(&self, target: AiTarget) -> Result<(), DispatchError> {
        if let Some(active) = self.busy {
            return Err(DispatchError::Busy(active));
        }
        match &self.handle(target).state {
            AgentState::Ready => Ok(()),
            AgentState::Offline => Err(DispatchError::NotReady(
                target,
                "session was never started".to_owned(),
            )),
            AgentState::Starting => Err(DispatchError::NotReady(
                target,
                "session is still starting".to_owned(),
            )),
            AgentState::Failed(err) => Err(DispatchError::NotReady(target, err.clone())),
        }
    }

    /// Send a fully built prompt to `target` on a background task.
    pub fn dispatch(&mut self, target: AiTarget, prompt: String) -> Result<(), DispatchError> {
        self.ensure_ready(target)?;
        let session = self
            .handle(target)
            .session
            .clone()
            .ok_or_else(|| DispatchError::NotReady(target, "session was never started".to_owned()))?;

        self.busy = Some(target);
        let tx = self.events.clone();
        let timeout = self.response_timeout;
        tokio::spawn(async move {
            let stream = forward_stream(target, tx.clone());
            let outcome = session.ask(&prompt, timeout, Some(&stream)).await;
            drop(stream);
            let _ = tx.send(turn_event(target, outcome));
        });
        Ok(())
    }

    /// Answer the pending permission prompt. Approval keeps the turn
    /// alive and resumes polling; rejection ends it.
    pub fn respond(&mut self, target: AiTarget, decision: ConfirmationDecision) {
        let Some(session) = self.handle(target).session.clone() else {
            return;
        };
        let tx = self.events.clone();
        let timeout = self.response_timeout;

        if decision.is_approved() {
            self.busy = Some(target);
            tokio::spawn(async move {
                if let Err(err) = session.respond_confirmation(decision).await {
                    let _ = tx.send(EngineEvent::TurnFailed {
                        target,
                        recoverable: err.is_recoverable(),
                        error: err.to_string(),
                    });
                    return;
                }
                let stream = forward_stream(target, tx.clone());
                let outcome = session.wait_response(timeout, Some(&stream)).await;
                drop(stream);
                let _ = tx.send(turn_event(target, outcome));
            });
        } else {
            // Nothing to wait for after a rejection; polling again would
            // only capture the CLI's cancellation noise.
            self.busy = None;
            tokio::spawn(async move {
                if let Err(err) = session.respond_confirmation(decision).await {
                    let _ = tx.send(EngineEvent::TurnFailed {
                        target,
                        recoverable: err.is_recoverable(),
                        error: err.to_string(),
                    });
                }
            });
        }
    }

    /// Raise the interrupt flag for the in-flight turn, if any.
    pub fn interrupt(&self) -> Option<AiTarget> {
        let target = self.busy?;
        self.handle(target).interrupt.raise();
        Some(target)
    }

    /// Run a `!command` through the shell on a background task.
    pub fn run_shell(&self, command: String) {
        let tx = self.events.clone();
        tokio::spawn(async move {
            let event = shell_event(command).await;
            let _ = tx.send(event);
        });
    }

    /// Next pending event, if any. Also folds the event into moderator
    /// state (busy flag, per-session lifecycle) so callers cannot forget.
    pub fn try_event(&mut self) -> Option<EngineEvent> {
        let event = self.events_rx.try_recv().ok()?;
        self.observe(&event);
        Some(event)
    }

    fn observe(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::SessionReady(target) => {
                self.handle_mut(*target).state = AgentState::Ready;
            }
            EngineEvent::SessionFailed { target, error } => {
                self.handle_mut(*target).state = AgentState::Failed(error.clone());
                if self.busy == Some(*target) {
                    self.busy = None;
                }
            }
            EngineEvent::TurnCompleted { target, .. } => {
                if self.busy == Some(*target) {
                    self.busy = None;
                }
            }
            EngineEvent::TurnFailed {
                target,
                error,
                recoverable,
            } => {
                if self.busy == Some(*target) {
                    self.busy = None;
                }
                if !recoverable {
                    self.handle_mut(*target).state = AgentState::Failed(error.clone());
                }
            }
            EngineEvent::StreamUpdate { .. }
            | EngineEvent::ConfirmationNeeded { .. }
            | EngineEvent::ShellFinished { .. }
            | EngineEvent::ShellFailed { .. } => {}
        }
    }

    /// Parse a confirmation context into the tool action it describes.
    #[must_use]
    pub fn parse_action(&self, target: AiTarget, context: &str) -> Option<ToolAction> {
        let (_, action) = match target {
            AiTarget::Claude => self.claude_parser.parse(context),
            AiTarget::Gemini => self.gemini_parser.parse(context),
        };
        action
    }

    #[must_use]
    pub fn busy(&self) -> Option<AiTarget> {
        self.busy
    }

    #[must_use]
    pub fn state(&self, target: AiTarget) -> &AgentState {
        &self.handle(target).state
    }

    #[must_use]
    pub fn session_name(&self, target: AiTarget) -> Option<String> {
        self.handle(target)
            .session
            .as_ref()
            .map(|s| s.session_name().to_owned())
    }

    /// Close both sessions. Called once on the way out.
    pub async fn close_all(&mut self) {
        for handle in self.handles.values_mut() {
            if let Some(session) = handle.session.take() {
                session.close().await;
            }
            handle.state = AgentState::Offline;
        }
    }

    fn handle(&self, target: AiTarget) -> &AgentHandle {
        &self.handles[&target]
    }

    fn handle_mut(&mut self, target: AiTarget) -> &mut AgentHandle {
        self.handles
            .get_mut(&target)
            .unwrap_or_else(|| unreachable!("handle exists for every target"))
    }
}

/// Spawn a forwarder that turns raw partials into [`EngineEvent`]s.
/// Ends when the returned sender is dropped.
fn forward_stream(target: AiTarget, tx: mpsc::UnboundedSender<EngineEvent>) -> StreamSink {
    let (stream_tx, mut stream_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(text) = stream_rx.recv().await {
            if tx.send(EngineEvent::StreamUpdate { target, text }).is_err() {
                break;
            }
        }
    });
    stream_tx
}

fn turn_event(target: AiTarget, outcome: Result<AskOutcome, SessionError>) -> EngineEvent {
    match outcome {
        Ok(AskOutcome::Reply(response)) => EngineEvent::TurnCompleted { target, response },
        Ok(AskOutcome::Confirmation(confirmation)) => {
            EngineEvent::ConfirmationNeeded {
                target,
                confirmation,
            }
        }
        Err(err) => EngineEvent::TurnFailed {
            target,
            recoverable: err.is_recoverable(),
            error: err.to_string(),
        },
    }
}

async fn shell_event(command: String) -> EngineEvent {
    let result = tokio::time::timeout(
        SHELL_TIMEOUT,
        Command::new("sh")
            .arg("-c")
            .arg(&command)
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Err(_) => EngineEvent::ShellFailed {
            error: "Command timed out after 30 seconds".to_owned(),
        },
        Ok(Err(err)) => EngineEvent::ShellFailed {
            error: format!("Command failed: {err}"),
        },
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let text = if stdout.is_empty() {
                if stderr.is_empty() {
                    "(no output)".to_owned()
                } else {
                    stderr
                }
            } else {
                stdout
            };
            EngineEvent::ShellFinished {
                command,
                output: sanitize_terminal_text(&text).into_owned(),
                exit_code: output.status.code(),
            }
        }
    }
}

// ============================================================================
// Reply post-processing
// ============================================================================

/// Strip stream and shell plumbing from reply text before it is shown
/// or stored: the partial cursor, anything past the shell marker, and
/// stray exit-code lines.
#[must_use]
pub fn clean_reply_text(raw: &str) -> String {
    let text = raw.strip_suffix(STREAM_CURSOR).unwrap_or(raw);
    let text = match text.find(SHELL_OUTPUT_MARKER) {
        Some(pos) => &text[..pos],
        None => text,
    };
    EXIT_CODE_TEXT.replace_all(text, "").trim().to_owned()
}

/// Summarise an executed action so the other CLI can see what happened.
///
/// ```text
/// [GEMINI ACTION: WRITE_FILE /tmp/test.py]
/// + line 1
/// + line 2
/// Exit: 0
/// ```
#[must_use]
pub fn action_note(target: AiTarget, action: &ToolAction) -> String {
    let mut lines = vec![format!(
        "[{} ACTION: {} {}]",
        Speaker::from(target).label(),
        action.kind.label(),
        action.target
    )];

    for line in action.diff.iter().take(NOTE_DIFF_CAP) {
        lines.push(format!("{} {}", line.sign.marker(), line.text));
    }
    if action.diff.len() > NOTE_DIFF_CAP {
        lines.push(format!("... ({} more lines)", action.diff.len() - NOTE_DIFF_CAP));
    }

    if let Some(output) = &action.shell_output {
        if !output.is_empty() {
            let all: Vec<&str> = output.split('\n').collect();
            for line in all.iter().take(NOTE_OUTPUT_CAP) {
                lines.push((*line).to_owned());
            }
            if all.len() > NOTE_OUTPUT_CAP {
                lines.push(format!("... ({} more lines)", all.len() - NOTE_OUTPUT_CAP));
            }
        }
    }

    if let Some(code) = action.exit_code {
        lines.push(format!("Exit: {code}"));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_types::{DiffLine, ToolKind};

    #[test]
    fn clean_reply_strips_cursor_and_marker() {
        let raw = format!("The file is ready.\n{SHELL_OUTPUT_MARKER}\nsecret output{STREAM_CURSOR}");
        assert_eq!(clean_reply_text(&raw), "The file is ready.");
    }

    #[test]
    fn clean_reply_removes_exit_code_line() {
        let raw = "Done.\nCommand exited with code: 0";
        assert_eq!(clean_reply_text(raw), "Done.");
    }

    #[test]
    fn clean_reply_keeps_plain_text() {
        assert_eq!(clean_reply_text("  hello world  "), "hello world");
    }

    #[test]
    fn action_note_header_and_diff() {
        let mut action = ToolAction::new(ToolKind::WriteFile, "/tmp/test.py");
        action.diff = vec![
            DiffLine::added("import os"),
            DiffLine::added("print('hi')"),
        ];
        let note = action_note(AiTarget::Gemini, &action);
        assert_eq!(
            note,
            "[GEMINI ACTION: WRITE_FILE /tmp/test.py]\n+ import os\n+ print('hi')"
        );
    }

    #[test]
    fn action_note_caps_long_diffs() {
        let mut action = ToolAction::new(ToolKind::Edit, "big.rs");
        action.diff = (0..60).map(|i| DiffLine::added(format!("line {i}"))).collect();
        let note = action_note(AiTarget::Claude, &action);
        assert!(note.contains("... (10 more lines)"));
        assert!(!note.contains("line 55"));
    }

    #[test]
    fn action_note_includes_shell_output_and_exit() {
        let mut action = ToolAction::new(ToolKind::Shell, "ls /tmp");
        action.shell_output = Some("a.txt\nb.txt".to_owned());
        action.exit_code = Some(0);
        let note = action_note(AiTarget::Claude, &action);
        assert_eq!(
            note,
            "[CLAUDE ACTION: SHELL ls /tmp]\na.txt\nb.txt\nExit: 0"
        );
    }

    #[test]
    fn action_note_caps_shell_output() {
        let mut action = ToolAction::new(ToolKind::Shell, "seq 1 40");
        let output: Vec<String> = (1..=40).map(|i| i.to_string()).collect();
        action.shell_output = Some(output.join("\n"));
        action.exit_code = Some(0);
        let note = action_note(AiTarget::Gemini, &action);
        assert!(note.contains("... (20 more lines)"));
        assert!(note.ends_with("Exit: 0"));
    }
}
