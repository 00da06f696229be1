//! Debate state machine.
//!
//! [`App`] owns the conversation history, the display transcript, the input
//! draft, and the [`Moderator`] that talks to the agent sessions. The TUI
//! layer renders snapshots of this state and translates key events into the
//! methods below; nothing here touches the terminal.

pub(crate) mod commands;
mod input;

pub use commands::{CommandSpec, command_specs};
pub use input::{AtCompleter, DraftInput, MAX_SUGGESTIONS};

use std::mem;
use std::time::{Duration, Instant};

use duet_context::{ConversationHistory, parse_routing_tag};
use duet_types::{AiTarget, ConfirmationDecision, Speaker, ToolAction, ToolKind, UiOptions};
use duet_utils::{clip_preview, copy_to_clipboard};

use crate::config::DuetConfig;
use crate::deps::{self, ToolInspector};
use crate::moderator::{AgentState, EngineEvent, Moderator, action_note, clean_reply_text};

/// One entry in the rendered transcript.
///
/// Display items are append-only and deliberately separate from
/// [`ConversationHistory`]: the transcript shows notices, errors, and tool
/// cards that the agents never see, while the history holds only what gets
/// folded into prompts.
#[derive(Debug, Clone)]
pub enum DisplayItem {
    User(String),
    Agent {
        target: AiTarget,
        text: String,
    },
    Tool {
        target: AiTarget,
        action: ToolAction,
    },
    Shell {
        command: String,
        output: String,
        exit_code: Option<i32>,
    },
    Notice(String),
    Error(String),
}

/// Partial reply being streamed from a busy agent.
#[derive(Debug, Clone)]
pub struct LiveTurn {
    pub target: AiTarget,
    pub text: String,
}

/// A tool request awaiting the user's approve/reject decision.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub target: AiTarget,
    /// Raw confirmation prompt captured from the agent's pane.
    pub context: String,
    /// Structured view of the request, when the prompt was parseable.
    pub action: Option<ToolAction>,
}

/// What the UI is currently asking of the user.
#[derive(Debug, Clone, Default)]
pub enum Mode {
    /// Launch screen shown while sessions spin up.
    #[default]
    Startup,
    Normal,
    /// An untagged message needs a recipient.
    TargetSelect { message: String },
    Approval(PendingApproval),
}

/// Transcript scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollState {
    /// Follow the newest content as it arrives.
    #[default]
    AutoBottom,
    /// User scrolled away; keep a fixed offset from the top.
    Manual { offset_from_top: u16 },
}

const SCROLL_STEP: u16 = 3;
const PAGE_STEP: u16 = 10;

pub struct App {
    moderator: Moderator,
    history: ConversationHistory,
    context_limit: usize,
    display: Vec<DisplayItem>,
    live: Option<LiveTurn>,
    mode: Mode,
    status: Option<String>,
    draft: DraftInput,
    completer: AtCompleter,
    scroll: ScrollState,
    scroll_max: u16,
    /// Action approved but not yet resolved; filled in when the turn lands.
    pending_action: Option<ToolAction>,
    /// Display index of the card for `pending_action`, for in-place updates.
    pending_card: Option<usize>,
    /// History notes for actions completed during the current chain.
    action_notes: Vec<String>,
    /// Message parked while an interrupt settles.
    pending_dispatch: Option<(AiTarget, String)>,
    /// Set when the user interrupted; downgrades the next failure to a notice.
    interrupt_requested: Option<AiTarget>,
    ui_options: UiOptions,
    tick: u64,
    last_tick: Instant,
    should_quit: bool,
}

impl App {
    /// Builds the initial state without spawning anything. Session launch is
    /// deferred to [`App::start`] so construction stays runtime-free.
    pub fn new(config: &DuetConfig, tools: &dyn ToolInspector) -> Self {
        let mut display = Vec::new();
        for warning in deps::startup_warnings(tools) {
            display.push(DisplayItem::Notice(warning));
        }
        Self {
            moderator: Moderator::new(config),
            history: ConversationHistory::with_limit(config.max_messages()),
            context_limit: config.context_limit(),
            display,
            live: None,
            mode: Mode::Startup,
            status: None,
            draft: DraftInput::default(),
            completer: AtCompleter::default(),
            scroll: ScrollState::default(),
            scroll_max: 0,
            pending_action: None,
            pending_card: None,
            action_notes: Vec::new(),
            pending_dispatch: None,
            interrupt_requested: None,
            ui_options: config.ui_options(),
            tick: 0,
            last_tick: Instant::now(),
            should_quit: false,
        }
    }

    /// Launches both agent sessions. Must run inside a tokio runtime.
    pub fn start(&mut self) {
        self.moderator.start_all();
        self.status = Some("Starting sessions...".to_string());
    }

    /// Drains engine events and advances the spinner. Called once per frame.
    pub fn tick(&mut self) {
        while let Some(event) = self.moderator.try_event() {
            self.on_event(event);
        }
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(100) {
            self.tick = self.tick.wrapping_add(1);
            self.last_tick = now;
        }
    }

    fn on_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SessionReady(target) => {
                self.push_item(DisplayItem::Notice(format!(
                    "{} session ready",
                    target.display_name()
                )));
                self.status = Some(format!("{} ready", target.display_name()));
                self.leave_startup_if_settled();
            }
            EngineEvent::SessionFailed { target, error } => {
                self.push_item(DisplayItem::Error(error));
                self.status = Some(format!("{} offline", target.display_name()));
                self.leave_startup_if_settled();
            }
            EngineEvent::StreamUpdate { target, text } => {
                let cleaned = clean_reply_text(&text);
                if !cleaned.is_empty() {
                    self.live = Some(LiveTurn {
                        target,
                        text: cleaned,
                    });
                }
            }
            EngineEvent::TurnCompleted { target, response } => {
                self.live = None;
                let reply = clean_reply_text(&response.content);
                if let Some(mut action) = self.pending_action.take() {
                    if action.kind == ToolKind::Shell {
                        if response.exit_code.is_some() {
                            action.exit_code = response.exit_code;
                        }
                        if let Some(output) = response.shell_output {
                            action.shell_output = Some(output);
                        }
                    }
                    self.update_pending_card(&action);
                    self.action_notes.push(action_note(target, &action));
                }
                let notes = mem::take(&mut self.action_notes);
                let note_block = notes.join("\n\n");
                let record = match (reply.is_empty(), note_block.is_empty()) {
                    (false, false) => format!("{reply}\n\n{note_block}"),
                    (false, true) => reply.clone(),
                    (true, false) => note_block,
                    (true, true) => String::new(),
                };
                if !record.is_empty() {
                    self.history.push_target(target, record);
                    self.history.mark_seen(target);
                }
                if !reply.is_empty() {
                    self.push_item(DisplayItem::Agent {
                        target,
                        text: reply,
                    });
                }
                self.status = Some(format!("{} replied", target.display_name()));
                self.flush_pending_dispatch();
            }
            EngineEvent::ConfirmationNeeded {
                target,
                confirmation,
            } => {
                self.live = None;
                if let Some(mut action) = self.pending_action.take() {
                    // A second prompt arrived before the first action's turn
                    // finished: resolve the first card from the prior data.
                    if action.kind == ToolKind::Shell {
                        if confirmation.prior_exit_code.is_some() {
                            action.exit_code = confirmation.prior_exit_code;
                        }
                        if let Some(output) = confirmation.prior_shell_output {
                            action.shell_output = Some(output);
                        }
                    }
                    self.update_pending_card(&action);
                    self.action_notes.push(action_note(target, &action));
                    self.push_item(DisplayItem::Notice(
                        "[Another confirmation required]".to_string(),
                    ));
                }
                self.pending_card = None;
                let action = self.moderator.parse_action(target, &confirmation.context);
                self.mode = Mode::Approval(PendingApproval {
                    target,
                    context: confirmation.context,
                    action,
                });
                self.status = Some(format!(
                    "{} is asking for permission",
                    target.display_name()
                ));
            }
            EngineEvent::TurnFailed { target, error, .. } => {
                if let Some(live) = self.live.take() {
                    self.push_item(DisplayItem::Agent {
                        target: live.target,
                        text: live.text,
                    });
                }
                if self.interrupt_requested.take() == Some(target) {
                    self.push_item(DisplayItem::Notice("Interrupted".to_string()));
                    self.status = Some(format!("{} interrupted", target.display_name()));
                } else {
                    self.push_item(DisplayItem::Error(error));
                    self.status = Some(format!("{} turn failed", target.display_name()));
                }
                self.pending_action = None;
                self.pending_card = None;
                self.flush_pending_dispatch();
            }
            EngineEvent::ShellFinished {
                command,
                output,
                exit_code,
            } => {
                self.push_item(DisplayItem::Shell {
                    command,
                    output,
                    exit_code,
                });
                self.status = Some("Shell command finished".to_string());
            }
            EngineEvent::ShellFailed { error } => {
                self.push_item(DisplayItem::Error(error));
            }
        }
    }

    fn leave_startup_if_settled(&mut self) {
        if !matches!(self.mode, Mode::Startup) {
            return;
        }
        let settled = AiTarget::all().into_iter().all(|target| {
            !matches!(
                self.moderator.state(target),
                AgentState::Offline | AgentState::Starting
            )
        });
        if settled {
            self.mode = Mode::Normal;
        }
    }

    /// Rewrites the transcript card for the action that just resolved.
    fn update_pending_card(&mut self, action: &ToolAction) {
        if let Some(index) = self.pending_card.take()
            && let Some(DisplayItem::Tool {
                action: card_action,
                ..
            }) = self.display.get_mut(index)
        {
            *card_action = action.clone();
        }
    }

    // ---- submit path ----

    /// Handles Enter on the input line.
    pub fn submit(&mut self) {
        if self.completer.is_active() {
            self.completer_apply();
            return;
        }
        let raw = self.draft.take_text();
        self.completer.reset();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        if let Some(command) = trimmed.strip_prefix('!') {
            self.run_shell(command.trim());
            return;
        }
        if trimmed.starts_with('/') {
            self.process_command(trimmed);
            return;
        }
        let (target, clean) = parse_routing_tag(trimmed);
        // A tag with nothing after it would put an empty message into
        // history and send a bare prompt scaffold to the CLI.
        if clean.is_empty() {
            self.push_item(DisplayItem::Error(
                "No message after the routing tag".to_string(),
            ));
            return;
        }
        match target {
            Some(target) => {
                self.push_item(DisplayItem::User(trimmed.to_string()));
                self.route(target, clean);
            }
            None => {
                self.push_item(DisplayItem::User(trimmed.to_string()));
                self.mode = Mode::TargetSelect { message: clean };
            }
        }
    }

    fn run_shell(&mut self, command: &str) {
        if command.is_empty() {
            self.push_item(DisplayItem::Error(
                "No command provided after '!'".to_string(),
            ));
            return;
        }
        self.status = Some(format!("Running: {command}"));
        self.moderator.run_shell(command.to_string());
    }

    /// Routes a message to an agent, interrupting it first if it is busy.
    fn route(&mut self, target: AiTarget, message: String) {
        if self.moderator.busy() == Some(target) {
            self.interrupt_requested = self.moderator.interrupt();
            self.pending_dispatch = Some((target, message));
            self.status = Some(format!("Interrupting {}...", target.display_name()));
            return;
        }
        self.dispatch_now(target, message);
    }

    fn dispatch_now(&mut self, target: AiTarget, message: String) {
        if let Err(error) = self.moderator.ensure_ready(target) {
            self.push_item(DisplayItem::Error(error.to_string()));
            return;
        }
        // Context is built before the push so the prompt does not quote the
        // message back at the agent.
        let context = self.history.context_for(target, self.context_limit);
        self.history.push_user(&message);
        let prompt = if context.is_empty() {
            format!("USER asks {message}")
        } else {
            format!("{context}\nUSER asks {message}")
        };
        if let Err(error) = self.moderator.dispatch(target, prompt) {
            self.push_item(DisplayItem::Error(error.to_string()));
            return;
        }
        self.status = Some(format!("{} is thinking...", target.display_name()));
    }

    fn flush_pending_dispatch(&mut self) {
        if let Some((target, message)) = self.pending_dispatch.take() {
            self.dispatch_now(target, message);
        }
    }

    // ---- approval flow ----

    /// Approves the pending tool request and waits for the resumed turn.
    pub fn approve_pending(&mut self) {
        let Mode::Approval(pending) = mem::take(&mut self.mode) else {
            return;
        };
        self.moderator
            .respond(pending.target, ConfirmationDecision::Approve);
        if let Some(action) = pending.action {
            self.push_item(DisplayItem::Tool {
                target: pending.target,
                action: action.clone(),
            });
            self.pending_card = Some(self.display.len() - 1);
            self.pending_action = Some(action);
        }
        self.mode = Mode::Normal;
        self.status = Some(format!("{} approved", pending.target.display_name()));
    }

    /// Rejects the pending tool request. Earlier actions in the chain already
    /// ran, so their notes still land in history for the other agent to see.
    pub fn reject_pending(&mut self) {
        let Mode::Approval(pending) = mem::take(&mut self.mode) else {
            return;
        };
        self.moderator
            .respond(pending.target, ConfirmationDecision::Reject);
        let notes = mem::take(&mut self.action_notes);
        if !notes.is_empty() {
            self.history.push_target(pending.target, notes.join("\n\n"));
            self.history.mark_seen(pending.target);
        }
        self.live = None;
        self.pending_action = None;
        self.pending_card = None;
        self.push_item(DisplayItem::Notice("Request cancelled".to_string()));
        self.mode = Mode::Normal;
        self.status = Some("Request cancelled".to_string());
    }

    // ---- target selection ----

    /// Resolves a [`Mode::TargetSelect`] prompt with the chosen agent.
    pub fn choose_target(&mut self, target: AiTarget) {
        if let Mode::TargetSelect { message } = mem::take(&mut self.mode) {
            self.mode = Mode::Normal;
            self.route(target, message);
        }
    }

    pub fn cancel_target_select(&mut self) {
        if matches!(self.mode, Mode::TargetSelect { .. }) {
            self.mode = Mode::Normal;
            self.status = Some("Message discarded".to_string());
        }
    }

    /// Dismisses the launch screen without waiting for sessions to settle.
    pub fn dismiss_startup(&mut self) {
        if matches!(self.mode, Mode::Startup) {
            self.mode = Mode::Normal;
        }
    }

    /// Escape with no modal open: interrupt whichever agent is busy.
    pub fn interrupt(&mut self) {
        if let Some(target) = self.moderator.interrupt() {
            self.interrupt_requested = Some(target);
            self.status = Some(format!("Interrupting {}...", target.display_name()));
        }
    }

    // ---- command handlers (dispatched from commands.rs) ----

    pub(crate) fn push_notice(&mut self, text: impl Into<String>) {
        self.push_item(DisplayItem::Notice(text.into()));
    }

    pub(crate) fn push_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.status = Some(text.clone());
        self.push_item(DisplayItem::Error(text));
    }

    pub(crate) fn status_report(&self) -> String {
        let mut parts = Vec::new();
        for target in AiTarget::all() {
            let state = match self.moderator.state(target) {
                AgentState::Offline => "offline".to_string(),
                AgentState::Starting => "starting".to_string(),
                AgentState::Ready => match self.moderator.session_name(target) {
                    Some(name) => format!("ready ({name})"),
                    None => "ready".to_string(),
                },
                AgentState::Failed(reason) => format!("failed: {reason}"),
            };
            parts.push(format!("{}: {state}", target.display_name()));
        }
        parts.push(format!("history: {} messages", self.history.len()));
        parts.join(" │ ")
    }

    /// Clears history and the transcript. Sessions stay alive; only the
    /// context fed to future prompts is reset.
    pub(crate) fn clear_conversation(&mut self) {
        self.history.clear();
        self.display.clear();
        self.action_notes.clear();
        self.live = None;
        self.pending_card = None;
        self.scroll = ScrollState::AutoBottom;
        self.push_item(DisplayItem::Notice(
            "Conversation history cleared".to_string(),
        ));
        self.status = Some("History cleared".to_string());
    }

    pub(crate) fn copy_last_reply(&mut self) {
        let reply = self
            .history
            .messages()
            .iter()
            .rev()
            .find(|message| message.speaker != Speaker::User && !message.ephemeral)
            .map(|message| message.content.clone());
        match reply {
            Some(content) => {
                if copy_to_clipboard(&content) {
                    self.status = Some(format!("Copied: {}", clip_preview(&content)));
                } else {
                    self.push_error("Clipboard unavailable");
                }
            }
            None => self.push_error("No reply to copy yet"),
        }
    }

    pub(crate) fn restart_agent(&mut self, target: AiTarget) {
        self.moderator.restart(target);
        self.push_item(DisplayItem::Notice(format!(
            "Restarting {}...",
            target.display_name()
        )));
        self.status = Some(format!("Restarting {}...", target.display_name()));
    }

    pub(crate) fn restart_failed_agents(&mut self) {
        let failed: Vec<AiTarget> = AiTarget::all()
            .into_iter()
            .filter(|target| matches!(self.moderator.state(*target), AgentState::Failed(_)))
            .collect();
        if failed.is_empty() {
            self.push_notice("No failed sessions to restart");
            return;
        }
        for target in failed {
            self.restart_agent(target);
        }
    }

    pub fn request_quit(&mut self) {
        self.should_quit = true;
    }

    // ---- input plumbing ----

    pub fn enter_char(&mut self, c: char) {
        self.draft.enter_char(c);
        self.completer.update(&self.draft);
    }

    pub fn enter_text(&mut self, text: &str) {
        self.draft.enter_text(text);
        self.completer.update(&self.draft);
    }

    pub fn delete_char(&mut self) {
        self.draft.delete_char();
        self.completer.update(&self.draft);
    }

    pub fn delete_char_forward(&mut self) {
        self.draft.delete_char_forward();
        self.completer.update(&self.draft);
    }

    pub fn delete_word_backwards(&mut self) {
        self.draft.delete_word_backwards();
        self.completer.update(&self.draft);
    }

    pub fn move_cursor_left(&mut self) {
        self.draft.move_cursor_left();
        self.completer.update(&self.draft);
    }

    pub fn move_cursor_right(&mut self) {
        self.draft.move_cursor_right();
        self.completer.update(&self.draft);
    }

    pub fn move_cursor_home(&mut self) {
        self.draft.reset_cursor();
        self.completer.update(&self.draft);
    }

    pub fn move_cursor_end(&mut self) {
        self.draft.move_cursor_end();
        self.completer.update(&self.draft);
    }

    pub fn clear_draft(&mut self) {
        self.draft.clear();
        self.completer.reset();
    }

    pub fn completer_next(&mut self) {
        self.completer.select_next();
    }

    /// Closes the suggestion dropdown without touching the draft.
    pub fn completer_dismiss(&mut self) {
        self.completer.reset();
    }

    pub fn completer_prev(&mut self) {
        self.completer.select_prev();
    }

    /// Applies the selected completion. Returns false if none was active.
    pub fn completer_apply(&mut self) -> bool {
        let applied = self.completer.apply(&mut self.draft);
        if applied {
            self.completer.update(&self.draft);
        }
        applied
    }

    // ---- scrolling ----

    pub fn scroll_up(&mut self) {
        self.scroll = match self.scroll {
            ScrollState::AutoBottom => ScrollState::Manual {
                offset_from_top: self.scroll_max.saturating_sub(SCROLL_STEP),
            },
            ScrollState::Manual { offset_from_top } => ScrollState::Manual {
                offset_from_top: offset_from_top.saturating_sub(SCROLL_STEP),
            },
        };
    }

    pub fn scroll_down(&mut self) {
        if let ScrollState::Manual { offset_from_top } = self.scroll {
            let next = offset_from_top.saturating_add(SCROLL_STEP);
            self.scroll = if next >= self.scroll_max {
                ScrollState::AutoBottom
            } else {
                ScrollState::Manual {
                    offset_from_top: next,
                }
            };
        }
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll = match self.scroll {
            ScrollState::AutoBottom => ScrollState::Manual {
                offset_from_top: self.scroll_max.saturating_sub(PAGE_STEP),
            },
            ScrollState::Manual { offset_from_top } => ScrollState::Manual {
                offset_from_top: offset_from_top.saturating_sub(PAGE_STEP),
            },
        };
    }

    pub fn scroll_page_down(&mut self) {
        if let ScrollState::Manual { offset_from_top } = self.scroll {
            let next = offset_from_top.saturating_add(PAGE_STEP);
            self.scroll = if next >= self.scroll_max {
                ScrollState::AutoBottom
            } else {
                ScrollState::Manual {
                    offset_from_top: next,
                }
            };
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = ScrollState::AutoBottom;
    }

    /// Called by the renderer with the largest valid offset for this frame.
    pub fn update_scroll_max(&mut self, max: u16) {
        self.scroll_max = max;
        if let ScrollState::Manual { offset_from_top } = self.scroll
            && offset_from_top >= max
        {
            self.scroll = ScrollState::AutoBottom;
        }
    }

    pub fn scroll_offset_from_top(&self) -> u16 {
        match self.scroll {
            ScrollState::AutoBottom => self.scroll_max,
            ScrollState::Manual { offset_from_top } => offset_from_top.min(self.scroll_max),
        }
    }

    fn push_item(&mut self, item: DisplayItem) {
        self.display.push(item);
    }

    // ---- accessors for the renderer ----

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn display(&self) -> &[DisplayItem] {
        &self.display
    }

    pub fn live(&self) -> Option<&LiveTurn> {
        self.live.as_ref()
    }

    pub fn draft(&self) -> &DraftInput {
        &self.draft
    }

    pub fn completer(&self) -> &AtCompleter {
        &self.completer
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn busy(&self) -> Option<AiTarget> {
        self.moderator.busy()
    }

    pub fn agent_state(&self, target: AiTarget) -> &AgentState {
        self.moderator.state(target)
    }

    pub fn ui_options(&self) -> UiOptions {
        self.ui_options
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Tears down both tmux sessions. Called once on exit.
    pub async fn shutdown(&mut self) {
        self.moderator.close_all().await;
    }
}
