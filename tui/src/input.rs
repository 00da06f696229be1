//! Input handling for the Duet TUI.
//!
//! A blocking reader thread pumps crossterm events into a bounded channel;
//! [`handle_events`] drains a budgeted batch per frame and translates keys
//! into [`App`] calls according to the current mode.

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::debug;

use duet_engine::{App, Mode};
use duet_types::AiTarget;

const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(25); // shutdown responsiveness
const INPUT_CHANNEL_CAPACITY: usize = 1024; // bounded: no OOM
const MAX_EVENTS_PER_FRAME: usize = 64; // never starve rendering

/// The draft is a single line, so pasted newlines become spaces.
fn flatten_paste(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

enum InputMsg {
    Event(Event),
    Error(String),
}

pub struct InputPump {
    rx: mpsc::Receiver<InputMsg>,
    stop: Arc<AtomicBool>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl InputPump {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = stop.clone();

        let join = tokio::task::spawn_blocking(move || input_loop(&stop2, &tx));
        Self {
            rx,
            stop,
            join: Some(join),
        }
    }

    pub async fn shutdown(&mut self) {
        // Close the receiver first so the reader thread unblocks if it is
        // backpressured on a send (e.g. during a large paste).
        self.rx.close();

        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
        }
    }
}

impl Default for InputPump {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        // Best-effort stop if the caller exits early; never block in Drop.
        self.rx.close();
        self.stop.store(true, Ordering::Release);
    }
}

fn input_loop(stop: &AtomicBool, tx: &mpsc::Sender<InputMsg>) {
    while !stop.load(Ordering::Acquire) {
        match event::poll(INPUT_POLL_TIMEOUT) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    // Bounded queue: backpressure rather than dropped events,
                    // so multi-chunk pastes arrive whole.
                    if tx.blocking_send(InputMsg::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                break;
            }
        }
    }
}

/// Drains up to one frame's worth of input. Returns true when the app should
/// quit.
pub fn handle_events(app: &mut App, input: &mut InputPump) -> Result<bool> {
    let mut processed = 0;
    while processed < MAX_EVENTS_PER_FRAME {
        let ev = match input.rx.try_recv() {
            Ok(InputMsg::Event(ev)) => ev,
            Ok(InputMsg::Error(msg)) => return Err(anyhow!("input error: {msg}")),
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                return Err(anyhow!("input pump disconnected"));
            }
        };

        if apply_event(app, ev) {
            return Ok(true);
        }
        processed += 1;
    }
    if processed == MAX_EVENTS_PER_FRAME {
        debug!(processed, "input batch limit hit; deferring the rest to the next frame");
    }
    Ok(app.should_quit())
}

fn apply_event(app: &mut App, event: Event) -> bool {
    match event {
        Event::Key(key) => {
            // Press and repeat only; releases are noise.
            if matches!(key.kind, KeyEventKind::Release) {
                return app.should_quit();
            }

            // Ctrl+C clears a dirty draft first, quits on a clean one.
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                if app.draft().is_empty() {
                    app.request_quit();
                } else {
                    app.clear_draft();
                }
                return app.should_quit();
            }

            match app.mode() {
                Mode::Startup => handle_startup(app, key),
                Mode::Approval(_) => handle_approval(app, key),
                Mode::TargetSelect { .. } => handle_target_select(app, key),
                Mode::Normal => handle_normal(app, key),
            }
        }
        Event::Paste(text) => {
            if matches!(app.mode(), Mode::Normal) {
                app.enter_text(&flatten_paste(&text));
            }
        }
        _ => {}
    }
    app.should_quit()
}

fn handle_startup(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Esc => app.dismiss_startup(),
        KeyCode::Char('q') => app.request_quit(),
        _ => {}
    }
}

fn handle_approval(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('1' | 'y' | 'Y') | KeyCode::Enter => app.approve_pending(),
        KeyCode::Char('3' | 'n' | 'N') | KeyCode::Esc => app.reject_pending(),
        // '2' (always allow) is rendered disabled and has no binding.
        _ => {}
    }
}

fn handle_target_select(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('c' | 'C') => app.choose_target(AiTarget::Claude),
        KeyCode::Char('g' | 'G') => app.choose_target(AiTarget::Gemini),
        KeyCode::Esc => app.cancel_target_select(),
        _ => {}
    }
}

fn handle_normal(app: &mut App, key: KeyEvent) {
    // The suggestion dropdown owns Tab/arrows/Esc while it is open.
    if app.completer().is_active() {
        match key.code {
            KeyCode::Tab | KeyCode::Down => {
                app.completer_next();
                return;
            }
            KeyCode::BackTab | KeyCode::Up => {
                app.completer_prev();
                return;
            }
            KeyCode::Esc => {
                app.completer_dismiss();
                return;
            }
            _ => {}
        }
    }

    match key.code {
        // Enter applies an active completion before it ever submits.
        KeyCode::Enter => app.submit(),
        KeyCode::Esc => app.interrupt(),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_home(),
        KeyCode::End => app.move_cursor_end(),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        KeyCode::PageUp => app.scroll_page_up(),
        KeyCode::PageDown => app.scroll_page_down(),
        KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.delete_word_backwards();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.clear_draft();
        }
        KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.move_cursor_home();
        }
        KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.move_cursor_end();
        }
        KeyCode::Char(c) if c != '\r' => app.enter_char(c),
        _ => {}
    }
}
