//! End-to-end journeys through the [`App`] state machine.
//!
//! Everything here goes through the same public API the terminal layer uses:
//! characters in, display items and mode transitions out. No test starts a
//! session unless it says so explicitly, which keeps tmux out of the picture.

use duet_engine::{AgentState, App, DisplayItem, DuetConfig, Mode};
use duet_types::AiTarget;

use crate::common::{BareSystem, HealthySystem, ready_app, type_text};

fn last_notice(app: &App) -> &str {
    match app.display().last() {
        Some(DisplayItem::Notice(text)) => text,
        other => panic!("expected a notice, got {other:?}"),
    }
}

fn last_error(app: &App) -> &str {
    match app.display().last() {
        Some(DisplayItem::Error(text)) => text,
        other => panic!("expected an error, got {other:?}"),
    }
}

#[test]
fn launch_screen_waits_for_dismissal() {
    let mut app = App::new(&DuetConfig::default(), &HealthySystem);

    assert!(matches!(app.mode(), Mode::Startup));
    assert!(app.display().is_empty());

    app.dismiss_startup();
    assert!(matches!(app.mode(), Mode::Normal));
}

#[test]
fn missing_tools_show_up_as_startup_notices() {
    let app = App::new(&DuetConfig::default(), &BareSystem);

    let notices: Vec<&str> = app
        .display()
        .iter()
        .map(|item| match item {
            DisplayItem::Notice(text) => text.as_str(),
            other => panic!("expected only notices, got {other:?}"),
        })
        .collect();

    assert_eq!(notices.len(), 3);
    assert!(notices[0].contains("tmux not found"));
    assert!(notices.iter().all(|n| n.contains("duet doctor")));
}

/// An untagged message parks in the recipient selector; picking an agent
/// routes it, and routing to a never-started session reports the failure
/// instead of hanging.
#[test]
fn untagged_messages_ask_for_a_recipient() {
    let mut app = ready_app();

    type_text(&mut app, "which is faster?");
    app.submit();

    match app.mode() {
        Mode::TargetSelect { message } => assert_eq!(message, "which is faster?"),
        other => panic!("expected the recipient selector, got {other:?}"),
    }
    assert!(matches!(
        app.display().first(),
        Some(DisplayItem::User(text)) if text == "which is faster?"
    ));

    app.choose_target(AiTarget::Gemini);

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(
        last_error(&app),
        "Gemini is not ready: session was never started"
    );
}

#[test]
fn tagged_messages_skip_the_selector() {
    let mut app = ready_app();

    type_text(&mut app, "@cc hi there");
    app.submit();

    assert!(matches!(app.mode(), Mode::Normal));
    assert!(matches!(
        app.display().first(),
        Some(DisplayItem::User(text)) if text == "@cc hi there"
    ));
    assert!(last_error(&app).starts_with("Claude is not ready"));
}

/// Backing out of the selector drops the message before it reaches the
/// shared history, so neither agent ever sees it quoted back.
#[test]
fn discarding_a_parked_message_keeps_history_empty() {
    let mut app = ready_app();

    type_text(&mut app, "hello");
    app.submit();
    app.cancel_target_select();

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(app.status(), Some("Message discarded"));

    type_text(&mut app, "/status");
    app.submit();
    assert_eq!(
        last_notice(&app),
        "Claude: offline │ Gemini: offline │ history: 0 messages"
    );
}

/// With the tag dropdown open, Enter accepts the highlighted tag; only the
/// next Enter sends the message.
#[test]
fn completer_takes_the_first_enter() {
    let mut app = ready_app();

    type_text(&mut app, "@g");
    assert!(app.completer().is_active());
    assert_eq!(app.completer().suggestions(), ["@g", "@gemini"]);

    app.submit();
    assert!(app.display().is_empty());
    assert_eq!(app.draft().text(), "@g ");

    type_text(&mut app, "hi");
    app.submit();

    assert!(matches!(
        app.display().first(),
        Some(DisplayItem::User(text)) if text == "@g hi"
    ));
    assert!(last_error(&app).contains("Gemini is not ready"));
}

#[test]
fn help_lists_routing_tags_and_shell_escape() {
    let mut app = ready_app();

    type_text(&mut app, "/help");
    app.submit();

    let help = last_notice(&app);
    assert!(help.contains("@cc, @claude"));
    assert!(help.contains("@g, @gemini"));
    assert!(help.contains("!<command>"));
}

#[test]
fn unknown_commands_report_themselves() {
    let mut app = ready_app();

    type_text(&mut app, "/nope");
    app.submit();

    assert_eq!(last_error(&app), "Unknown command: /nope");
}

#[test]
fn bare_bang_is_rejected() {
    let mut app = ready_app();

    type_text(&mut app, "!   ");
    app.submit();

    assert_eq!(last_error(&app), "No command provided after '!'");
}

#[test]
fn quit_aliases_raise_the_quit_flag() {
    for command in ["/quit", "/q"] {
        let mut app = ready_app();
        type_text(&mut app, command);
        app.submit();
        assert!(app.should_quit(), "{command} should quit");
    }
}

#[test]
fn clear_resets_the_transcript() {
    let mut app = ready_app();

    type_text(&mut app, "hello");
    app.submit();
    app.cancel_target_select();

    type_text(&mut app, "/clear");
    app.submit();

    assert_eq!(app.display().len(), 1);
    assert_eq!(last_notice(&app), "Conversation history cleared");
}

/// Quitting without ever starting the sessions must not hang or panic.
#[tokio::test]
async fn shutdown_before_start_is_clean() {
    let mut app = ready_app();

    app.shutdown().await;

    assert_eq!(*app.agent_state(AiTarget::Claude), AgentState::Offline);
    assert_eq!(*app.agent_state(AiTarget::Gemini), AgentState::Offline);
}

/// Full launch-then-quit pass. Spawns real tmux sessions on machines that
/// have the CLIs installed, so it respects the probe opt-out.
#[tokio::test]
async fn start_then_shutdown_runs_the_whole_lifecycle() {
    crate::skip_if_no_probes!();

    let mut app = ready_app();
    app.start();

    assert_eq!(app.status(), Some("Starting sessions..."));
    assert_eq!(*app.agent_state(AiTarget::Claude), AgentState::Starting);
    assert_eq!(*app.agent_state(AiTarget::Gemini), AgentState::Starting);

    app.tick();
    app.shutdown().await;

    assert_eq!(*app.agent_state(AiTarget::Claude), AgentState::Offline);
    assert_eq!(*app.agent_state(AiTarget::Gemini), AgentState::Offline);
}
