//! Environment check scenarios.
//!
//! `duet doctor` and the TUI's startup notices share one check list; these
//! tests run that list against whole-machine profiles instead of poking at
//! individual checks, which the engine already covers.

use duet_engine::{CheckStatus, RunOutput, SystemTools, run_checks, startup_warnings};

use crate::common::{BareSystem, HealthySystem, ScriptedSystem};

#[test]
fn a_bare_machine_fails_the_three_hard_requirements() {
    let results = run_checks(&BareSystem);
    assert_eq!(results.len(), 6);

    // tmux and the two CLIs block a session; node and auth only warn.
    let errors: Vec<&str> = results
        .iter()
        .filter(|r| r.is_error())
        .map(|r| r.name)
        .collect();
    assert_eq!(errors, ["tmux", "Claude CLI", "Gemini CLI"]);
    assert!(results.iter().all(|r| r.status != CheckStatus::Ok));

    assert_eq!(startup_warnings(&BareSystem).len(), 3);
}

#[test]
fn install_hints_name_the_package_sources() {
    let results = run_checks(&BareSystem);
    let hints: Vec<&str> = results.iter().filter_map(|r| r.help.as_deref()).collect();

    assert!(hints.iter().any(|h| h.contains("apt install tmux")));
    assert!(hints.iter().any(|h| h.contains("@anthropic-ai/claude-code")));
    assert!(hints.iter().any(|h| h.contains("@google/gemini-cli")));
}

#[test]
fn a_healthy_machine_passes_every_check() {
    let results = run_checks(&HealthySystem);

    assert!(results.iter().all(|r| r.status == CheckStatus::Ok));
    assert!(startup_warnings(&HealthySystem).is_empty());
}

/// The common CI shape: a runtime image with tmux and node preinstalled but
/// neither coding CLI.
#[test]
fn ci_box_without_the_clis_gets_install_errors() {
    let tools = ScriptedSystem::new(&["tmux", "node"])
        .with_output("tmux", &["-V"], RunOutput::ok("tmux 3.4"))
        .with_output("node", &["--version"], RunOutput::ok("v20.11.0"));

    let results = run_checks(&tools);
    assert_eq!(results[0].status, CheckStatus::Ok);
    assert_eq!(results[1].status, CheckStatus::Ok);

    let errors: Vec<&str> = results
        .iter()
        .filter(|r| r.is_error())
        .map(|r| r.name)
        .collect();
    assert_eq!(errors, ["Claude CLI", "Gemini CLI"]);

    let warnings = startup_warnings(&tools);
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].contains("claude"));
    assert!(warnings[1].contains("gemini"));
}

#[test]
fn stale_node_is_a_warning_not_a_blocker() {
    let tools = ScriptedSystem::new(&["tmux", "node", "claude", "gemini"])
        .with_output("tmux", &["-V"], RunOutput::ok("tmux 3.4"))
        .with_output("node", &["--version"], RunOutput::ok("v18.19.0"))
        .with_output("claude", &["--version"], RunOutput::ok("2.0.14"))
        .with_output("claude", &["config", "list"], RunOutput::ok("{}"))
        .with_output("gemini", &["--version"], RunOutput::ok("0.8.1"))
        .with_output("gemini", &["--help"], RunOutput::ok("usage: gemini"));

    let results = run_checks(&tools);
    let not_ok: Vec<&_> = results
        .iter()
        .filter(|r| r.status != CheckStatus::Ok)
        .collect();

    assert_eq!(not_ok.len(), 1);
    assert_eq!(not_ok[0].name, "Node.js");
    assert_eq!(not_ok[0].status, CheckStatus::Warn);
    assert!(not_ok[0].message.contains("is old"));
    assert!(not_ok[0].help.as_deref().is_some_and(|h| h.contains("Upgrade")));
}

#[test]
fn expired_claude_login_is_called_out() {
    let tools = ScriptedSystem::new(&["tmux", "node", "claude", "gemini"])
        .with_output("tmux", &["-V"], RunOutput::ok("tmux 3.4"))
        .with_output("node", &["--version"], RunOutput::ok("v22.3.0"))
        .with_output("claude", &["--version"], RunOutput::ok("2.0.14"))
        .with_output(
            "claude",
            &["config", "list"],
            RunOutput::failed("Error: please login first"),
        )
        .with_output("gemini", &["--version"], RunOutput::ok("0.8.1"))
        .with_output("gemini", &["--help"], RunOutput::ok("usage: gemini"));

    let results = run_checks(&tools);
    let auth = results
        .iter()
        .find(|r| r.name == "Claude auth")
        .expect("auth check runs");

    assert!(auth.is_error());
    assert_eq!(auth.help.as_deref(), Some("Run: claude login"));

    // Presence-only warnings stay quiet: every binary is installed.
    assert!(startup_warnings(&tools).is_empty());
}

/// Doctor output is a fixed-order table, whatever the machine looks like.
#[test]
fn check_order_is_stable_on_the_real_system() {
    crate::skip_if_no_probes!();

    let names: Vec<&str> = run_checks(&SystemTools).iter().map(|r| r.name).collect();
    assert_eq!(
        names,
        [
            "tmux",
            "Node.js",
            "Claude CLI",
            "Claude auth",
            "Gemini CLI",
            "Gemini auth"
        ]
    );
}
