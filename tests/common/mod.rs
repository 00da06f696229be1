//! Shared fixtures for the integration suite.
//!
//! Tests drive [`App`] directly instead of spawning tmux sessions: the
//! inspectors here stand in for the machines we care about (everything
//! installed, nothing installed, or a mix scripted per test).

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use duet_engine::{App, DuetConfig, RunOutput, ToolInspector};

/// Machine with every tool installed, current, and authenticated.
pub struct HealthySystem;

impl ToolInspector for HealthySystem {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        Some(PathBuf::from(format!("/usr/bin/{binary}")))
    }

    fn run(&self, _binary: &str, _args: &[&str], _timeout: Duration) -> RunOutput {
        RunOutput::ok("v22.1.0")
    }
}

/// Machine with nothing installed.
pub struct BareSystem;

impl ToolInspector for BareSystem {
    fn locate(&self, _binary: &str) -> Option<PathBuf> {
        None
    }

    fn run(&self, _binary: &str, _args: &[&str], _timeout: Duration) -> RunOutput {
        RunOutput::failed("Command not found")
    }
}

/// Machine scripted per test: a list of binaries on `$PATH` plus canned
/// output for each probed command line.
pub struct ScriptedSystem {
    present: Vec<&'static str>,
    outputs: HashMap<String, RunOutput>,
}

impl ScriptedSystem {
    pub fn new(present: &[&'static str]) -> Self {
        Self {
            present: present.to_vec(),
            outputs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_output(mut self, binary: &str, args: &[&str], output: RunOutput) -> Self {
        self.outputs.insert(probe_key(binary, args), output);
        self
    }
}

impl ToolInspector for ScriptedSystem {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        self.present
            .contains(&binary)
            .then(|| PathBuf::from(format!("/usr/local/bin/{binary}")))
    }

    fn run(&self, binary: &str, args: &[&str], _timeout: Duration) -> RunOutput {
        self.outputs
            .get(&probe_key(binary, args))
            .cloned()
            .unwrap_or_else(|| RunOutput::failed("not scripted"))
    }
}

fn probe_key(binary: &str, args: &[&str]) -> String {
    format!("{binary} {}", args.join(" "))
}

/// App on a healthy machine, past the launch screen.
pub fn ready_app() -> App {
    let mut app = App::new(&DuetConfig::default(), &HealthySystem);
    app.dismiss_startup();
    app
}

/// Feed a string through the per-character input path, completer and all.
pub fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        app.enter_char(c);
    }
}

/// Macro to skip tests that probe the real `$PATH` or talk to tmux.
///
/// Set `DUET_TEST_NO_PROBES=1` in environments where the suite must not
/// inspect or touch the host system.
#[macro_export]
macro_rules! skip_if_no_probes {
    () => {
        if std::env::var("DUET_TEST_NO_PROBES").is_ok() {
            eprintln!("Skipping test: DUET_TEST_NO_PROBES is set");
            return;
        }
    };
}
