//! `duet doctor` - environment checks printed as a table.
//!
//! The checks themselves live in the engine so the TUI can reuse the
//! presence pass as startup warnings; this module only formats them.

use crossterm::style::Stylize;

use duet_engine::{CheckResult, CheckStatus, ToolInspector, run_checks};

/// Runs every check and prints one row each. Returns the process exit
/// code: zero when nothing is broken, one when any check errored.
pub(crate) fn run(tools: &dyn ToolInspector) -> i32 {
    println!();
    println!("{}", "Duet environment check".bold());
    println!();

    let results = run_checks(tools);
    let name_width = results.iter().map(|r| r.name.len()).max().unwrap_or(0);

    for result in &results {
        print_row(result, name_width);
    }

    println!();
    let errors = results.iter().filter(|r| r.is_error()).count();
    if errors == 0 {
        println!("{}", "All checks passed. Run `duet` to start.".green());
        0
    } else {
        let noun = if errors == 1 { "problem" } else { "problems" };
        println!(
            "{}",
            format!("{errors} {noun} found. Fix the items above and re-run `duet doctor`.").red()
        );
        1
    }
}

fn print_row(result: &CheckResult, name_width: usize) {
    let badge = match result.status {
        CheckStatus::Ok => "✓".green(),
        CheckStatus::Warn => "!".yellow(),
        CheckStatus::Error => "✗".red(),
    };
    println!("  {badge} {:<name_width$}  {}", result.name, result.message);
    if let Some(help) = &result.help {
        // Align the hint under the message column.
        let indent = " ".repeat(name_width + 6);
        println!("{indent}{}", help.as_str().dark_grey());
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use duet_engine::RunOutput;

    use super::*;

    struct AllGood;

    impl ToolInspector for AllGood {
        fn locate(&self, binary: &str) -> Option<PathBuf> {
            Some(PathBuf::from(format!("/usr/bin/{binary}")))
        }

        fn run(&self, _binary: &str, _args: &[&str], _timeout: Duration) -> RunOutput {
            RunOutput::ok("v20.11.0")
        }
    }

    struct NothingInstalled;

    impl ToolInspector for NothingInstalled {
        fn locate(&self, _binary: &str) -> Option<PathBuf> {
            None
        }

        fn run(&self, _binary: &str, _args: &[&str], _timeout: Duration) -> RunOutput {
            RunOutput::failed("Command not found")
        }
    }

    #[test]
    fn healthy_environment_exits_zero() {
        assert_eq!(run(&AllGood), 0);
    }

    #[test]
    fn missing_tools_exit_nonzero() {
        assert_eq!(run(&NothingInstalled), 1);
    }
}
