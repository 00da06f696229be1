//! Health checks for the external tools Duet drives.
//!
//! Used twice: `duet doctor` prints the full table before anything else
//! runs, and the app surfaces the quick presence checks as startup
//! warnings. Lookups go through [`ToolInspector`] so tests never spawn
//! real binaries.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Node major version both CLIs are known to work with.
const NODE_MIN_MAJOR: u32 = 20;

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);
const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Inspector
// ============================================================================

/// Result of probing an external command, shaped like a process exit.
/// `code` is -1 when the command could not run at all.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            code: -1,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.code == 0
    }
}

/// `$PATH` lookups and short command probes, injectable for tests.
pub trait ToolInspector: Send + Sync {
    fn locate(&self, binary: &str) -> Option<PathBuf>;
    fn run(&self, binary: &str, args: &[&str], timeout: Duration) -> RunOutput;
}

/// Real inspector: `which` for lookups, blocking subprocesses for probes.
/// Only used on the doctor path, never while the TUI is live.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTools;

impl ToolInspector for SystemTools {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }

    fn run(&self, binary: &str, args: &[&str], timeout: Duration) -> RunOutput {
        let spawned = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(_) => return RunOutput::failed("Command not found"),
        };

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let mut stdout = String::new();
                    let mut stderr = String::new();
                    if let Some(mut pipe) = child.stdout.take() {
                        let _ = pipe.read_to_string(&mut stdout);
                    }
                    if let Some(mut pipe) = child.stderr.take() {
                        let _ = pipe.read_to_string(&mut stderr);
                    }
                    return RunOutput {
                        code: status.code().unwrap_or(-1),
                        stdout,
                        stderr,
                    };
                }
                Ok(None) => {
                    if started.elapsed() > timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return RunOutput::failed("Command timed out");
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(err) => return RunOutput::failed(err.to_string()),
            }
        }
    }
}

// ============================================================================
// Checks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub help: Option<String>,
}

impl CheckResult {
    fn ok(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Ok,
            message: message.into(),
            help: None,
        }
    }

    fn warn(name: &'static str, message: impl Into<String>, help: Option<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Warn,
            message: message.into(),
            help,
        }
    }

    fn error(name: &'static str, message: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Error,
            message: message.into(),
            help: Some(help.into()),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == CheckStatus::Error
    }
}

/// Run every check in display order.
#[must_use]
pub fn run_checks(tools: &dyn ToolInspector) -> Vec<CheckResult> {
    vec![
        check_tmux(tools),
        check_node(tools),
        check_claude_cli(tools),
        check_claude_auth(tools),
        check_gemini_cli(tools),
        check_gemini_auth(tools),
    ]
}

fn check_tmux(tools: &dyn ToolInspector) -> CheckResult {
    if tools.locate("tmux").is_none() {
        return CheckResult::error(
            "tmux",
            "tmux not found",
            "Install: sudo apt install tmux (Linux) | brew install tmux (Mac)",
        );
    }
    let probe = tools.run("tmux", &["-V"], VERSION_TIMEOUT);
    if probe.succeeded() {
        CheckResult::ok("tmux", format!("tmux found ({})", probe.stdout.trim()))
    } else {
        CheckResult::error(
            "tmux",
            "tmux installed but not working",
            format!("Error: {}", probe.stderr.trim()),
        )
    }
}

fn check_node(tools: &dyn ToolInspector) -> CheckResult {
    if tools.locate("node").is_none() {
        return CheckResult::warn(
            "Node.js",
            "node not found (both CLIs are Node programs)",
            Some(format!("Install Node.js {NODE_MIN_MAJOR} or newer")),
        );
    }
    let probe = tools.run("node", &["--version"], VERSION_TIMEOUT);
    if !probe.succeeded() {
        return CheckResult::warn("Node.js", "node found but --version failed", None);
    }
    let version = probe.stdout.trim().to_owned();
    match node_major(&version) {
        Some(major) if major >= NODE_MIN_MAJOR => {
            CheckResult::ok("Node.js", format!("node {version}"))
        }
        Some(major) => CheckResult::warn(
            "Node.js",
            format!("node {version} is old (major {major})"),
            Some(format!("Upgrade to Node.js {NODE_MIN_MAJOR} or newer")),
        ),
        None => CheckResult::warn(
            "Node.js",
            format!("could not parse node version '{version}'"),
            None,
        ),
    }
}

fn check_claude_cli(tools: &dyn ToolInspector) -> CheckResult {
    if tools.locate("claude").is_none() {
        return CheckResult::error(
            "Claude CLI",
            "Claude CLI not found",
            "Install: npm install -g @anthropic-ai/claude-code",
        );
    }
    let probe = tools.run("claude", &["--version"], VERSION_TIMEOUT);
    if !probe.succeeded() {
        return CheckResult::error(
            "Claude CLI",
            "Claude CLI installed but --version failed",
            format!("Error: {}", probe.stderr.trim()),
        );
    }
    let version = non_empty(probe.stdout.trim()).unwrap_or("unknown");
    CheckResult::ok("Claude CLI", format!("Claude CLI found ({version})"))
}

fn check_claude_auth(tools: &dyn ToolInspector) -> CheckResult {
    // --help works without auth, so probe a command that touches config.
    let probe = tools.run("claude", &["config", "list"], AUTH_TIMEOUT);
    if probe.succeeded() {
        return CheckResult::ok("Claude auth", "Claude CLI authenticated");
    }
    let stderr = probe.stderr.to_lowercase();
    if stderr.contains("not authenticated") || stderr.contains("login") {
        CheckResult::error(
            "Claude auth",
            "Claude CLI not authenticated",
            "Run: claude login",
        )
    } else {
        CheckResult::warn(
            "Claude auth",
            "Could not verify Claude auth",
            Some("Try running: claude --help".to_owned()),
        )
    }
}

fn check_gemini_cli(tools: &dyn ToolInspector) -> CheckResult {
    if tools.locate("gemini").is_none() {
        return CheckResult::error(
            "Gemini CLI",
            "Gemini CLI not found",
            "Install: npm install -g @google/gemini-cli",
        );
    }
    let probe = tools.run("gemini", &["--version"], VERSION_TIMEOUT);
    if !probe.succeeded() {
        // Older builds lack --version; the CLI may still work.
        return CheckResult::warn(
            "Gemini CLI",
            "Gemini CLI found but --version not supported",
            None,
        );
    }
    let version = non_empty(probe.stdout.trim()).unwrap_or("unknown");
    CheckResult::ok("Gemini CLI", format!("Gemini CLI found ({version})"))
}

fn check_gemini_auth(tools: &dyn ToolInspector) -> CheckResult {
    let probe = tools.run("gemini", &["--help"], AUTH_TIMEOUT);
    if probe.succeeded() {
        return CheckResult::ok("Gemini auth", "Gemini CLI accessible");
    }
    let stderr = probe.stderr.to_lowercase();
    if stderr.contains("auth") || stderr.contains("login") {
        CheckResult::error(
            "Gemini auth",
            "Gemini CLI not authenticated",
            "Run: gemini auth",
        )
    } else {
        let detail: String = probe.stderr.chars().take(100).collect();
        CheckResult::warn(
            "Gemini auth",
            "Could not verify Gemini status",
            Some(format!("Error: {detail}")),
        )
    }
}

/// Presence-only pass used while the TUI is starting. No subprocesses.
#[must_use]
pub fn startup_warnings(tools: &dyn ToolInspector) -> Vec<String> {
    let mut warnings = Vec::new();
    if tools.locate("tmux").is_none() {
        warnings.push("tmux not found - sessions cannot start (run `duet doctor`)".to_owned());
    }
    if tools.locate("claude").is_none() {
        warnings.push("claude CLI not found on $PATH (run `duet doctor`)".to_owned());
    }
    if tools.locate("gemini").is_none() {
        warnings.push("gemini CLI not found on $PATH (run `duet doctor`)".to_owned());
    }
    warnings
}

/// Parse the major out of `v20.11.0` or `20.11.0`.
fn node_major(version: &str) -> Option<u32> {
    let digits = version.trim().trim_start_matches('v');
    let major = digits.split('.').next()?;
    major.parse().ok()
}

fn non_empty(text: &str) -> Option<&str> {
    if text.is_empty() { None } else { Some(text) }
}
