//! Thin async wrapper around the `tmux` binary.
//!
//! Every CLI session lives in its own detached tmux session. This module
//! only shells out; it never parses pane content beyond returning it.

use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Scrollback depth for response captures. Long replies scroll the visible
/// pane, so captures reach back far enough to keep the whole reply.
const CAPTURE_SCROLLBACK_LINES: i32 = 500;

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux not found. Install: sudo apt install tmux")]
    NotInstalled,

    #[error("tmux {verb} failed: {stderr}")]
    CommandFailed { verb: &'static str, stderr: String },

    #[error("tmux {verb} failed")]
    Io {
        verb: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Handle to one named, detached tmux session.
///
/// Holding a `TmuxSession` implies nothing about whether the session is
/// actually running; check with [`exists`](TmuxSession::exists).
#[derive(Debug, Clone)]
pub struct TmuxSession {
    name: String,
}

impl TmuxSession {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a detached session of the given pane size running `command`.
    pub async fn spawn(&self, width: u16, height: u16, command: &[&str]) -> Result<(), TmuxError> {
        let width = width.to_string();
        let height = height.to_string();
        let mut args = vec![
            "new-session",
            "-d",
            "-s",
            &self.name,
            "-x",
            &width,
            "-y",
            &height,
        ];
        args.extend_from_slice(command);
        run("new-session", &args).await?;
        debug!(session = %self.name, ?command, "spawned tmux session");
        Ok(())
    }

    /// Kill the session if it exists. Errors are swallowed: the usual
    /// caller is cleanup code that cannot do anything about them anyway.
    pub async fn kill(&self) {
        let _ = run("kill-session", &["kill-session", "-t", &self.name]).await;
    }

    pub async fn exists(&self) -> bool {
        run("has-session", &["has-session", "-t", &self.name])
            .await
            .is_ok()
    }

    /// Capture the visible pane.
    pub async fn capture(&self) -> Result<String, TmuxError> {
        let output = run("capture-pane", &["capture-pane", "-t", &self.name, "-p"]).await?;
        Ok(output)
    }

    /// Capture the pane plus recent scrollback.
    pub async fn capture_scrollback(&self) -> Result<String, TmuxError> {
        let depth = format!("-{CAPTURE_SCROLLBACK_LINES}");
        let output = run(
            "capture-pane",
            &["capture-pane", "-t", &self.name, "-p", "-S", &depth],
        )
        .await?;
        Ok(output)
    }

    /// Paste `text` into the pane via a tmux buffer.
    ///
    /// Multiline text goes through `load-buffer` on stdin and a bracketed
    /// `paste-buffer`, so the CLI receives it as one paste rather than a
    /// stream of keystrokes it might interpret.
    pub async fn paste_text(&self, text: &str) -> Result<(), TmuxError> {
        let mut child = Command::new("tmux")
            .args(["load-buffer", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| spawn_error("load-buffer", source))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|source| TmuxError::Io {
                    verb: "load-buffer",
                    source,
                })?;
        }
        let status = child.wait().await.map_err(|source| TmuxError::Io {
            verb: "load-buffer",
            source,
        })?;
        if !status.success() {
            return Err(TmuxError::CommandFailed {
                verb: "load-buffer",
                stderr: String::new(),
            });
        }

        run(
            "paste-buffer",
            &["paste-buffer", "-p", "-r", "-t", &self.name],
        )
        .await?;
        Ok(())
    }

    /// Send one key by tmux key name ("Enter", "Escape", "Down", ...).
    pub async fn send_key(&self, key: &str) -> Result<(), TmuxError> {
        self.send_keys(&[key]).await
    }

    /// Send a sequence of keys in one `send-keys` invocation.
    pub async fn send_keys(&self, keys: &[&str]) -> Result<(), TmuxError> {
        let mut args = vec!["send-keys", "-t", self.name.as_str()];
        args.extend_from_slice(keys);
        run("send-keys", &args).await?;
        Ok(())
    }
}

/// Run one tmux command, returning its stdout.
async fn run(verb: &'static str, args: &[&str]) -> Result<String, TmuxError> {
    let output = Command::new("tmux")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| spawn_error(verb, source))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(TmuxError::CommandFailed {
            verb,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

fn spawn_error(verb: &'static str, source: std::io::Error) -> TmuxError {
    if source.kind() == std::io::ErrorKind::NotFound {
        TmuxError::NotInstalled
    } else {
        TmuxError::Io { verb, source }
    }
}
