//! System clipboard access from inside the TUI.
//!
//! No single method works everywhere: Wayland and X11 each want their own
//! helper binary, terminal emulators differ on OSC 52 support, and inside
//! tmux the sequence has to be wrapped so it reaches the outer terminal.
//! Every available method is attempted in turn, because OSC 52 in
//! particular can be ignored without any error reaching us.

use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::process::{Command, Stdio};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

const PREVIEW_MAX_CHARS: usize = 40;

/// Copy `text` using every clipboard method available on this system.
///
/// Returns `true` if at least one method accepted the text. An OSC 52
/// write counts as accepted once `/dev/tty` takes the sequence, even
/// though the terminal may still drop it.
#[must_use]
pub fn copy_to_clipboard(text: &str) -> bool {
    let mut copied = false;

    if which::which("wl-copy").is_ok() {
        copied |= pipe_through("wl-copy", &[], text);
    }
    if which::which("xclip").is_ok() {
        copied |= pipe_through("xclip", &["-selection", "clipboard"], text);
    }
    copied |= copy_with_osc52(text);
    copied |= copy_with_arboard(text);

    copied
}

/// Single-line preview of copied text for a notification, with newlines
/// shown as `⏎` and long text truncated.
#[must_use]
pub fn clip_preview(text: &str) -> String {
    let flat = text.replace('\n', "⏎");
    if flat.chars().count() <= PREVIEW_MAX_CHARS {
        return flat;
    }
    let mut preview: String = flat.chars().take(PREVIEW_MAX_CHARS).collect();
    preview.push('…');
    preview
}

fn pipe_through(program: &str, args: &[&str], text: &str) -> bool {
    let spawned = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(error) => {
            debug!(program, %error, "clipboard helper failed to spawn");
            return false;
        }
    };
    if let Some(mut stdin) = child.stdin.take()
        && stdin.write_all(text.as_bytes()).is_err()
    {
        let _ = child.wait();
        return false;
    }
    match child.wait() {
        Ok(status) => status.success(),
        Err(error) => {
            debug!(program, %error, "clipboard helper did not exit cleanly");
            false
        }
    }
}

/// Write an OSC 52 copy sequence straight to the controlling terminal.
/// Inside tmux the sequence is wrapped in a DCS passthrough so tmux
/// forwards it instead of eating it.
fn copy_with_osc52(text: &str) -> bool {
    let encoded = BASE64.encode(text.as_bytes());
    let mut sequence = format!("\x1b]52;c;{encoded}\x07");
    if env::var_os("TMUX").is_some() {
        sequence = format!("\x1bPtmux;\x1b{sequence}\x1b\\");
    }

    match OpenOptions::new().write(true).open("/dev/tty") {
        Ok(mut tty) => tty
            .write_all(sequence.as_bytes())
            .and_then(|()| tty.flush())
            .is_ok(),
        Err(error) => {
            debug!(%error, "no /dev/tty for OSC 52 copy");
            false
        }
    }
}

fn copy_with_arboard(text: &str) -> bool {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => clipboard.set_text(text.to_owned()).is_ok(),
        Err(error) => {
            debug!(%error, "system clipboard unavailable");
            false
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_newlines() {
        assert_eq!(clip_preview("fn main() {\n}"), "fn main() {⏎}");
    }

    #[test]
    fn preview_truncates_long_text() {
        let text = "x".repeat(80);
        let preview = clip_preview(&text);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS + 1);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn preview_keeps_short_text_intact() {
        assert_eq!(clip_preview("short"), "short");
    }

    #[test]
    fn preview_counts_chars_not_bytes() {
        let text = "é".repeat(PREVIEW_MAX_CHARS);
        assert_eq!(clip_preview(&text), text);
    }
}
