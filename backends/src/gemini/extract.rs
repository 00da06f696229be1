//! Pure functions over captured Gemini panes.
//!
//! Replies are marked with `✦` (or `✧` while still rendering). Shell
//! output never appears in the reply itself; it stays inside the tool's
//! box, so extraction scrapes the newest box and carries the result on a
//! `__SHELL_OUTPUT__:` marker line the rest of the pipeline understands.

use std::sync::LazyLock;

use duet_types::SHELL_OUTPUT_MARKER;
use regex::Regex;

/// Frames of the CLI's braille activity spinner.
const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Input hint shown when the CLI is idle again.
pub(crate) const READY_HINT: &str = "Type your message";

const NO_CONTEXT_FALLBACK: &str = "Action pending confirmation";

/// How far above a lone reply marker the shell-box scan reaches. Used when
/// the buffer holds fewer than two markers and there is no previous marker
/// to bound the zone.
const SHELL_SCAN_REACH: usize = 210;

/// Tool names as the CLI prints them in confirmation prompts.
const TOOL_NAMES: [&str; 4] = ["WriteFile", "Shell", "EditFile", "DeleteFile"];

// Chrome and hint lines dropped from extracted replies. Matched
// case-insensitively against each stripped line.
static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^───+$",
        r"Type your message",
        r"esc to cancel",
        r"auto \|",
        r"sandbox",
        r"GEMINI\.md",
        r"^Using:",
        r"YOLO mode",
        r"^╭─+╮?$",
        r"^╰─+╯?$",
        r"^│\s*>\s*Type your",
        r"^│\s*$",
        r"Responding with gemini",
        r"Waiting for user confirmation",
        r"Request cancelled",
        r"^│\s*[✓⊷\-\+\?]\s*(ReadFile|WriteFile|EditFile|DeleteFile|Shell)",
        r"^│\s*\d+\s*[\-\+]",
    ]
    .into_iter()
    .map(|pattern| Regex::new(&format!("(?i){pattern}")).unwrap())
    .collect()
});

static MARKER_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[✦✧]\s*").unwrap());
static EXIT_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Command exited with code:|Error: Exit code)\s*(\d+)").unwrap()
});

fn is_marker_line(stripped: &str) -> bool {
    stripped.starts_with('✦') || stripped.starts_with('✧')
}

fn is_noise(stripped: &str) -> bool {
    NOISE_PATTERNS.iter().any(|pattern| pattern.is_match(stripped))
}

/// Number of reply markers in the buffer. Counts glyphs rather than lines;
/// a marker mid-line still means the CLI produced a reply.
#[must_use]
pub fn count_markers(raw: &str) -> usize {
    raw.chars().filter(|c| *c == '✦' || *c == '✧').count()
}

/// Whether the pane is waiting on a tool approval.
#[must_use]
pub fn is_confirmation(raw: &str) -> bool {
    raw.contains("Waiting for user confirmation") || raw.contains("Apply this change?")
}

/// Whether the CLI is idle: input hint back, spinner gone, nothing left
/// to cancel.
#[must_use]
pub fn is_idle(raw: &str) -> bool {
    raw.contains(READY_HINT)
        && !SPINNER_FRAMES.iter().any(|frame| raw.contains(*frame))
        && !raw.contains("esc to cancel")
}

/// Extract the newest reply from a captured pane.
///
/// `skip` is the number of replies that existed before the prompt was
/// sent; anything up to that count is an old message and yields an empty
/// string. When the reply ran a shell command, its box output is appended
/// on a [`SHELL_OUTPUT_MARKER`] line followed by the exit-code line.
#[must_use]
pub fn extract_response(raw: &str, skip: usize) -> String {
    let lines: Vec<&str> = raw.trim().split('\n').collect();

    // Marker indexes bound the shell-box scan to the current reply zone,
    // keeping boxes from earlier turns out of this message.
    let marker_indexes: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_marker_line(line.trim()))
        .map(|(i, _)| i)
        .collect();
    let last_marker_idx = marker_indexes.last().copied().unwrap_or(0);
    let scan_start = if marker_indexes.len() > 1 {
        marker_indexes[marker_indexes.len() - 2]
    } else {
        last_marker_idx.saturating_sub(SHELL_SCAN_REACH)
    };

    let (shell_output, exit_line) = scrape_shell_box(&lines[scan_start..=last_marker_idx]);

    let mut responses: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut in_response = false;

    for line in &lines {
        let stripped = line.trim();
        if is_marker_line(stripped) {
            if !current.is_empty() {
                responses.push(current.join("\n"));
            }
            let text = MARKER_PREFIX.replace(stripped, "").into_owned();
            current = if text.is_empty() { Vec::new() } else { vec![text] };
            in_response = true;
        } else if in_response {
            if stripped.contains(READY_HINT) {
                if !current.is_empty() {
                    responses.push(current.join("\n"));
                    current = Vec::new();
                }
                in_response = false;
            } else if !stripped.is_empty() && !is_noise(stripped) {
                current.push(stripped.to_owned());
            }
        }
    }
    if in_response && !current.is_empty() {
        responses.push(current.join("\n"));
    }

    let mut result = if responses.len() > skip {
        responses.last().cloned().unwrap_or_default()
    } else {
        String::new()
    };

    if !shell_output.is_empty() {
        let mut marker = format!("{SHELL_OUTPUT_MARKER}{}", shell_output.join("\n"));
        if let Some(exit) = &exit_line {
            marker.push('\n');
            marker.push_str(exit);
        }
        result = if result.is_empty() {
            marker
        } else {
            format!("{result}\n{marker}")
        };
    } else if let Some(exit) = exit_line {
        if !result.is_empty() {
            result.push('\n');
            result.push_str(&exit);
        }
    }

    result
}

/// Collect output lines and the exit-code line from the newest completed
/// Shell box in `zone`. Each `✓ Shell` header restarts the scrape, so only
/// the last box survives.
fn scrape_shell_box(zone: &[&str]) -> (Vec<String>, Option<String>) {
    let mut output: Vec<String> = Vec::new();
    let mut exit_line: Option<String> = None;
    let mut in_box = false;

    for line in zone {
        let stripped = line.trim();
        let clean = stripped
            .trim_matches(|c: char| c == '│' || c.is_whitespace())
            .to_owned();

        if stripped.contains('✓') && stripped.contains("Shell") {
            in_box = true;
            output.clear();
            exit_line = None;
            continue;
        }
        if stripped.starts_with('╰') || is_marker_line(stripped) {
            in_box = false;
            continue;
        }
        if in_box && !clean.is_empty() {
            if clean.contains("Command exited with code:") || clean.contains("Error: Exit code") {
                exit_line = Some(clean);
            } else if !clean.starts_with('╭') {
                output.push(clean);
            }
        }
    }
    (output, exit_line)
}

/// Pull the block from the last tool header through "Apply this change?".
///
/// Box characters are kept intact: [`GeminiParser`](super::GeminiParser)
/// reads the tool box out of this text.
#[must_use]
pub fn confirmation_context(raw: &str) -> String {
    let lines: Vec<&str> = raw.trim().split('\n').collect();

    let mut last_tool_idx = None;
    for (i, line) in lines.iter().enumerate() {
        let is_tool_line = TOOL_NAMES.iter().any(|name| line.contains(name))
            || (line.contains('?') && line.contains("Edit"));
        if is_tool_line {
            last_tool_idx = Some(i);
        }
    }
    let Some(start) = last_tool_idx else {
        return NO_CONTEXT_FALLBACK.to_owned();
    };

    let mut context: Vec<&str> = Vec::new();
    for line in &lines[start..] {
        if line.contains("Apply this change?") {
            break;
        }
        let stripped = line.trim();
        if !stripped.is_empty() {
            context.push(stripped);
        }
    }
    if context.is_empty() {
        NO_CONTEXT_FALLBACK.to_owned()
    } else {
        context.join("\n")
    }
}

/// Exit code and shell output carried by extracted content.
///
/// The output travels on the marker appended by [`extract_response`]; the
/// exit code sits on its own line in either CLI phrasing.
#[must_use]
pub fn tool_result(content: &str) -> (Option<i32>, Option<String>) {
    let exit_code = EXIT_CODE
        .captures(content)
        .and_then(|captures| captures[1].parse().ok());

    let output = content.find(SHELL_OUTPUT_MARKER).and_then(|pos| {
        let rest = &content[pos + SHELL_OUTPUT_MARKER.len()..];
        let rest = match rest.find("Command exited") {
            Some(end) => &rest[..end],
            None => rest,
        };
        let trimmed = rest.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    });

    (exit_code, output)
}

/// Drop the shell marker and everything after it.
#[must_use]
pub fn strip_shell_marker(content: &str) -> String {
    match content.find(SHELL_OUTPUT_MARKER) {
        Some(pos) => content[..pos].trim().to_owned(),
        None => content.trim().to_owned(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE_PANE: &str = "\
✦ The refactor looks safe to me.

╭──────────────────────────────╮
│ > Type your message          │
╰──────────────────────────────╯
  auto | gemini-2.5-flash";

    #[test]
    fn extracts_latest_reply() {
        let content = extract_response(IDLE_PANE, 0);
        assert_eq!(content, "The refactor looks safe to me.");
    }

    #[test]
    fn old_replies_are_skipped_by_count() {
        // One reply on screen, but one already existed before the prompt.
        assert_eq!(extract_response(IDLE_PANE, 1), "");
    }

    #[test]
    fn picks_last_of_several_replies() {
        let pane = "\
✦ First answer.
✦ Second answer.
Type your message";
        assert_eq!(extract_response(pane, 0), "Second answer.");
        assert_eq!(extract_response(pane, 1), "Second answer.");
    }

    #[test]
    fn noise_lines_are_dropped() {
        let pane = "\
✦ Done with the change.
Using: 1 GEMINI.md file
Responding with gemini-2.5-flash
esc to cancel
Type your message";
        assert_eq!(extract_response(pane, 0), "Done with the change.");
    }

    #[test]
    fn continuation_lines_join_the_reply() {
        let pane = "\
✦ First line of the answer.
second line continues here.
Type your message";
        assert_eq!(
            extract_response(pane, 0),
            "First line of the answer.\nsecond line continues here."
        );
    }

    #[test]
    fn shell_box_is_scraped_onto_marker() {
        let pane = "\
╭──────────────────────────────╮
│ ✓  Shell echo hello          │
│                              │
│ hello                        │
│ Command exited with code: 0  │
╰──────────────────────────────╯
✦ Ran the command.
Type your message";
        let content = extract_response(pane, 0);
        assert!(content.starts_with("Ran the command."));
        assert!(content.contains(&format!("{SHELL_OUTPUT_MARKER}hello")));
        assert!(content.ends_with("Command exited with code: 0"));
    }

    #[test]
    fn older_shell_box_does_not_leak_into_new_reply() {
        let pane = "\
│ ✓  Shell echo old            │
│ old output                   │
╰──────────────────────────────╯
✦ Earlier reply.
✦ New reply without a command.
Type your message";
        let content = extract_response(pane, 1);
        assert_eq!(content, "New reply without a command.");
    }

    #[test]
    fn newest_shell_box_wins() {
        let pane = "\
✦ Earlier reply.
│ ✓  Shell echo one            │
│ one                          │
╰──────────────────────────────╯
│ ✓  Shell echo two            │
│ two                          │
│ Command exited with code: 0  │
╰──────────────────────────────╯
✦ Ran both.
Type your message";
        let content = extract_response(pane, 0);
        assert!(content.contains(&format!("{SHELL_OUTPUT_MARKER}two")));
        assert!(!content.contains("one\n"));
    }

    #[test]
    fn marker_glyphs_count_anywhere() {
        assert_eq!(count_markers("✦ one\ntext ✧ two"), 2);
        assert_eq!(count_markers("no markers"), 0);
    }

    #[test]
    fn confirmation_is_detected_by_either_phrase() {
        assert!(is_confirmation("... Waiting for user confirmation ..."));
        assert!(is_confirmation("Apply this change?"));
        assert!(!is_confirmation("✦ nothing pending"));
    }

    #[test]
    fn idle_requires_hint_without_spinner_or_cancel() {
        assert!(is_idle("✦ done\nType your message"));
        assert!(!is_idle("⠹ working\nType your message"));
        assert!(!is_idle("Type your message\nesc to cancel"));
        assert!(!is_idle("✦ done"));
    }

    #[test]
    fn confirmation_context_keeps_box_lines() {
        let pane = "\
✦ Let me write that file.
╭──────────────────────────────╮
│ ? WriteFile Writing to x.py  │
│ 1 + print('hi')              │
╰──────────────────────────────╯
Apply this change?
  1. Yes, allow once";
        let context = confirmation_context(pane);
        assert!(context.starts_with("│ ? WriteFile"));
        assert!(context.contains("1 + print('hi')"));
        assert!(!context.contains("Apply this change?"));
    }

    #[test]
    fn confirmation_context_uses_last_tool() {
        let pane = "\
│ ✓ Shell echo done │
some text
│ ? Shell rm -rf target │
Apply this change?";
        let context = confirmation_context(pane);
        assert!(context.contains("rm -rf target"));
        assert!(!context.contains("echo done"));
    }

    #[test]
    fn confirmation_context_falls_back_without_tool() {
        assert_eq!(confirmation_context("nothing here"), NO_CONTEXT_FALLBACK);
    }

    #[test]
    fn tool_result_reads_marker_and_exit() {
        let content = format!("Done.\n{SHELL_OUTPUT_MARKER}hello\nworld\nCommand exited with code: 2");
        let (code, output) = tool_result(&content);
        assert_eq!(code, Some(2));
        assert_eq!(output.as_deref(), Some("hello\nworld"));
    }

    #[test]
    fn tool_result_without_marker() {
        let (code, output) = tool_result("plain reply, nothing ran");
        assert_eq!(code, None);
        assert_eq!(output, None);
    }

    #[test]
    fn tool_result_accepts_claude_phrasing() {
        let (code, _) = tool_result("Error: Exit code 127");
        assert_eq!(code, Some(127));
    }

    #[test]
    fn strip_shell_marker_cuts_tail() {
        let content = format!("Reply text.\n{SHELL_OUTPUT_MARKER}noise\nCommand exited with code: 0");
        assert_eq!(strip_shell_marker(&content), "Reply text.");
        assert_eq!(strip_shell_marker("untouched"), "untouched");
    }
}
