//! Pure functions over captured Claude panes.
//!
//! The CLI renders replies as `●`-bulleted prose interleaved with tool
//! calls, boxed previews, and footer chrome. Everything here works on the
//! captured text alone, so it can be tested without tmux.

use std::sync::LazyLock;

use regex::Regex;

/// Glyph the CLI's activity spinner always starts with.
const SPINNER: char = '✻';

const NO_CONTEXT_FALLBACK: &str = "Action pending confirmation";

// Chrome and hint lines dropped from extracted replies. Matched
// case-insensitively against each stripped line.
static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^✻.*interrupt",
        r"^─+$",
        r"Thinking",
        r"Philosophising",
        r"Pondering",
        r"Reasoning",
        r"ctrl-[gc]",
        r"tab to toggle",
        r"shift\+tab",
        r"Shift \+ Enter",
        r"^>\s*Try",
        r"^>\s*$",
        r"bypass permissions",
        r"to cycle",
        r"Welcome back",
        r"Tips for getting",
        r"default mode",
        r"plan mode",
        r"esc to interrupt",
        r"^Do you want to",
        r"^❯?\s*\d+\.\s*(Yes|No|Type)",
        r"^Esc to cancel",
    ]
    .into_iter()
    .map(|pattern| Regex::new(&format!("(?i){pattern}")).unwrap())
    .collect()
});

static TOOL_CALL_PAREN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^●\s*\w+\(").unwrap());
static TOOL_CALL_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^●\s*(?:Write|Update|Read|Bash|Delete):").unwrap());
static TOOL_ARGS_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^●\s*(\w+)\((.*)$").unwrap());
static TOOL_ARGS_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^●\s*(\w+):\s*(.*)$").unwrap());
static TOOL_STATUS_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[✓✗]\s*$").unwrap());
static DIFF_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^╌{3,}$").unwrap());
// Case-sensitive on purpose: these are the CLI's own labels.
static TOOL_LABEL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:Edit file|Create file|Bash command)").unwrap());
static PROMPT_ECHO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^>\s*\[").unwrap());
static EXIT_CODE_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Error: Exit code\s*(\d+)").unwrap());
static EXIT_CODE_STRICT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Error: Exit code (\d+)").unwrap());
static BASH_CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^●\s*Bash\(").unwrap());
static RESULT_MARKER_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^⎿\s*").unwrap());
static SEPARATOR_RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^─{3,}$").unwrap());

/// Extract the last text reply from a captured pane, with one-line
/// summaries for any tool calls that ran inside it.
///
/// Returns the reply and the buffer line index of its `●` marker. The pane
/// scrolls while the CLI works, so pollers compare the marker line's
/// content across captures rather than trusting the index.
#[must_use]
pub fn extract_response(raw: &str) -> (String, Option<usize>) {
    let lines: Vec<&str> = raw.trim().split('\n').collect();

    // Last ● that starts prose rather than a tool call.
    let mut last_text_idx = None;
    for (i, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        let is_tool_line =
            TOOL_CALL_PAREN.is_match(stripped) || TOOL_CALL_COLON.is_match(stripped);
        if stripped.starts_with('●') && !is_tool_line {
            last_text_idx = Some(i);
        }
    }
    let Some(start) = last_text_idx else {
        return (String::new(), None);
    };

    let mut result_lines: Vec<String> = Vec::new();
    let mut in_response = false;
    let mut in_tool = false;
    let mut in_tool_box = false;
    let mut in_diff_block = false;
    let mut tool_summary: Option<String> = None;
    let mut tool_failed = false;

    for line in &lines[start..] {
        let stripped = line.trim();

        // Boxed previews (╭─ ... ╰─) are rendered separately by the tool
        // card, never inlined into prose.
        if stripped.starts_with("╭─") {
            in_tool_box = true;
            continue;
        }
        if stripped.starts_with("╰─") {
            in_tool_box = false;
            continue;
        }
        if in_tool_box {
            continue;
        }

        if DIFF_FENCE.is_match(stripped) {
            in_diff_block = !in_diff_block;
            continue;
        }
        if in_diff_block {
            continue;
        }

        if TOOL_LABEL_LINE.is_match(stripped) {
            continue;
        }

        let tool_call = TOOL_ARGS_PAREN
            .captures(stripped)
            .or_else(|| TOOL_ARGS_COLON.captures(stripped));
        if let Some(call) = tool_call {
            if let Some(summary) = tool_summary.take() {
                result_lines.push(summarize_tool(&summary, tool_failed));
            }
            let name = &call[1];
            let args = call[2].trim_end_matches(')').trim();
            let args = TOOL_STATUS_SUFFIX.replace(args, "");
            let args = truncate_chars(&args, 50, 47);
            tool_summary = Some(format!("{name}: {args}"));
            tool_failed = false;
            in_tool = true;
            continue;
        }

        if stripped.starts_with('⎿') {
            in_tool = true;
            if stripped.to_lowercase().contains("error") {
                tool_failed = true;
            }
            continue;
        }

        if in_tool {
            if stripped.starts_with('…') || stripped.contains("(ctrl+o") {
                continue;
            }
            if stripped.to_lowercase().contains("error") {
                tool_failed = true;
            }
            // Indented lines belong to the tool's output block.
            if line.starts_with("     ") || line.starts_with('\t') {
                continue;
            }
            if let Some(summary) = tool_summary.take() {
                result_lines.push(summarize_tool(&summary, tool_failed));
            }
            in_tool = false;
            // Not a continuation line, so it is handled below.
        }

        if stripped.starts_with('●') {
            let text = stripped.strip_prefix('●').unwrap_or(stripped).trim_start();
            if !text.is_empty() {
                result_lines.push(text.to_owned());
            }
            in_response = true;
            continue;
        }

        // The echoed user prompt ("> [User] ...") ends the reply.
        if PROMPT_ECHO.is_match(stripped) {
            break;
        }

        if in_response {
            let is_noise = NOISE_PATTERNS.iter().any(|p| p.is_match(stripped));
            if !is_noise && !stripped.is_empty() {
                result_lines.push(stripped.to_owned());
            }
        }
    }

    if let Some(summary) = tool_summary.take() {
        result_lines.push(summarize_tool(&summary, tool_failed));
    }

    let mut content = result_lines.join("\n");

    // Exit codes live inside tool boxes, which the loop above skips.
    // Re-attach so failures stay visible in the reply.
    if let Some(captures) = EXIT_CODE_ANYWHERE.captures(raw) {
        if !content.is_empty() && !content.contains("Error: Exit code") {
            content.push_str("\nError: Exit code ");
            content.push_str(&captures[1]);
        }
    }

    (content, Some(start))
}

fn summarize_tool(summary: &str, failed: bool) -> String {
    let status = if failed { '✗' } else { '✓' };
    format!("  ⎿ {summary} {status}")
}

fn truncate_chars(text: &str, max: usize, keep: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(keep).collect();
        format!("{head}...")
    } else {
        text.to_owned()
    }
}

/// Content of the buffer line at `idx`, stripped. Empty when out of range.
#[must_use]
pub fn marker_line(raw: &str, idx: Option<usize>) -> String {
    let Some(idx) = idx else {
        return String::new();
    };
    raw.trim()
        .split('\n')
        .nth(idx)
        .map(|line| line.trim().to_owned())
        .unwrap_or_default()
}

/// Number of `●` bullets in the buffer. Distinguishes a fresh reply whose
/// text happens to match the previous one.
#[must_use]
pub fn count_markers(raw: &str) -> usize {
    raw.trim()
        .split('\n')
        .filter(|line| line.trim().starts_with('●'))
        .count()
}

/// Whether the pane is showing a permission menu.
#[must_use]
pub fn is_confirmation(raw: &str) -> bool {
    raw.contains("Do you want to") && raw.contains("1. Yes")
}

/// Whether the reply has finished: the input prompt is back in the last
/// five lines and the spinner is gone.
#[must_use]
pub fn is_complete(raw: &str) -> bool {
    if raw.contains(SPINNER) {
        return false;
    }
    raw.trim()
        .split('\n')
        .rev()
        .take(5)
        .map(str::trim)
        .any(|line| line == ">" || line.starts_with("> "))
}

/// Exit code and output of the first completed Bash tool in the buffer.
///
/// Used when a reply consists only of tool calls (chained confirmations)
/// and there is no prose to extract. Only the first tool is read; a second
/// `● Bash(` ends the scan.
#[must_use]
pub fn first_tool_result(raw: &str) -> (Option<i32>, Option<String>) {
    let mut exit_code = None;
    let mut output_lines: Vec<String> = Vec::new();
    let mut in_result = false;
    let mut found_tool = false;

    for line in raw.trim().split('\n') {
        let stripped = line.trim();

        if BASH_CALL.is_match(stripped) {
            if found_tool {
                break;
            }
            found_tool = true;
            continue;
        }

        if found_tool && stripped.starts_with('⎿') {
            in_result = true;
            if let Some(captures) = EXIT_CODE_STRICT.captures(stripped) {
                exit_code = captures[1].parse().ok();
            } else {
                let inline = RESULT_MARKER_PREFIX.replace(stripped, "");
                if !inline.is_empty() {
                    output_lines.push(inline.into_owned());
                }
            }
            continue;
        }

        if in_result {
            if stripped.is_empty()
                || stripped.starts_with('●')
                || stripped.starts_with('>')
                || stripped.starts_with('─')
            {
                break;
            }
            // Stderr continuation lines are indented under the ⎿ marker.
            if line.starts_with("     ") {
                output_lines.push(stripped.to_owned());
            }
        }
    }

    let output = if output_lines.is_empty() {
        None
    } else {
        Some(output_lines.join("\n"))
    };
    (exit_code, output)
}

/// Pull the text between the CLI's separator rule and the "Do you want to"
/// menu line. That block names the tool and shows its preview.
#[must_use]
pub fn confirmation_context(raw: &str) -> String {
    let lines: Vec<&str> = raw.trim().split('\n').collect();

    let Some(confirm_idx) = lines.iter().position(|l| l.contains("Do you want to")) else {
        return NO_CONTEXT_FALLBACK.to_owned();
    };

    let separator_idx = lines[..confirm_idx]
        .iter()
        .rposition(|l| SEPARATOR_RULE.is_match(l.trim()));

    let start = if let Some(sep) = separator_idx {
        sep + 1
    } else if let Some(tool_use) = lines
        .iter()
        .position(|l| l.trim() == "Tool use")
        .filter(|&idx| idx < confirm_idx)
    {
        tool_use
    } else if let Some(bullet) = lines[..confirm_idx].iter().rposition(|l| l.contains('●')) {
        bullet
    } else {
        confirm_idx.saturating_sub(10)
    };

    let context: Vec<&str> = lines[start..confirm_idx]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    if context.is_empty() {
        NO_CONTEXT_FALLBACK.to_owned()
    } else {
        context.join("\n")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN_REPLY: &str = "\
╭───────────────────────────╮
│ ✻ Welcome to Claude Code! │
╰───────────────────────────╯

> [User] say hi

● Hello! How can I help you today?

╭──────────────────────────────╮
│ >                            │
╰──────────────────────────────╯";

    const REPLY_WITH_TOOL: &str = "\
> [User] run echo

● Running the command now.

● Bash(echo hello)
  ⎿ hello

╭──────────────────────────────╮
│ >                            │
╰──────────────────────────────╯";

    const FAILED_TOOL: &str = "\
● Checking the file.

● Bash(cat /missing/file.txt)
  ⎿  Error: Exit code 1
     cat: /missing/file.txt: No such file or directory

╭──────────────────────────────╮
│ >                            │
╰──────────────────────────────╯";

    const CONFIRMATION_PANE: &str = "\
● I'll create the file.

● Write(notes.txt)

──────────────────────────────────────────────
Create file notes.txt
╭──────────────────────────────╮
│ hello from claude            │
╰──────────────────────────────╯
Do you want to create notes.txt?
❯ 1. Yes
  2. Yes, and don't ask again
  3. No
Esc to cancel";

    #[test]
    fn plain_reply_is_extracted() {
        let (content, idx) = extract_response(PLAIN_REPLY);
        assert_eq!(content, "Hello! How can I help you today?");
        assert!(idx.is_some());
    }

    #[test]
    fn welcome_banner_inside_box_is_ignored() {
        // The banner line starts with ✻ but sits inside a box before any
        // text marker; there is no reply to extract.
        let pane = "╭───╮\n│ ✻ Welcome │\n╰───╯\n> ";
        let (content, idx) = extract_response(pane);
        assert_eq!(content, "");
        assert_eq!(idx, None);
    }

    #[test]
    fn tool_call_becomes_one_line_summary() {
        let (content, _) = extract_response(REPLY_WITH_TOOL);
        assert_eq!(content, "Running the command now.\n  ⎿ Bash: echo hello ✓");
    }

    #[test]
    fn failed_tool_is_marked_and_exit_code_reattached() {
        let (content, _) = extract_response(FAILED_TOOL);
        assert!(content.starts_with("Checking the file."));
        assert!(content.contains("⎿ Bash: cat /missing/file.txt ✗"));
        assert!(content.ends_with("Error: Exit code 1"));
    }

    #[test]
    fn long_tool_args_are_truncated() {
        let args = "x".repeat(80);
        let pane = format!("● Listing.\n● Bash({args})\n  ⎿ done\n> ");
        let (content, _) = extract_response(&pane);
        let expected = format!("  ⎿ Bash: {}...", "x".repeat(47));
        assert!(content.contains(&expected), "got: {content}");
    }

    #[test]
    fn footer_hints_are_filtered() {
        let pane = "\
● Done.
? for shortcuts
  esc to interrupt
shift+tab to cycle
> ";
        let (content, _) = extract_response(pane);
        assert_eq!(content, "Done.\n? for shortcuts");
    }

    #[test]
    fn reply_stops_at_echoed_prompt() {
        let pane = "● First answer.\n> [User] next question\nstray line";
        let (content, _) = extract_response(pane);
        assert_eq!(content, "First answer.");
    }

    #[test]
    fn marker_index_tracks_last_text_bullet() {
        let (_, idx) = extract_response(REPLY_WITH_TOOL);
        let lines: Vec<&str> = REPLY_WITH_TOOL.trim().split('\n').collect();
        let idx = idx.unwrap();
        assert_eq!(lines[idx].trim(), "● Running the command now.");
    }

    #[test]
    fn marker_line_out_of_range_is_empty() {
        assert_eq!(marker_line("● hi", Some(99)), "");
        assert_eq!(marker_line("● hi", None), "");
    }

    #[test]
    fn marker_count_includes_tool_bullets() {
        assert_eq!(count_markers(REPLY_WITH_TOOL), 2);
        assert_eq!(count_markers(PLAIN_REPLY), 1);
    }

    #[test]
    fn completion_requires_prompt_and_no_spinner() {
        assert!(is_complete("● Done.\n> "));
        assert!(is_complete("● Done.\n>\nfooter\nfooter2"));
        assert!(!is_complete("✻ Pondering...\n> "));
        assert!(!is_complete("● still writing"));
    }

    #[test]
    fn prompt_outside_last_five_lines_is_not_completion() {
        let pane = format!("> \n{}", "filler\n".repeat(6));
        assert!(!is_complete(&pane));
    }

    #[test]
    fn confirmation_detection_needs_menu() {
        assert!(is_confirmation(CONFIRMATION_PANE));
        assert!(!is_confirmation("Do you want to continue? y/n"));
    }

    #[test]
    fn confirmation_context_spans_separator_to_menu() {
        let context = confirmation_context(CONFIRMATION_PANE);
        assert!(context.starts_with("Create file notes.txt"));
        assert!(context.contains("hello from claude"));
        assert!(!context.contains("Do you want to"));
        assert!(!context.contains("1. Yes"));
    }

    #[test]
    fn confirmation_context_falls_back_to_last_bullet() {
        let pane = "● Write(notes.txt)\npreview line\nDo you want to create notes.txt?";
        let context = confirmation_context(pane);
        assert_eq!(context, "● Write(notes.txt)\npreview line");
    }

    #[test]
    fn confirmation_context_without_menu_is_fallback() {
        assert_eq!(confirmation_context("● hi\n> "), NO_CONTEXT_FALLBACK);
    }

    #[test]
    fn first_tool_result_success() {
        let (exit, output) = first_tool_result(REPLY_WITH_TOOL);
        assert_eq!(exit, None);
        assert_eq!(output.as_deref(), Some("hello"));
    }

    #[test]
    fn first_tool_result_error_with_stderr() {
        let (exit, output) = first_tool_result(FAILED_TOOL);
        assert_eq!(exit, Some(1));
        assert_eq!(
            output.as_deref(),
            Some("cat: /missing/file.txt: No such file or directory")
        );
    }

    #[test]
    fn first_tool_result_ignores_second_tool() {
        let pane = "\
● Bash(echo first)
  ⎿ first output
● Bash(echo second)
  ⎿ second output
> ";
        let (_, output) = first_tool_result(pane);
        let output = output.unwrap();
        assert!(output.contains("first output"));
        assert!(!output.contains("second output"));
    }

    #[test]
    fn first_tool_result_absent_without_bash() {
        let (exit, output) = first_tool_result("● Just prose here.\n> ");
        assert_eq!(exit, None);
        assert_eq!(output, None);
    }
}
