//! Walkers for the box-drawn previews both CLIs render.
//!
//! Tool previews arrive as `╭─ ... ─╯` blocks whose body lines may carry
//! numbered diff markers (`39 + code`). Both parsers share the frame
//! handling here and keep their CLI-specific headers to themselves.

use std::sync::LazyLock;

use duet_types::{DiffLine, ToolAction, ToolKind};
use regex::Regex;

pub(crate) static BOX_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^╭─+╮?$").unwrap());
pub(crate) static BOX_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^╰─+╯?$").unwrap());
pub(crate) static BOX_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^│(.*)│$").unwrap());

pub(crate) static LINE_ADDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*\+\s*(.*)$").unwrap());
pub(crate) static LINE_REMOVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*-\s*(.*)$").unwrap());
pub(crate) static LINE_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(.*)$").unwrap());

static PATH_TRAILER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+←?\s*$").unwrap());

/// Strip the scroll arrow tmux appends to truncated lines.
pub(crate) fn clean_path(path: &str) -> String {
    PATH_TRAILER.replace(path, "").trim().to_owned()
}

/// Unwrap each line from the pane's outer `│ ... │` frame, if present.
///
/// Captures taken while a popup overlays the pane arrive with every line
/// wrapped in a second frame; only those lines are unwrapped.
pub(crate) fn preprocess(raw: &str) -> Vec<String> {
    raw.trim()
        .split('\n')
        .map(|raw_line| {
            let stripped = raw_line.trim();
            if stripped.starts_with('│') && stripped.ends_with('│') && stripped.chars().count() > 2
            {
                let edge = '│'.len_utf8();
                let inner = &stripped[edge..stripped.len() - edge];
                if inner.starts_with(' ') || inner.starts_with('╭') || inner.starts_with('╰') {
                    return inner.trim().to_owned();
                }
            }
            stripped.to_owned()
        })
        .collect()
}

/// Collect the lines between a `╭─` and its `╰─`, unwrapping any interior
/// `│` frames. Returns the content and the index of the closing line.
pub(crate) fn extract_box(lines: &[String], start_idx: usize) -> (Vec<String>, usize) {
    let mut box_lines: Vec<String> = Vec::new();
    let mut i = start_idx + 1;

    while i < lines.len() {
        let line = lines[i].trim();
        if BOX_END.is_match(line) {
            return (box_lines, i);
        }
        if let Some(captures) = BOX_LINE.captures(line) {
            box_lines.push(captures[1].trim_end().to_owned());
        } else if let Some(rest) = line.strip_prefix('│') {
            box_lines.push(rest.trim_end_matches('│').trim_end().to_owned());
        } else {
            // Preprocessing may have stripped the frame already.
            box_lines.push(line.to_owned());
        }
        i += 1;
    }
    (box_lines, i.saturating_sub(1))
}

/// Split a header's argument text into path and description at the first
/// colon, e.g. `x.py: old => new`.
pub(crate) fn split_header_rest(rest: &str) -> (String, String) {
    match rest.find(':') {
        Some(idx) => (
            rest[..idx].trim().to_owned(),
            rest[idx + 1..].trim().to_owned(),
        ),
        None => (rest.trim().to_owned(), String::new()),
    }
}

/// Parse a box whose tool header sits inside it.
///
/// `parse_header` is the CLI-specific matcher, returning kind, path, and
/// description for a header line. Diff lines are read the shared way.
/// Returns `None` unless a header with a path was found.
pub(crate) fn parse_box<F>(box_lines: &[String], parse_header: F) -> Option<ToolAction>
where
    F: Fn(&str) -> Option<(ToolKind, String, String)>,
{
    let mut kind: Option<ToolKind> = None;
    let mut file_path = String::new();
    let mut description = String::new();
    let mut diff: Vec<DiffLine> = Vec::new();

    for line in box_lines {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if let Some((header_kind, path, desc)) = parse_header(stripped) {
            kind = Some(header_kind);
            file_path = path;
            description = desc;
            continue;
        }
        if let Some(captures) = LINE_ADDED.captures(stripped) {
            diff.push(DiffLine::added(&captures[2]));
            continue;
        }
        if let Some(captures) = LINE_REMOVED.captures(stripped) {
            diff.push(DiffLine::removed(&captures[2]));
            continue;
        }
        if let Some(captures) = LINE_CONTEXT.captures(stripped) {
            diff.push(DiffLine::context(&captures[2]));
        }
    }

    let kind = kind?;
    if file_path.is_empty() {
        return None;
    }
    let mut info = ToolAction::new(kind, file_path);
    info.description = description;
    info.diff = diff;
    Some(info)
}

/// Parse numbered diff lines (`39 + code`, `40 - code`, `41   code`).
///
/// Context lines become additions when `all_added` is set: a file being
/// created has no prior content to be context of. Returns empty when no
/// line carried a number, so callers can fall back to raw content.
pub(crate) fn numbered_diff(lines: &[String], all_added: bool) -> Vec<DiffLine> {
    let mut diff: Vec<DiffLine> = Vec::new();

    for line in lines {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if let Some(captures) = LINE_ADDED.captures(stripped) {
            diff.push(DiffLine::added(&captures[2]));
            continue;
        }
        if let Some(captures) = LINE_REMOVED.captures(stripped) {
            diff.push(DiffLine::removed(&captures[2]));
            continue;
        }
        if let Some(captures) = LINE_CONTEXT.captures(stripped) {
            if all_added {
                diff.push(DiffLine::added(&captures[2]));
            } else {
                diff.push(DiffLine::context(&captures[2]));
            }
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_types::DiffSign;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| (*line).to_owned()).collect()
    }

    #[test]
    fn preprocess_unwraps_outer_frame() {
        let raw = "│ ╭──────╮ │\n│ │ body │ │\n│ ╰──────╯ │";
        let processed = preprocess(raw);
        assert_eq!(processed[0], "╭──────╮");
        assert_eq!(processed[1], "│ body │");
        assert_eq!(processed[2], "╰──────╯");
    }

    #[test]
    fn preprocess_keeps_plain_box_lines() {
        // No leading space inside the frame: this is the box itself, not a
        // wrapper around it.
        let processed = preprocess("│x│");
        assert_eq!(processed[0], "│x│");
    }

    #[test]
    fn extract_box_stops_at_close() {
        let input = lines(&["╭────╮", "│ a │", "│ b │", "╰────╯", "after"]);
        let (content, end) = extract_box(&input, 0);
        assert_eq!(content, vec![" a", " b"]);
        assert_eq!(end, 3);
    }

    #[test]
    fn extract_box_without_close_consumes_rest() {
        let input = lines(&["╭────╮", "│ a │"]);
        let (content, end) = extract_box(&input, 0);
        assert_eq!(content, vec![" a"]);
        assert_eq!(end, 1);
    }

    #[test]
    fn numbered_diff_reads_markers() {
        let input = lines(&["36   old()", "37 - removed()", "38 + added()"]);
        let diff = numbered_diff(&input, false);
        assert_eq!(diff.len(), 3);
        assert_eq!(diff[0].sign, DiffSign::Context);
        assert_eq!(diff[1].sign, DiffSign::Removed);
        assert_eq!(diff[1].text, "removed()");
        assert_eq!(diff[2].sign, DiffSign::Added);
    }

    #[test]
    fn numbered_diff_all_added_promotes_context() {
        let input = lines(&["1   def main():", "2       pass"]);
        let diff = numbered_diff(&input, true);
        assert!(diff.iter().all(|line| line.sign == DiffSign::Added));
    }

    #[test]
    fn numbered_diff_empty_without_numbers() {
        let input = lines(&["print('hello')", "return 0"]);
        assert!(numbered_diff(&input, false).is_empty());
    }

    #[test]
    fn clean_path_strips_scroll_arrow() {
        assert_eq!(clean_path("src/main.py   ←  "), "src/main.py");
        assert_eq!(clean_path("src/main.py"), "src/main.py");
    }
}
