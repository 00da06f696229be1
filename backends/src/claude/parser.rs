//! Structured tool-call parsing for Claude panes.
//!
//! Confirmation prompts name the tool and preview its effect in a
//! box-drawn block. This parser turns that block into a [`ToolAction`] so
//! the approval pane can render a real diff instead of raw pane text.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use duet_types::{DiffLine, ToolAction, ToolKind};
use regex::Regex;

use crate::boxes;
use crate::probe::{PathProbe, SystemProbe};

// Edits render their diff between ╌╌╌ fences instead of a box.
static EDIT_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^╌+$").unwrap());

static TOOL_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*●?\s*(Write|Update|Bash|Read|Delete)\s*\((.+?)\)?\s*$").unwrap()
});
static EDIT_FILE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Edit file\s+(.+?)\s*$").unwrap());
static FILE_ACTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:Overwrite|Create) file\s*$").unwrap());
static BASH_COMMAND_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Bash command\s*$").unwrap());

static EXIT_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Command exited with code:|Error: Exit code)\s*(\d+)").unwrap()
});
static CAT_REDIRECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^cat\s*>>?\s*([^\s<]+)").unwrap());

// Chrome skipped when a preview has no numbered diff lines and the raw
// content is taken as the diff body.
static RAW_BODY_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^cat\s*>",
        r"^EOF$",
        r"^<<\s*'?EOF'?",
        r"^⎿",
        r"^─+$",
        r"^Bash command$",
        r"^Create .* file$",
        r"^Running",
    ]
    .into_iter()
    .map(|pattern| Regex::new(&format!("(?i){pattern}")).unwrap())
    .collect()
});

/// Header seen before its box: the tool kind plus the target path, or
/// `path: None` when the path is the first line inside the box.
struct PendingHeader {
    kind: ToolKind,
    path: Option<String>,
}

pub struct ClaudeParser {
    probe: Arc<dyn PathProbe>,
}

impl ClaudeParser {
    #[must_use]
    pub fn new(probe: Arc<dyn PathProbe>) -> Self {
        Self { probe }
    }

    /// Parser probing the real filesystem.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Arc::new(SystemProbe))
    }

    /// Split pane text into prose and, if present, one tool action.
    ///
    /// Handles both header placements: inside the box (`│ Write(x.py) │`)
    /// and Claude's usual header-before-box layout, plus the fenced diff
    /// format edits use.
    #[must_use]
    pub fn parse(&self, raw: &str) -> (String, Option<ToolAction>) {
        let lines = boxes::preprocess(raw);
        let mut text_lines: Vec<String> = Vec::new();
        let mut action: Option<ToolAction> = None;
        let mut pending: Option<PendingHeader> = None;

        let mut i = 0;
        while i < lines.len() {
            let line = &lines[i];

            if let Some(captures) = EDIT_FILE_HEADER.captures(line) {
                pending = Some(PendingHeader {
                    kind: ToolKind::Edit,
                    path: Some(boxes::clean_path(&captures[1])),
                });
                i += 1;
                continue;
            }

            // "Overwrite file" / "Create file": the path is the first line
            // inside the box that follows.
            if FILE_ACTION_HEADER.is_match(line) {
                pending = Some(PendingHeader {
                    kind: ToolKind::WriteFile,
                    path: None,
                });
                i += 1;
                continue;
            }

            // "Bash command" label: command on the next line, description
            // on the one after.
            if BASH_COMMAND_HEADER.is_match(line) {
                let command = lines.get(i + 1).map(|l| l.trim().to_owned()).unwrap_or_default();
                let mut info = ToolAction::new(ToolKind::Shell, command);
                info.description =
                    lines.get(i + 2).map(|l| l.trim().to_owned()).unwrap_or_default();
                action = Some(info);
                i += 3;
                continue;
            }

            if let Some(captures) = TOOL_HEADER.captures(line) {
                if !boxes::BOX_LINE.is_match(line) {
                    let kind = normalize_kind(&captures[1]);
                    let rest = captures[2].trim();
                    let (kind, path) = resolve_target(kind, rest);
                    pending = Some(PendingHeader {
                        kind,
                        path: Some(path),
                    });
                    i += 1;
                    continue;
                }
            }

            if boxes::BOX_START.is_match(line) {
                let (mut box_lines, end_idx) = boxes::extract_box(&lines, i);
                if !box_lines.is_empty() {
                    if let Some(parsed) = parse_box(&box_lines) {
                        action = Some(parsed);
                    } else if let Some(header) = pending.take() {
                        let path = match header.path {
                            Some(path) => path,
                            None => {
                                let first = boxes::clean_path(&box_lines[0]);
                                box_lines.remove(0);
                                first
                            }
                        };
                        let all_added = header.kind == ToolKind::WriteFile;
                        let mut info = ToolAction::new(header.kind, path);
                        info.diff = extract_diff(&box_lines, all_added);
                        action = Some(info);
                    }
                }
                pending = None;
                i = end_idx + 1;
                continue;
            }

            if EDIT_SEPARATOR.is_match(line) && pending.is_some() {
                let mut body: Vec<String> = Vec::new();
                i += 1;
                while i < lines.len() {
                    if EDIT_SEPARATOR.is_match(&lines[i]) {
                        i += 1;
                        break;
                    }
                    body.push(lines[i].clone());
                    i += 1;
                }
                if let Some(header) = pending.take() {
                    let all_added = header.kind == ToolKind::WriteFile;
                    let mut info =
                        ToolAction::new(header.kind, header.path.unwrap_or_default());
                    info.diff = extract_diff(&body, all_added);
                    action = Some(info);
                }
                continue;
            }

            text_lines.push(line.clone());
            i += 1;
        }

        // Header with no box at all: whatever followed it is the content.
        if action.is_none() {
            if let Some(header) = pending.take() {
                let all_added = header.kind == ToolKind::WriteFile;
                let mut info = ToolAction::new(header.kind, header.path.unwrap_or_default());
                info.diff = extract_diff(&text_lines, all_added);
                action = Some(info);
            }
        }

        if let Some(info) = &mut action {
            if info.kind == ToolKind::Shell {
                for line in &lines {
                    if let Some(captures) = EXIT_CODE.captures(line) {
                        info.exit_code = captures[1].parse().ok();
                        break;
                    }
                }
            }
            // Probed before the action runs, so "Created" vs "Modified"
            // reflects the state the CLI saw.
            if !info.target.is_empty() && info.kind.is_file_change() {
                info.is_new_file = !self.probe.exists(Path::new(&info.target));
            }
        }

        let text = text_lines.join("\n").trim().to_owned();
        (text, action)
    }
}

impl Default for ClaudeParser {
    fn default() -> Self {
        Self::system()
    }
}

fn normalize_kind(raw: &str) -> ToolKind {
    match raw.to_ascii_lowercase().as_str() {
        "write" => ToolKind::WriteFile,
        "update" => ToolKind::Edit,
        "read" => ToolKind::ReadFile,
        "delete" => ToolKind::DeleteFile,
        _ => ToolKind::Shell,
    }
}

/// Resolve the target from a header's argument text. Shell headers that
/// redirect into a file (`cat > x`) are really file writes.
fn resolve_target(kind: ToolKind, rest: &str) -> (ToolKind, String) {
    if kind == ToolKind::Shell {
        if let Some(captures) = CAT_REDIRECT.captures(rest) {
            let kind = if rest.contains(">>") {
                ToolKind::Edit
            } else {
                ToolKind::WriteFile
            };
            return (kind, boxes::clean_path(&captures[1]));
        }
        return (ToolKind::Shell, boxes::clean_path(rest));
    }
    if rest
        .get(..11)
        .is_some_and(|head| head.eq_ignore_ascii_case("writing to "))
    {
        return (kind, boxes::clean_path(&rest[11..]));
    }
    if let Some(idx) = rest.find(':') {
        return (kind, boxes::clean_path(&rest[..idx]));
    }
    (kind, boxes::clean_path(rest))
}

/// Box content with the header inside it, e.g. `│ Write(x.py: note) │`.
fn parse_box(box_lines: &[String]) -> Option<ToolAction> {
    boxes::parse_box(box_lines, |stripped| {
        let captures = TOOL_HEADER.captures(stripped)?;
        let kind = normalize_kind(&captures[1]);
        let (path, description) = boxes::split_header_rest(captures[2].trim());
        Some((kind, path, description))
    })
}

/// Turn preview lines into a diff. Numbered lines (`39 + code`) are used
/// when present; otherwise the raw content is the body, all-added for new
/// files and context otherwise.
fn extract_diff(lines: &[String], all_added: bool) -> Vec<DiffLine> {
    let diff = boxes::numbered_diff(lines, all_added);
    if !diff.is_empty() {
        return diff;
    }

    let mut diff: Vec<DiffLine> = Vec::new();
    let mut start_idx = 0;
    if let Some(first) = lines.first() {
        let first = first.trim();
        let filename_like = (first.contains('.')
            && !first.contains('/')
            && first.chars().count() < 100)
            || first.starts_with('/');
        if filename_like {
            start_idx = 1;
        }
    }
    for line in &lines[start_idx..] {
        let stripped = line.trim();
        if RAW_BODY_NOISE.iter().any(|p| p.is_match(stripped)) {
            continue;
        }
        let content = line.trim_end();
        if all_added {
            diff.push(DiffLine::added(content));
        } else {
            diff.push(DiffLine::context(content));
        }
    }
    diff
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use duet_types::DiffSign;

    /// Probe reporting a fixed answer for every path.
    struct FixedProbe(bool);

    impl PathProbe for FixedProbe {
        fn exists(&self, _path: &Path) -> bool {
            self.0
        }
    }

    fn parser_with_existing_files() -> ClaudeParser {
        ClaudeParser::new(Arc::new(FixedProbe(true)))
    }

    fn parser_with_missing_files() -> ClaudeParser {
        ClaudeParser::new(Arc::new(FixedProbe(false)))
    }

    const WRITE_WITH_BOX: &str = "\
● Write(testing.py)
╭──────────────────────────────────────────╮
│ def hello():                             │
│     return \"world\"                       │
╰──────────────────────────────────────────╯";

    const EDIT_WITH_NUMBERED_DIFF: &str = "\
Edit file src/config.py
╭──────────────────────────────────────────╮
│ 36    import os                          │
│ 37 -  old_value = 1                      │
│ 38 +  new_value = 2                      │
╰──────────────────────────────────────────╯";

    const BASH_COMMAND_BLOCK: &str = "\
Bash command
echo hello
Prints a greeting";

    #[test]
    fn write_header_outside_box_is_parsed() {
        let (_, action) = parser_with_missing_files().parse(WRITE_WITH_BOX);
        let action = action.unwrap();
        assert_eq!(action.kind, ToolKind::WriteFile);
        assert_eq!(action.target, "testing.py");
        // Raw body: every line of a write is an addition.
        assert_eq!(action.diff.len(), 2);
        assert!(action.diff.iter().all(|l| l.sign == DiffSign::Added));
        assert_eq!(action.diff[0].text, "def hello():");
    }

    #[test]
    fn numbered_diff_lines_keep_their_signs() {
        let (_, action) = parser_with_existing_files().parse(EDIT_WITH_NUMBERED_DIFF);
        let action = action.unwrap();
        assert_eq!(action.kind, ToolKind::Edit);
        assert_eq!(action.target, "src/config.py");
        assert_eq!(
            action.diff,
            vec![
                DiffLine::context("import os"),
                DiffLine::removed("old_value = 1"),
                DiffLine::added("new_value = 2"),
            ]
        );
    }

    #[test]
    fn bash_command_label_takes_next_two_lines() {
        let (_, action) = parser_with_existing_files().parse(BASH_COMMAND_BLOCK);
        let action = action.unwrap();
        assert_eq!(action.kind, ToolKind::Shell);
        assert_eq!(action.target, "echo hello");
        assert_eq!(action.description, "Prints a greeting");
    }

    #[test]
    fn cat_redirect_becomes_file_write() {
        let pane = "● Bash(cat > notes.txt << 'EOF')\n╭───╮\n│ hi │\n╰───╯";
        let (_, action) = parser_with_missing_files().parse(pane);
        let action = action.unwrap();
        assert_eq!(action.kind, ToolKind::WriteFile);
        assert_eq!(action.target, "notes.txt");
    }

    #[test]
    fn cat_append_redirect_becomes_edit() {
        let pane = "● Bash(cat >> notes.txt << 'EOF')\n╭───╮\n│ hi │\n╰───╯";
        let (_, action) = parser_with_existing_files().parse(pane);
        assert_eq!(action.unwrap().kind, ToolKind::Edit);
    }

    #[test]
    fn shell_exit_code_is_attached() {
        let pane = "● Bash(cat missing.txt)\n╭───╮\n│ x │\n╰───╯\nError: Exit code 1";
        let (_, action) = parser_with_existing_files().parse(pane);
        let action = action.unwrap();
        assert_eq!(action.kind, ToolKind::Shell);
        assert_eq!(action.exit_code, Some(1));
    }

    #[test]
    fn create_file_header_reads_path_from_box() {
        let pane = "\
Create file
╭──────────────────────────────╮
│ notes.txt                    │
│ hello                        │
│ world                        │
╰──────────────────────────────╯";
        let (_, action) = parser_with_missing_files().parse(pane);
        let action = action.unwrap();
        assert_eq!(action.kind, ToolKind::WriteFile);
        assert_eq!(action.target, "notes.txt");
        assert!(action.is_new_file);
        assert_eq!(action.diff.len(), 2);
        assert_eq!(action.diff[0].text, "hello");
    }

    #[test]
    fn fenced_edit_diff_is_parsed() {
        let pane = "\
Edit file app.py
╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌
12    keep this
13 -  remove this
14 +  add this
╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌╌";
        let (_, action) = parser_with_existing_files().parse(pane);
        let action = action.unwrap();
        assert_eq!(action.kind, ToolKind::Edit);
        assert_eq!(action.target, "app.py");
        assert_eq!(
            action.diff,
            vec![
                DiffLine::context("keep this"),
                DiffLine::removed("remove this"),
                DiffLine::added("add this"),
            ]
        );
    }

    #[test]
    fn existing_file_is_not_marked_new() {
        let (_, action) = parser_with_existing_files().parse(WRITE_WITH_BOX);
        assert!(!action.unwrap().is_new_file);
    }

    #[test]
    fn tmux_frame_wrapper_is_stripped() {
        let pane = "\
│ ● Write(inner.txt)                        │
│ ╭───────────────╮                         │
│ │ content here  │                         │
│ ╰───────────────╯                         │";
        let (_, action) = parser_with_missing_files().parse(pane);
        let action = action.unwrap();
        assert_eq!(action.target, "inner.txt");
        assert_eq!(action.diff.len(), 1);
        // Indentation inside the box is part of the content.
        assert_eq!(action.diff[0].text, " content here");
    }

    #[test]
    fn prose_without_tools_has_no_action() {
        let (text, action) = parser_with_existing_files().parse("Just a plain reply.\nNothing else.");
        assert!(action.is_none());
        assert_eq!(text, "Just a plain reply.\nNothing else.");
    }

    #[test]
    fn path_scroll_arrow_is_cleaned() {
        let pane = "Edit file very/long/path.py ←\n╌╌╌╌\n1 + new line\n╌╌╌╌";
        let (_, action) = parser_with_existing_files().parse(pane);
        assert_eq!(action.unwrap().target, "very/long/path.py");
    }
}
