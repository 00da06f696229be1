//! Structured tool-call parsing for Gemini panes.
//!
//! The CLI previews every tool in a box-drawn block, usually with the
//! header line above it (`? WriteFile Writing to x.py`) and sometimes
//! inside it (`│ ✓ Edit x.py: old => new │`). This parser turns either
//! layout into a [`ToolAction`] for the approval pane.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use duet_types::{ToolAction, ToolKind};
use regex::Regex;

use crate::boxes;
use crate::probe::{PathProbe, SystemProbe};

// Status glyphs before the tool name: ? pending, ✓ completed, ✗ failed,
// ⊷ queued.
static TOOL_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*[✓✗?⊷]?\s*(WriteFile|Edit|ReadFile|Shell|DeleteFile)\s+(.+?)\s*$")
        .unwrap()
});

static EXIT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Command exited with code:\s*(\d+)").unwrap());

pub struct GeminiParser {
    probe: Arc<dyn PathProbe>,
}

impl GeminiParser {
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
    #[must_use]
    pub fn parse(&self, raw: &str) -> (String, Option<ToolAction>) {
        let lines = boxes::preprocess(raw);
        let mut text_lines: Vec<String> = Vec::new();
        let mut action: Option<ToolAction> = None;
        let mut pending: Option<(ToolKind, String)> = None;

        let mut i = 0;
        while i < lines.len() {
            let line = &lines[i];

            if let Some(captures) = TOOL_HEADER.captures(line) {
                if !boxes::BOX_LINE.is_match(line) {
                    let kind = normalize_kind(&captures[1]);
                    pending = Some((kind, header_path(&captures[2])));
                    i += 1;
                    continue;
                }
            }

            if boxes::BOX_START.is_match(line) {
                let (box_lines, end_idx) = boxes::extract_box(&lines, i);
                if !box_lines.is_empty() {
                    if let Some(parsed) = parse_box(&box_lines) {
                        action = Some(parsed);
                    } else if let Some((kind, path)) = pending.take() {
                        let all_added = kind == ToolKind::WriteFile;
                        let mut info = ToolAction::new(kind, path);
                        info.diff = boxes::numbered_diff(&box_lines, all_added);
                        action = Some(info);
                    }
                }
                pending = None;
                i = end_idx + 1;
                continue;
            }

            text_lines.push(line.clone());
            i += 1;
        }

        // Header with no box at all: any numbered lines that followed it
        // are the diff.
        if action.is_none() {
            if let Some((kind, path)) = pending.take() {
                let all_added = kind == ToolKind::WriteFile;
                let mut info = ToolAction::new(kind, path);
                info.diff = boxes::numbered_diff(&text_lines, all_added);
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

impl Default for GeminiParser {
    fn default() -> Self {
        Self::system()
    }
}

fn normalize_kind(raw: &str) -> ToolKind {
    match raw.to_ascii_lowercase().as_str() {
        "writefile" => ToolKind::WriteFile,
        "edit" | "editfile" => ToolKind::Edit,
        "readfile" => ToolKind::ReadFile,
        "deletefile" => ToolKind::DeleteFile,
        _ => ToolKind::Shell,
    }
}

/// Path out of a header's argument text, e.g. `Writing to x.py` or
/// `x.py: old => new`.
fn header_path(rest: &str) -> String {
    let rest = rest.trim();
    if rest
        .get(..11)
        .is_some_and(|head| head.eq_ignore_ascii_case("writing to "))
    {
        return boxes::clean_path(&rest[11..]);
    }
    if let Some(idx) = rest.find(':') {
        return boxes::clean_path(&rest[..idx]);
    }
    boxes::clean_path(rest)
}

/// Box content with the header inside it, e.g. `│ ✓ Edit x.py: note │`.
fn parse_box(box_lines: &[String]) -> Option<ToolAction> {
    boxes::parse_box(box_lines, |stripped| {
        let captures = TOOL_HEADER.captures(stripped)?;
        let kind = normalize_kind(&captures[1]);
        let (path, description) = boxes::split_header_rest(captures[2].trim());
        Some((kind, path, description))
    })
}

// ============================================================================
// Tests
// ============================================================================
