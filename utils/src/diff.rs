//! Unified rendering of tool diffs.
//!
//! CLI panes print file changes as flat marker lines (`+`, `-`, context).
//! For display the tool card wants a proper unified diff with hunk headers
//! and two lines of context, so the marker lines are re-split into their
//! before/after sides and re-diffed.

use duet_types::{DiffLine, DiffSign};
use similar::TextDiff;

/// Rebuild a unified diff from CLI marker lines.
///
/// Removed and context lines form the before side, added and context
/// lines the after side. Returns the unified hunks (headers included,
/// no file header) with two lines of context, one rendered line per
/// element. Identical sides produce an empty result.
#[must_use]
pub fn unified_from_markers(diff: &[DiffLine]) -> Vec<String> {
    let (before, after) = split_sides(diff);
    if before == after {
        return Vec::new();
    }

    let text_diff = TextDiff::from_lines(&before, &after);
    let mut unified = text_diff.unified_diff();
    unified.context_radius(2);
    unified
        .to_string()
        .lines()
        .map(str::to_owned)
        .collect()
}

fn split_sides(diff: &[DiffLine]) -> (String, String) {
    let mut before = String::new();
    let mut after = String::new();
    for line in diff {
        match line.sign {
            DiffSign::Removed => {
                before.push_str(&line.text);
                before.push('\n');
            }
            DiffSign::Added => {
                after.push_str(&line.text);
                after.push('\n');
            }
            DiffSign::Context => {
                before.push_str(&line.text);
                before.push('\n');
                after.push_str(&line.text);
                after.push('\n');
            }
        }
    }
    (before, after)
}

// ============================================================================
// Tests
// ============================================================================
