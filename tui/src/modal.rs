//! Centered overlays: tool approval, recipient choice, and the launch screen.

use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph, Wrap},
};

use duet_engine::{App, PendingApproval};
use duet_types::{AiTarget, ToolAction, ToolKind};
use duet_utils::{clip_preview, unified_from_markers};

use crate::theme::{Glyphs, Palette, styles};
use crate::truncate_with_ellipsis;

/// Raw confirmation lines shown when the prompt could not be parsed.
const CONTEXT_LINES_SHOWN: usize = 16;
/// Diff rows shown before the modal elides the rest.
const DIFF_LINES_SHOWN: usize = 12;

pub(crate) fn draw_approval(
    frame: &mut Frame,
    pending: &PendingApproval,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let max_content_width = frame.area().width.saturating_sub(8).clamp(20, 80) as usize;

    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            " Tool approval required ",
            Style::default()
                .fg(palette.text_primary)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                format!(" {} ", glyphs.agent(pending.target)),
                Style::default()
                    .fg(palette.agent(pending.target))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("{} wants to run:", pending.target.display_name()),
                Style::default().fg(palette.text_secondary),
            ),
        ]),
        Line::from(""),
    ];

    match &pending.action {
        Some(action) => {
            let header = if action.kind == ToolKind::Shell {
                format!(" $ {}", action.command())
            } else {
                format!(" {} {}", action.kind, action.target)
            };
            lines.push(Line::from(Span::styled(
                truncate_with_ellipsis(&header, max_content_width),
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            )));
            if !action.description.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!(" {}", truncate_with_ellipsis(&action.description, max_content_width)),
                    Style::default().fg(palette.text_muted),
                )));
            }
            lines.extend(approval_diff_lines(action, palette, max_content_width));
        }
        None => {
            for text_line in pending.context.lines().take(CONTEXT_LINES_SHOWN) {
                lines.push(Line::from(Span::styled(
                    format!(" {}", truncate_with_ellipsis(text_line, max_content_width)),
                    Style::default().fg(palette.text_muted),
                )));
            }
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  1 Approve",
        Style::default()
            .fg(palette.success)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        "  2 Always allow (unavailable)",
        Style::default().fg(palette.text_disabled),
    )));
    lines.push(Line::from(Span::styled(
        "  3 Reject",
        Style::default()
            .fg(palette.error)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("1/y/Enter", styles::key_highlight(palette)),
        Span::styled(" approve  ", styles::key_hint(palette)),
        Span::styled("3/n/Esc", styles::key_highlight(palette)),
        Span::styled(" reject", styles::key_hint(palette)),
    ]));

    render_modal(frame, lines, palette);
}

/// Unified-diff view of a file change.
///
/// The confirmation pane prints flat marker lines; re-diffing them restores
/// hunk headers and context so a long change stays reviewable in the modal.
/// The transcript's tool card keeps the raw marker view.
fn approval_diff_lines(
    action: &ToolAction,
    palette: &Palette,
    max_width: usize,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if !action.kind.is_file_change() {
        return lines;
    }
    let rendered = unified_from_markers(&action.diff);
    for row in rendered.iter().take(DIFF_LINES_SHOWN) {
        let style = if row.starts_with("@@") {
            Style::default().fg(palette.accent)
        } else if row.starts_with('+') {
            Style::default().fg(palette.success)
        } else if row.starts_with('-') {
            Style::default().fg(palette.error)
        } else {
            Style::default().fg(palette.text_muted)
        };
        lines.push(Line::from(Span::styled(
            format!(" {}", truncate_with_ellipsis(row, max_width)),
            style,
        )));
    }
    if rendered.len() > DIFF_LINES_SHOWN {
        lines.push(Line::from(Span::styled(
            format!(" ... ({} more lines)", rendered.len() - DIFF_LINES_SHOWN),
            Style::default().fg(palette.text_muted),
        )));
    }
    lines
}

pub(crate) fn draw_target_select(
    frame: &mut Frame,
    message: &str,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            " Choose a recipient ",
            Style::default()
                .fg(palette.text_primary)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" \"{}\"", clip_preview(message)),
            Style::default().fg(palette.text_muted),
        )),
        Line::from(""),
    ];

    for target in AiTarget::all() {
        lines.push(Line::from(vec![
            Span::styled(format!("  {}  ", target.hotkey()), styles::key_highlight(palette)),
            Span::styled(
                format!("{} ", glyphs.agent(target)),
                Style::default()
                    .fg(palette.agent(target))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                target.display_name(),
                Style::default().fg(palette.text_primary),
            ),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("c/g", styles::key_highlight(palette)),
        Span::styled(" choose  ", styles::key_hint(palette)),
        Span::styled("Esc", styles::key_highlight(palette)),
        Span::styled(" discard", styles::key_hint(palette)),
    ]));

    render_modal(frame, lines, palette);
}

const BANNER: [&str; 5] = [
    r" ____  _   _ _____ _____ ",
    r"|  _ \| | | | ____|_   _|",
    r"| | | | | | |  _|   | |  ",
    r"| |_| | |_| | |___  | |  ",
    r"|____/ \___/|_____| |_|  ",
];

/// Full-screen launch view shown while the tmux sessions spin up.
pub(crate) fn draw_startup(frame: &mut Frame, app: &App, palette: &Palette, glyphs: &Glyphs) {
    let gradient = [
        palette.primary,
        palette.blue,
        palette.accent,
        palette.green,
        palette.yellow,
    ];

    let mut lines: Vec<Line> = Vec::new();
    for (row, art) in BANNER.iter().enumerate() {
        lines.push(Line::from(Span::styled(
            *art,
            Style::default()
                .fg(gradient[row % gradient.len()])
                .add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Two agents, one conversation.",
        Style::default().fg(palette.text_muted),
    )));
    lines.push(Line::from(""));

    for target in AiTarget::all() {
        lines.push(session_status_line(app, target, palette, glyphs));
    }

    lines.push(Line::from(""));
    let enter = if app.ui_options().ascii_only {
        "Enter"
    } else {
        "Enter ↵"
    };
    lines.push(Line::from(vec![
        Span::styled("Press ", styles::key_hint(palette)),
        Span::styled(enter, styles::key_highlight(palette)),
        Span::styled(" to begin", styles::key_hint(palette)),
    ]));

    let area = frame.area();
    let height = (lines.len() as u16).min(area.height);
    let rect = Rect {
        x: area.x,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: area.width,
        height,
    };

    let splash = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(palette.bg_dark));
    frame.render_widget(splash, rect);
}

fn session_status_line(
    app: &App,
    target: AiTarget,
    palette: &Palette,
    glyphs: &Glyphs,
) -> Line<'static> {
    use duet_engine::AgentState;

    let (text, style) = match app.agent_state(target) {
        AgentState::Offline => (
            "waiting...".to_string(),
            Style::default().fg(palette.text_muted),
        ),
        AgentState::Starting => (
            "starting...".to_string(),
            Style::default().fg(palette.warning),
        ),
        AgentState::Ready => ("ready".to_string(), Style::default().fg(palette.success)),
        AgentState::Failed(reason) => (
            format!("failed: {}", truncate_with_ellipsis(reason, 40)),
            Style::default().fg(palette.error),
        ),
    };

    Line::from(vec![
        Span::styled(
            format!("{} ", glyphs.agent(target)),
            Style::default()
                .fg(palette.agent(target))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{}  ", target.display_name()),
            Style::default().fg(palette.text_primary),
        ),
        Span::styled(text, style),
    ])
}

/// Clears a centered rect sized to the content and draws it with the shared
/// popup chrome.
fn render_modal(frame: &mut Frame, lines: Vec<Line<'_>>, palette: &Palette) {
    let content_width = lines
        .iter()
        .map(ratatui::prelude::Line::width)
        .max()
        .unwrap_or(10) as u16;
    let content_width = content_width.min(frame.area().width.saturating_sub(4));

    let area = frame.area();
    let max_height = area.height.saturating_sub(2);
    let height = (lines.len() as u16).saturating_add(4).min(max_height);
    let width = content_width.saturating_add(4);
    let rect = Rect {
        x: area.x + (area.width.saturating_sub(width) / 2),
        y: area.y + (area.height.saturating_sub(height) / 2),
        width,
        height,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.primary))
        .style(Style::default().bg(palette.bg_panel))
        .padding(Padding::uniform(1));

    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        rect,
    );
}

#[cfg(test)]
mod tests {
    use duet_types::DiffLine;

    use super::*;

    fn flatten(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn approval_diff_renders_unified_hunks() {
        let mut action = ToolAction::new(ToolKind::Edit, "src/lib.rs");
        action.diff.push(DiffLine::context("fn main() {"));
        action.diff.push(DiffLine::removed("    old();"));
        action.diff.push(DiffLine::added("    new();"));

        let palette = Palette::standard();
        let text = flatten(&approval_diff_lines(&action, &palette, 80));
        assert!(text.contains("@@"), "got: {text}");
        assert!(text.contains("-    old();"));
        assert!(text.contains("+    new();"));
    }

    #[test]
    fn approval_diff_ignores_shell_actions() {
        let action = ToolAction::new(ToolKind::Shell, "rm -rf target");
        let palette = Palette::standard();
        assert!(approval_diff_lines(&action, &palette, 80).is_empty());
    }

    #[test]
    fn long_approval_diffs_are_elided() {
        let mut action = ToolAction::new(ToolKind::WriteFile, "notes.txt");
        for index in 0..30 {
            action.diff.push(DiffLine::added(format!("row {index}")));
        }

        let palette = Palette::standard();
        let text = flatten(&approval_diff_lines(&action, &palette, 80));
        assert!(text.contains("more lines"), "got: {text}");
        assert!(!text.contains("row 29"));
    }
}
