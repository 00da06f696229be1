//! Transcript rendering.
//!
//! Builds the scrolling line stack from the engine's display items plus the
//! live turn of whichever agent is currently streaming. Pane text is already
//! scrubbed of escape sequences before it reaches the engine, so rendering
//! here is purely about layout and color.

use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Padding, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};

use duet_engine::{App, DisplayItem};
use duet_types::{AiTarget, DiffSign, ToolAction, ToolKind};

use crate::markdown::render_markdown;
use crate::theme::{Glyphs, Palette, spinner_frame, styles};

/// Diff lines shown on a tool card before the rest is elided.
const DIFF_LINES_SHOWN: usize = 8;
/// Output lines shown for shell results; the tail is what matters.
const OUTPUT_LINES_SHOWN: usize = 12;

pub(crate) fn draw_transcript(
    frame: &mut Frame,
    app: &mut App,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let block = Block::default().padding(Padding::horizontal(1));

    if app.display().is_empty() && app.live().is_none() && app.busy().is_none() {
        app.update_scroll_max(0);
        let ready = Paragraph::new("Ready")
            .style(Style::default().fg(palette.text_muted))
            .alignment(Alignment::Center)
            .block(block);
        let ready_area = Rect {
            x: area.x,
            y: area.y + area.height / 2,
            width: area.width,
            height: 1,
        };
        frame.render_widget(ready, ready_area);
        return;
    }

    let inner = block.inner(area);
    let width = inner.width.max(1);

    let mut lines = build_lines(app, palette, glyphs);
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }

    let total_rows = wrapped_line_count(&lines, width);
    let visible = inner.height as usize;
    let max_scroll = total_rows.saturating_sub(visible).min(u16::MAX as usize) as u16;
    app.update_scroll_max(max_scroll);
    let offset = app.scroll_offset_from_top();

    let transcript = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    frame.render_widget(transcript, area);

    if max_scroll > 0 {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some(glyphs.arrow_up))
            .end_symbol(Some(glyphs.arrow_down))
            .track_symbol(Some(glyphs.track))
            .thumb_symbol(glyphs.thumb)
            .style(Style::default().fg(palette.text_muted));

        let mut state = ScrollbarState::new(max_scroll as usize).position(offset as usize);
        frame.render_stateful_widget(scrollbar, area, &mut state);
    }
}

fn build_lines(app: &App, palette: &Palette, glyphs: &Glyphs) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for item in app.display() {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        match item {
            DisplayItem::User(text) => push_user(&mut lines, text, palette, glyphs),
            DisplayItem::Agent { target, text } => {
                push_agent(&mut lines, *target, text, palette, glyphs);
            }
            DisplayItem::Tool { target, action } => {
                push_tool_card(&mut lines, *target, action, palette, glyphs);
            }
            DisplayItem::Shell {
                command,
                output,
                exit_code,
            } => push_shell(&mut lines, command, output, *exit_code, palette, glyphs),
            DisplayItem::Notice(text) => push_notice(&mut lines, text, palette, glyphs),
            DisplayItem::Error(text) => push_error(&mut lines, text, palette, glyphs),
        }
    }

    push_live(&mut lines, app, palette, glyphs);

    lines
}

fn push_user(lines: &mut Vec<Line<'static>>, text: &str, palette: &Palette, glyphs: &Glyphs) {
    let marker = Span::styled(format!(" {} ", glyphs.user), styles::user_name(palette));
    let body = Style::default().fg(palette.text_primary);
    for (index, part) in text.lines().enumerate() {
        let gutter = if index == 0 {
            marker.clone()
        } else {
            Span::raw("   ")
        };
        lines.push(Line::from(vec![
            gutter,
            Span::styled(part.to_string(), body),
        ]));
    }
    if text.is_empty() {
        lines.push(Line::from(marker));
    }
}

fn push_agent(
    lines: &mut Vec<Line<'static>>,
    target: AiTarget,
    text: &str,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let marker = Span::styled(
        format!(" {} ", glyphs.agent(target)),
        Style::default()
            .fg(palette.agent(target))
            .add_modifier(Modifier::BOLD),
    );
    let body = Style::default().fg(palette.text_secondary);
    let rendered = render_markdown(text, body, palette);
    lines.extend(with_gutter(rendered, marker));
}

fn push_tool_card(
    lines: &mut Vec<Line<'static>>,
    target: AiTarget,
    action: &ToolAction,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let marker = Span::styled(
        format!(" {} ", glyphs.tool),
        Style::default()
            .fg(palette.agent(target))
            .add_modifier(Modifier::BOLD),
    );
    let header = if action.kind == ToolKind::Shell {
        format!("$ {}", action.command())
    } else {
        format!("{} {}", action.kind, action.target)
    };
    lines.push(Line::from(vec![
        marker,
        Span::styled(
            header,
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
    ]));

    let (status_glyph, status_style) = if action.is_error() {
        (glyphs.tool_err, Style::default().fg(palette.error))
    } else {
        (glyphs.tool_ok, Style::default().fg(palette.success))
    };
    lines.push(Line::from(vec![
        Span::styled(
            format!(" {} ", glyphs.connector),
            Style::default().fg(palette.text_muted),
        ),
        Span::styled(format!("{status_glyph} {}", action.headline()), status_style),
    ]));

    if !action.description.is_empty() {
        lines.push(Line::from(vec![
            Span::raw("   "),
            Span::styled(
                action.description.clone(),
                Style::default().fg(palette.text_muted),
            ),
        ]));
    }

    lines.extend(diff_body_lines(action, palette));

    if let Some(output) = action.shell_output.as_deref() {
        push_output_tail(lines, output, palette);
    }
}

/// Capped marker-line diff body for a file-change tool card.
fn diff_body_lines(action: &ToolAction, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if !action.kind.is_file_change() {
        return lines;
    }
    for diff_line in action.diff.iter().take(DIFF_LINES_SHOWN) {
        lines.push(Line::from(vec![
            Span::raw("   "),
            Span::styled(
                format!("{} {}", diff_line.sign.marker(), diff_line.text),
                diff_style(diff_line.sign, palette),
            ),
        ]));
    }
    if action.diff.len() > DIFF_LINES_SHOWN {
        lines.push(Line::from(vec![
            Span::raw("   "),
            Span::styled(
                format!("... ({} more lines)", action.diff.len() - DIFF_LINES_SHOWN),
                Style::default().fg(palette.text_muted),
            ),
        ]));
    }
    lines
}

fn push_shell(
    lines: &mut Vec<Line<'static>>,
    command: &str,
    output: &str,
    exit_code: Option<i32>,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    lines.push(Line::from(vec![
        Span::styled(
            " $ ",
            Style::default()
                .fg(palette.yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            command.to_string(),
            Style::default().fg(palette.text_primary),
        ),
    ]));

    let (status, style) = match exit_code {
        Some(0) => ("exit 0".to_string(), Style::default().fg(palette.success)),
        Some(code) => (
            format!("exit {code}"),
            Style::default().fg(palette.error),
        ),
        None => ("exit ?".to_string(), Style::default().fg(palette.text_muted)),
    };
    lines.push(Line::from(vec![
        Span::styled(
            format!(" {} ", glyphs.connector),
            Style::default().fg(palette.text_muted),
        ),
        Span::styled(status, style),
    ]));

    push_output_tail(lines, output, palette);
}

fn push_output_tail(lines: &mut Vec<Line<'static>>, output: &str, palette: &Palette) {
    let muted = Style::default().fg(palette.text_muted);
    let (skipped, shown) = tail_window(output, OUTPUT_LINES_SHOWN);
    if skipped > 0 {
        lines.push(Line::from(vec![
            Span::raw("   "),
            Span::styled(format!("... ({skipped} earlier lines)"), muted),
        ]));
    }
    for part in shown {
        lines.push(Line::from(vec![
            Span::raw("   "),
            Span::styled(part.to_string(), muted),
        ]));
    }
}

fn push_notice(lines: &mut Vec<Line<'static>>, text: &str, palette: &Palette, glyphs: &Glyphs) {
    let muted = Style::default().fg(palette.text_muted);
    lines.push(Line::from(vec![
        Span::styled(format!(" {} ", glyphs.bullet), muted),
        Span::styled(text.to_string(), muted),
    ]));
}

fn push_error(lines: &mut Vec<Line<'static>>, text: &str, palette: &Palette, glyphs: &Glyphs) {
    lines.push(Line::from(vec![
        Span::styled(
            format!(" {} ", glyphs.tool_err),
            Style::default()
                .fg(palette.error)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(text.to_string(), Style::default().fg(palette.error)),
    ]));
}

/// Streaming text or a thinking row for the busy agent.
fn push_live(lines: &mut Vec<Line<'static>>, app: &App, palette: &Palette, glyphs: &Glyphs) {
    if let Some(live) = app.live() {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        let marker = Span::styled(
            format!(" {} ", glyphs.agent(live.target)),
            Style::default()
                .fg(palette.agent(live.target))
                .add_modifier(Modifier::BOLD),
        );
        let body = Style::default().fg(palette.text_secondary);
        let mut rendered = with_gutter(render_markdown(&live.text, body, palette), marker);
        if let Some(last) = rendered.last_mut() {
            last.spans.push(Span::styled(
                format!(" {}", spinner_frame(app.tick_count(), app.ui_options())),
                Style::default().fg(palette.text_muted),
            ));
        }
        lines.extend(rendered);
    } else if let Some(target) = app.busy() {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {} ", spinner_frame(app.tick_count(), app.ui_options())),
                Style::default().fg(palette.agent(target)),
            ),
            Span::styled(
                format!("{} is thinking...", target.display_name()),
                Style::default().fg(palette.text_muted),
            ),
        ]));
    }
}

/// Prepends the marker to the first line and a matching gutter to the rest.
fn with_gutter(mut rendered: Vec<Line<'static>>, marker: Span<'static>) -> Vec<Line<'static>> {
    if rendered.is_empty() {
        return vec![Line::from(marker)];
    }
    for (index, line) in rendered.iter_mut().enumerate() {
        if index == 0 {
            line.spans.insert(0, marker.clone());
        } else {
            line.spans.insert(0, Span::raw("   "));
        }
    }
    rendered
}

fn diff_style(sign: DiffSign, palette: &Palette) -> Style {
    match sign {
        DiffSign::Added => Style::default().fg(palette.success),
        DiffSign::Removed => Style::default().fg(palette.error),
        DiffSign::Context => Style::default().fg(palette.text_muted),
    }
}

/// Last `cap` lines of `text` plus how many were skipped.
fn tail_window(text: &str, cap: usize) -> (usize, Vec<&str>) {
    let all: Vec<&str> = text.lines().collect();
    if all.len() <= cap {
        (0, all)
    } else {
        let skipped = all.len() - cap;
        (skipped, all[skipped..].to_vec())
    }
}

/// Rows the paragraph will occupy after wrapping at `width`.
fn wrapped_line_count(lines: &[Line<'_>], width: u16) -> usize {
    if width == 0 {
        return lines.len();
    }
    let width = width as usize;
    lines
        .iter()
        .map(|line| {
            let w = line.width();
            if w == 0 { 1 } else { w.div_ceil(width) }
        })
        .sum()
}
