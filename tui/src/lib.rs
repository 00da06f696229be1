//! TUI rendering for Duet using ratatui.

mod input;
pub mod markdown;
mod modal;
mod theme;
mod transcript;

pub use input::{InputPump, handle_events};
pub use markdown::clear_render_cache;
pub use theme::{Glyphs, Palette, glyphs, palette, spinner_frame, styles};

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use duet_engine::{AgentState, App, Mode};
use duet_types::AiTarget;

use self::transcript::draw_transcript;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
    let options = app.ui_options();
    let palette = palette(options);
    let glyphs = glyphs(options);

    // The launch screen owns the whole frame until dismissed.
    if matches!(app.mode(), Mode::Startup) {
        modal::draw_startup(frame, app, &palette, &glyphs);
        return;
    }

    // Clear with background color
    let bg_block = Block::default().style(Style::default().bg(palette.bg_dark));
    frame.render_widget(bg_block, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Min(1),    // Transcript
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    draw_transcript(frame, app, chunks[0], &palette, &glyphs);
    draw_input(frame, app, chunks[1], &palette, &glyphs);
    draw_status_bar(frame, app, chunks[2], &palette, &glyphs);

    match app.mode() {
        Mode::TargetSelect { message } => {
            modal::draw_target_select(frame, message, &palette, &glyphs);
        }
        Mode::Approval(pending) => modal::draw_approval(frame, pending, &palette, &glyphs),
        Mode::Startup | Mode::Normal => {}
    }
}

pub(crate) fn draw_input(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let options = app.ui_options();
    let modal_open = !matches!(app.mode(), Mode::Normal);

    let prompt_char = if options.ascii_only { ">" } else { "❯" };
    let prefix = format!(" {prompt_char} ");
    let prefix_width = prefix.width() as u16;
    let content_width = area
        .width
        .saturating_sub(2)
        .saturating_sub(prefix_width)
        .max(1) as usize;

    let draft = app.draft();
    let cursor_display_pos: usize = draft
        .text()
        .graphemes(true)
        .take(draft.cursor())
        .map(UnicodeWidthStr::width)
        .sum();

    // Trim graphemes off the front once the draft outgrows the line so the
    // cursor stays visible.
    let (display_text, horizontal_scroll) = if cursor_display_pos >= content_width {
        let scroll_target = cursor_display_pos - content_width + 1;
        let mut byte_offset = 0;
        let mut skipped_width = 0;
        for (idx, grapheme) in draft.text().grapheme_indices(true) {
            if skipped_width >= scroll_target {
                byte_offset = idx;
                break;
            }
            skipped_width += grapheme.width();
        }
        (draft.text()[byte_offset..].to_string(), skipped_width)
    } else {
        (draft.text().to_string(), 0)
    };

    let (mode_text, mode_style, border_style) = match app.mode() {
        Mode::Normal => (
            " DUET ",
            styles::mode_normal(palette),
            Style::default().fg(palette.primary_dim),
        ),
        Mode::TargetSelect { .. } => (
            " ROUTE ",
            styles::mode_select(palette),
            Style::default().fg(palette.yellow),
        ),
        Mode::Approval(_) => (
            " APPROVE ",
            styles::mode_approval(palette),
            Style::default().fg(palette.peach),
        ),
        Mode::Startup => (
            " DUET ",
            styles::mode_startup(palette),
            Style::default().fg(palette.text_muted),
        ),
    };

    let hints: Vec<Span> = match app.mode() {
        Mode::Normal => vec![
            Span::styled("Enter", styles::key_highlight(palette)),
            Span::styled(" send  ", styles::key_hint(palette)),
            Span::styled("@cc/@g", styles::key_highlight(palette)),
            Span::styled(" route  ", styles::key_hint(palette)),
            Span::styled("Ctrl+C", styles::key_highlight(palette)),
            Span::styled(" quit ", styles::key_hint(palette)),
        ],
        Mode::TargetSelect { .. } => vec![
            Span::styled("c/g", styles::key_highlight(palette)),
            Span::styled(" choose  ", styles::key_hint(palette)),
            Span::styled("Esc", styles::key_highlight(palette)),
            Span::styled(" discard ", styles::key_hint(palette)),
        ],
        Mode::Approval(_) => vec![
            Span::styled("1/y", styles::key_highlight(palette)),
            Span::styled(" approve  ", styles::key_hint(palette)),
            Span::styled("3/n", styles::key_highlight(palette)),
            Span::styled(" reject ", styles::key_hint(palette)),
        ],
        Mode::Startup => Vec::new(),
    };

    let input = Paragraph::new(Line::from(vec![
        Span::styled(prefix, Style::default().fg(palette.primary)),
        Span::styled(display_text, Style::default().fg(palette.text_primary)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title_top(Line::from(vec![Span::styled(mode_text, mode_style)]))
            .title_top(Line::from(hints).alignment(Alignment::Right)),
    );

    frame.render_widget(input, area);

    if !modal_open {
        let cursor_x = area
            .x
            .saturating_add(1 + prefix_width)
            .saturating_add(cursor_display_pos as u16)
            .saturating_sub(horizontal_scroll as u16);
        let cursor_y = area.y.saturating_add(1);
        frame.set_cursor_position((cursor_x, cursor_y));

        if app.completer().is_active() {
            draw_completer(frame, app, area, palette, glyphs);
        }
    }
}

/// Routing-tag suggestions, popped up above the input box.
fn draw_completer(
    frame: &mut Frame,
    app: &App,
    input_area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let completer = app.completer();
    let suggestions = completer.suggestions();

    let rows = suggestions.len() as u16;
    let width = (suggestions
        .iter()
        .map(|tag| tag.width())
        .max()
        .unwrap_or(8) as u16)
        .saturating_add(4)
        .min(input_area.width);
    let rect = Rect {
        x: input_area.x.saturating_add(1),
        y: input_area.y.saturating_sub(rows),
        width,
        height: rows,
    };

    let mut lines = Vec::new();
    for (i, tag) in suggestions.iter().enumerate() {
        let selected = i == completer.selected();
        let marker = if selected { glyphs.selected } else { " " };
        let style = if selected {
            Style::default()
                .fg(palette.text_primary)
                .bg(palette.bg_highlight)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text_secondary)
        };
        lines.push(Line::from(Span::styled(format!(" {marker} {tag}"), style)));
    }

    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines).style(Style::default().bg(palette.bg_popup)),
        rect,
    );
}

pub(crate) fn draw_status_bar(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let (status_text, status_style) = if let Some(target) = app.busy() {
        let spinner = spinner_frame(app.tick_count(), app.ui_options());
        (
            format!(
                "{spinner} {} responding... (Esc interrupts)",
                target.display_name()
            ),
            Style::default().fg(palette.agent(target)),
        )
    } else if let Some(msg) = app.status() {
        (msg.to_string(), Style::default().fg(palette.text_secondary))
    } else {
        (
            "Type a message · @cc or @g routes it · /help for commands".to_string(),
            Style::default().fg(palette.text_muted),
        )
    };

    // Right side: one dot per agent session.
    let mut right: Vec<Span> = Vec::new();
    for target in AiTarget::all() {
        let (dot, color) = match app.agent_state(target) {
            AgentState::Ready => (glyphs.status_ready, palette.success),
            AgentState::Starting => (glyphs.status_ready, palette.warning),
            AgentState::Offline => (glyphs.status_off, palette.text_muted),
            AgentState::Failed(_) => (glyphs.status_off, palette.error),
        };
        right.push(Span::styled(format!("{dot} "), Style::default().fg(color)));
        right.push(Span::styled(
            format!("{}  ", target.display_name()),
            Style::default().fg(palette.text_muted),
        ));
    }
    let right_width: usize = right.iter().map(|span| span.content.width()).sum();

    let left_max = (area.width as usize).saturating_sub(right_width + 2);
    let status_text = truncate_with_ellipsis(&status_text, left_max.max(8));
    let left_width = status_text.width() + 1;

    let filler = (area.width as usize).saturating_sub(left_width + right_width);

    let mut spans = vec![Span::raw(" "), Span::styled(status_text, status_style)];
    if filler > 0 {
        spans.push(Span::raw(" ".repeat(filler)));
    }
    spans.extend(right);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

pub(crate) fn truncate_with_ellipsis(raw: &str, max: usize) -> String {
    let max = max.max(3);
    let trimmed = raw.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(max - 3).collect();
        format!("{head}...")
    }
}
