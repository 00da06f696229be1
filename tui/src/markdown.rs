//! Markdown to ratatui rendering for agent replies.
//!
//! Includes a small render cache so unchanged replies are not re-parsed on
//! every frame. Tables are deliberately not interpreted; the raw pipe rows
//! read fine in a transcript and stay copy-pasteable.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::mem;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use crate::theme::Palette;

/// Maximum number of cached renders before eviction.
const CACHE_MAX_ENTRIES: usize = 128;

/// Cache key combining content hash and style.
#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    content_hash: u64,
    style_hash: u64,
}

impl CacheKey {
    fn new(content: &str, style: Style, code_fg: Color) -> Self {
        use std::collections::hash_map::DefaultHasher;

        let mut content_hasher = DefaultHasher::new();
        content.hash(&mut content_hasher);

        // Style does not impl Hash; hash its components. The inline-code
        // color rides along so palette changes do not serve stale spans.
        let mut style_hasher = DefaultHasher::new();
        style.fg.hash(&mut style_hasher);
        style.bg.hash(&mut style_hasher);
        style.add_modifier.hash(&mut style_hasher);
        style.sub_modifier.hash(&mut style_hasher);
        code_fg.hash(&mut style_hasher);

        Self {
            content_hash: content_hasher.finish(),
            style_hash: style_hasher.finish(),
        }
    }
}

thread_local! {
    static RENDER_CACHE: RefCell<HashMap<CacheKey, Vec<Line<'static>>>> =
        RefCell::new(HashMap::new());
}

/// Clear the render cache.
pub fn clear_render_cache() {
    RENDER_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Render markdown content to ratatui lines.
///
/// Lines come back without leading indentation; the transcript prepends its
/// own marker and gutter spans.
pub fn render_markdown(content: &str, base_style: Style, palette: &Palette) -> Vec<Line<'static>> {
    let key = CacheKey::new(content, base_style, palette.peach);

    let cached = RENDER_CACHE.with(|cache| cache.borrow().get(&key).cloned());
    if let Some(lines) = cached {
        return lines;
    }

    let renderer = MarkdownRenderer::new(base_style, palette);
    let lines = renderer.render(content);

    RENDER_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        // Simple eviction: clear half the cache when full.
        if cache.len() >= CACHE_MAX_ENTRIES {
            let stale: Vec<_> = cache.keys().take(CACHE_MAX_ENTRIES / 2).cloned().collect();
            for key in stale {
                cache.remove(&key);
            }
        }

        cache.insert(key, lines.clone());
    });

    lines
}

struct MarkdownRenderer {
    base_style: Style,
    code_fg: Color,
    fence_fg: Color,
    lines: Vec<Line<'static>>,
    current_spans: Vec<Span<'static>>,

    // Style stack as counters, not booleans, so nested formatting unwinds
    // correctly: `# Heading with **bold**` keeps the heading bold after the
    // inner `**` closes.
    bold: usize,
    italic: usize,
    strike: usize,

    in_code_block: bool,
    code_lines: Vec<String>,

    list_stack: Vec<Option<u64>>,
}

impl MarkdownRenderer {
    fn new(base_style: Style, palette: &Palette) -> Self {
        Self {
            base_style,
            code_fg: palette.peach,
            fence_fg: palette.text_muted,
            lines: Vec::new(),
            current_spans: Vec::new(),
            bold: 0,
            italic: 0,
            strike: 0,
            in_code_block: false,
            code_lines: Vec::new(),
            list_stack: Vec::new(),
        }
    }

    fn render(mut self, content: &str) -> Vec<Line<'static>> {
        let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        for event in Parser::new_ext(content, options) {
            self.handle_event(event);
        }
        self.flush_line();
        self.lines
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(&tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.handle_text(&text),
            Event::Code(code) => self.handle_inline_code(&code),
            Event::SoftBreak => {
                if !self.in_code_block {
                    self.current_spans.push(Span::raw(" "));
                }
            }
            Event::HardBreak => self.flush_line(),
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.current_spans
                    .push(Span::styled(marker, self.base_style));
            }
            // Agents emit XML-ish tags now and then; show them rather than
            // silently dropping the content.
            Event::Html(html) | Event::InlineHtml(html) => self.handle_text(&html),
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: &Tag) {
        match tag {
            Tag::Heading { .. } | Tag::Strong => self.bold += 1,
            Tag::Emphasis => self.italic += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::CodeBlock(_) => {
                self.flush_line();
                self.in_code_block = true;
                self.code_lines.clear();
            }
            Tag::List(start) => {
                self.flush_line();
                self.list_stack.push(*start);
            }
            Tag::Item => {
                let indent = "  ".repeat(self.list_stack.len().saturating_sub(1));
                let marker = match self.list_stack.last_mut() {
                    Some(Some(index)) => {
                        let marker = format!("{indent}{index}. ");
                        *index += 1;
                        marker
                    }
                    _ => format!("{indent}- "),
                };
                self.current_spans
                    .push(Span::styled(marker, self.base_style));
            }
            Tag::Paragraph => {
                if !self.lines.is_empty() && self.list_stack.is_empty() {
                    self.lines.push(Line::from(""));
                }
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.italic += 1;
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.bold = self.bold.saturating_sub(1);
                self.flush_line();
                self.lines.push(Line::from(""));
            }
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.flush_code_block();
            }
            TagEnd::List(_) => {
                self.list_stack.pop();
            }
            TagEnd::Item | TagEnd::Paragraph => self.flush_line(),
            TagEnd::BlockQuote(_) => {
                self.flush_line();
                self.italic = self.italic.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &str) {
        if self.in_code_block {
            for line in text.lines() {
                self.code_lines.push(line.to_string());
            }
            return;
        }
        let style = self.current_style();
        self.current_spans
            .push(Span::styled(text.to_string(), style));
    }

    fn handle_inline_code(&mut self, code: &str) {
        let style = Style::default()
            .fg(self.code_fg)
            .add_modifier(Modifier::BOLD);
        self.current_spans
            .push(Span::styled(code.to_string(), style));
    }

    fn current_style(&self) -> Style {
        let mut style = self.base_style;
        if self.bold > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.strike > 0 {
            style = style.add_modifier(Modifier::CROSSED_OUT);
        }
        style
    }

    fn flush_line(&mut self) {
        if !self.current_spans.is_empty() {
            let spans = mem::take(&mut self.current_spans);
            self.lines.push(Line::from(spans));
        }
    }

    fn flush_code_block(&mut self) {
        let fence_style = Style::default().fg(self.fence_fg);
        self.lines.push(Line::from(Span::styled("```", fence_style)));
        for line in self.code_lines.drain(..) {
            self.lines.push(Line::from(Span::styled(line, fence_style)));
        }
        self.lines.push(Line::from(Span::styled("```", fence_style)));
    }
}

#[cfg(test)]
mod tests {
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
    fn plain_text_renders_one_line() {
        clear_render_cache();
        let palette = Palette::standard();
        let lines = render_markdown("Hello world", Style::default(), &palette);
        assert_eq!(lines.len(), 1);
        assert_eq!(flatten(&lines), "Hello world");
    }

    #[test]
    fn heading_keeps_nested_bold_after_inner_span_closes() {
        clear_render_cache();
        let palette = Palette::standard();
        let lines = render_markdown("# Intro **key** point", Style::default(), &palette);

        let heading = lines
            .iter()
            .find(|line| {
                let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
                text.contains("point")
            })
            .expect("heading line");

        for span in heading.spans.iter().filter(|s| !s.content.trim().is_empty()) {
            assert!(
                span.style.add_modifier.contains(Modifier::BOLD),
                "span {:?} in heading should be bold",
                span.content
            );
        }
    }

    #[test]
    fn bold_survives_nested_italic() {
        clear_render_cache();
        let palette = Palette::standard();
        let lines = render_markdown("**outer _inner_ still bold**", Style::default(), &palette);

        let span = lines
            .iter()
            .flat_map(|line| line.spans.iter())
            .find(|span| span.content.contains("still bold"))
            .expect("tail span");
        assert!(span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn inline_code_uses_the_palette_accent() {
        clear_render_cache();
        let palette = Palette::standard();
        let lines = render_markdown("run `cargo test` now", Style::default(), &palette);

        let code = lines
            .iter()
            .flat_map(|line| line.spans.iter())
            .find(|span| span.content == "cargo test")
            .expect("code span");
        assert_eq!(code.style.fg, Some(palette.peach));
    }

    #[test]
    fn code_blocks_are_fenced() {
        clear_render_cache();
        let palette = Palette::standard();
        let lines = render_markdown("```\nlet x = 1;\n```", Style::default(), &palette);
        let text = flatten(&lines);
        assert!(text.starts_with("```"));
        assert!(text.contains("let x = 1;"));
        assert!(text.ends_with("```"));
    }

    #[test]
    fn bullet_and_numbered_lists_get_markers() {
        clear_render_cache();
        let palette = Palette::standard();
        let text = flatten(&render_markdown(
            "- first\n- second",
            Style::default(),
            &palette,
        ));
        assert!(text.contains("- first"));

        let text = flatten(&render_markdown(
            "1. one\n2. two",
            Style::default(),
            &palette,
        ));
        assert!(text.contains("1. one"));
        assert!(text.contains("2. two"));
    }

    #[test]
    fn task_list_markers_render_as_checkboxes() {
        clear_render_cache();
        let palette = Palette::standard();
        let text = flatten(&render_markdown(
            "- [x] done\n- [ ] open",
            Style::default(),
            &palette,
        ));
        assert!(text.contains("[x] done"));
        assert!(text.contains("[ ] open"));
    }

    #[test]
    fn table_markup_passes_through_as_text() {
        clear_render_cache();
        let palette = Palette::standard();
        let text = flatten(&render_markdown(
            "| a | b |\n|---|---|\n| 1 | 2 |",
            Style::default(),
            &palette,
        ));
        assert!(text.contains("| a | b |"));
    }

    #[test]
    fn xml_like_tags_are_not_dropped() {
        clear_render_cache();
        let palette = Palette::standard();
        let text = flatten(&render_markdown(
            "<note>keep this</note>",
            Style::default(),
            &palette,
        ));
        assert!(text.contains("keep this"));
    }

    #[test]
    fn cache_returns_an_identical_render() {
        clear_render_cache();
        let palette = Palette::standard();
        let content = "# Hi\n\nSome **bold** text.";

        let first = render_markdown(content, Style::default(), &palette);
        let second = render_markdown(content, Style::default(), &palette);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(format!("{a:?}"), format!("{b:?}"));
        }
    }
}
