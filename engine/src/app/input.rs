//! Draft editing and @-tag completion for the message input.

use unicode_segmentation::UnicodeSegmentation;

/// Routing tags the completer offers, longest spelling last per agent.
const ROUTING_TAGS: [&str; 4] = ["@cc", "@claude", "@g", "@gemini"];

/// Upper bound on rendered suggestions; only four tags exist today.
pub const MAX_SUGGESTIONS: usize = 4;

/// Handles text editing with proper Unicode grapheme cluster support.
#[derive(Debug, Default, Clone)]
pub struct DraftInput {
    pub(crate) text: String,
    pub(crate) cursor: usize,
}

impl DraftInput {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn take_text(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        let cursor_moved_right = self.cursor.saturating_add(1);
        self.cursor = self.clamp_cursor(cursor_moved_right);
    }

    pub fn enter_char(&mut self, new_char: char) {
        let index = self.byte_index();
        self.text.insert(index, new_char);
        self.move_cursor_right();
    }

    /// Inserts a block of text at the cursor, used for bracketed paste.
    pub fn enter_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let index = self.byte_index();
        self.text.insert_str(index, text);
        let inserted = text.graphemes(true).count();
        self.cursor = self.clamp_cursor(self.cursor.saturating_add(inserted));
    }

    pub fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }

        let start = self.byte_index_at(self.cursor - 1);
        let end = self.byte_index_at(self.cursor);
        self.text.replace_range(start..end, "");
        self.move_cursor_left();
    }

    pub fn delete_char_forward(&mut self) {
        let grapheme_count = self.grapheme_count();
        if self.cursor >= grapheme_count {
            return;
        }

        let start = self.byte_index_at(self.cursor);
        let end = self.byte_index_at(self.cursor + 1);
        self.text.replace_range(start..end, "");
    }

    pub fn delete_word_backwards(&mut self) {
        while self.cursor > 0 {
            let idx = self.cursor - 1;
            if self.grapheme_is_whitespace(idx) {
                self.delete_char();
            } else {
                break;
            }
        }

        while self.cursor > 0 {
            let idx = self.cursor - 1;
            if self.grapheme_is_whitespace(idx) {
                break;
            }
            self.delete_char();
        }
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.grapheme_count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn set_text(&mut self, text: String) {
        self.text = text;
        self.cursor = self.grapheme_count();
    }

    #[must_use]
    pub fn grapheme_count(&self) -> usize {
        self.text.graphemes(true).count()
    }

    fn grapheme_is_whitespace(&self, index: usize) -> bool {
        self.text
            .graphemes(true)
            .nth(index)
            .is_some_and(|grapheme| grapheme.chars().all(char::is_whitespace))
    }

    #[must_use]
    pub fn byte_index(&self) -> usize {
        self.byte_index_at(self.cursor)
    }

    fn byte_index_at(&self, grapheme_index: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .nth(grapheme_index)
            .map_or(self.text.len(), |(i, _)| i)
    }

    fn clamp_cursor(&self, new_cursor_pos: usize) -> usize {
        let max = self.grapheme_count();
        new_cursor_pos.min(max)
    }
}

/// Inline completion for routing tags (@cc, @claude, @g, @gemini).
///
/// Tracks the `@` fragment under the cursor and offers matching tags.
/// Fragments containing whitespace, `/`, or `.` are left alone so file
/// paths pasted into the draft never trigger the dropdown.
#[derive(Debug, Default)]
pub struct AtCompleter {
    suggestions: Vec<&'static str>,
    selected: usize,
    anchor: usize,
}

impl AtCompleter {
    /// Recomputes suggestions after any draft edit or cursor move.
    pub fn update(&mut self, draft: &DraftInput) {
        let Some((anchor, fragment)) = mention_fragment(draft) else {
            self.reset();
            return;
        };

        let needle = fragment.to_ascii_lowercase();
        let matches: Vec<&'static str> = ROUTING_TAGS
            .iter()
            .copied()
            .filter(|tag| tag[1..].starts_with(&needle))
            .take(MAX_SUGGESTIONS)
            .collect();

        if matches.is_empty() {
            self.reset();
        } else {
            self.suggestions = matches;
            self.selected = 0;
            self.anchor = anchor;
        }
    }

    /// Replaces the `@` fragment with the selected tag plus a space.
    pub fn apply(&mut self, draft: &mut DraftInput) -> bool {
        let Some(tag) = self.suggestions.get(self.selected).copied() else {
            return false;
        };

        let start = draft.byte_index_at(self.anchor);
        let end = draft.byte_index();
        draft.text.replace_range(start..end, "");
        draft.cursor = self.anchor;
        draft.enter_text(tag);
        draft.enter_char(' ');
        self.reset();
        true
    }

    pub fn select_next(&mut self) {
        if self.suggestions.is_empty() {
            return;
        }
        self.selected = (self.selected + 1) % self.suggestions.len();
    }

    pub fn select_prev(&mut self) {
        if self.suggestions.is_empty() {
            return;
        }
        let count = self.suggestions.len();
        self.selected = (self.selected + count - 1) % count;
    }

    pub fn reset(&mut self) {
        self.suggestions.clear();
        self.selected = 0;
        self.anchor = 0;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.suggestions.is_empty()
    }

    #[must_use]
    pub fn suggestions(&self) -> &[&'static str] {
        &self.suggestions
    }

    #[must_use]
    pub fn selected(&self) -> usize {
        self.selected
    }
}

/// Finds the `@` fragment immediately before the cursor.
///
/// Returns the grapheme index of the `@` and the fragment after it.
fn mention_fragment(draft: &DraftInput) -> Option<(usize, String)> {
    let before: Vec<&str> = draft
        .text()
        .graphemes(true)
        .take(draft.cursor())
        .collect();

    let at = before.iter().rposition(|grapheme| *grapheme == "@")?;
    let fragment = before[at + 1..].concat();

    // A space ends the tag; slashes and dots mean a path, not a tag.
    if fragment.contains(char::is_whitespace) {
        return None;
    }
    if fragment.contains('/') || fragment.contains('.') {
        return None;
    }

    Some((at, fragment))
}
