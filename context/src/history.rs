//! Bounded conversation history with per-agent seen cursors.
//!
//! History is shared: the user, Claude and Gemini all append to the same
//! list. Each agent keeps a cursor at the last message it produced, so
//! the next prompt built for it carries only what happened since. Old
//! turns fall off the front once the cap is reached.

use duet_types::{AiTarget, ChatMessage, Speaker};

use crate::routing::build_context;

const DEFAULT_MAX_MESSAGES: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
struct SeenCursors {
    claude: Option<usize>,
    gemini: Option<usize>,
}

impl SeenCursors {
    const fn get(self, target: AiTarget) -> Option<usize> {
        match target {
            AiTarget::Claude => self.claude,
            AiTarget::Gemini => self.gemini,
        }
    }

    const fn set(&mut self, target: AiTarget, value: Option<usize>) {
        match target {
            AiTarget::Claude => self.claude = value,
            AiTarget::Gemini => self.gemini = value,
        }
    }

    /// Shift both cursors down after `excess` messages fell off the front.
    fn shift_down(&mut self, excess: usize) {
        self.claude = self.claude.map(|idx| idx.saturating_sub(excess));
        self.gemini = self.gemini.map(|idx| idx.saturating_sub(excess));
    }
}

/// Shared conversation history between the user and both agents.
#[derive(Debug)]
pub struct ConversationHistory {
    max_messages: usize,
    messages: Vec<ChatMessage>,
    cursors: SeenCursors,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_MESSAGES)
    }

    #[must_use]
    pub fn with_limit(max_messages: usize) -> Self {
        Self {
            max_messages,
            messages: Vec::new(),
            cursors: SeenCursors::default(),
        }
    }

    /// Append a turn, dropping the oldest turns past the cap.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
            self.cursors.shift_down(excess);
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::user(content));
    }

    pub fn push_target(&mut self, target: AiTarget, content: impl Into<String>) {
        self.push(ChatMessage::from_target(target, content));
    }

    /// Context block of turns `target` has not seen yet, capped at `limit`.
    #[must_use]
    pub fn context_for(&self, target: AiTarget, limit: usize) -> String {
        build_context(&self.messages, self.cursors.get(target), limit)
    }

    /// Mark everything currently in history as seen by `target`.
    pub fn mark_seen(&mut self, target: AiTarget) {
        self.cursors.set(target, self.messages.len().checked_sub(1));
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.cursors = SeenCursors::default();
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn last_of(&self, speaker: Speaker) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.speaker == speaker)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::CONTEXT_HEADER;

    #[test]
    fn fresh_agent_sees_every_turn() {
        let mut history = ConversationHistory::new();
        history.push_user("hello");
        history.push_target(AiTarget::Claude, "hi there");

        let context = history.context_for(AiTarget::Gemini, 5);
        assert_eq!(
            context,
            format!("{CONTEXT_HEADER}\nUSER said hello\n\nCLAUDE said hi there")
        );
    }

    #[test]
    fn mark_seen_hides_prior_turns() {
        let mut history = ConversationHistory::new();
        history.push_user("first");
        history.push_target(AiTarget::Claude, "reply");
        history.mark_seen(AiTarget::Claude);
        history.push_user("second");

        let context = history.context_for(AiTarget::Claude, 5);
        assert_eq!(context, format!("{CONTEXT_HEADER}\nUSER said second"));
    }

    #[test]
    fn context_is_capped_to_most_recent_turns() {
        let mut history = ConversationHistory::new();
        for n in 0..10 {
            history.push_user(format!("message {n}"));
        }

        let context = history.context_for(AiTarget::Claude, 3);
        assert!(!context.contains("message 6"));
        assert!(context.contains("message 7"));
        assert!(context.contains("message 9"));
    }

    #[test]
    fn ephemeral_turns_never_reach_context() {
        let mut history = ConversationHistory::new();
        history.push(ChatMessage::user("visible"));
        history.push(ChatMessage::user("transient note").ephemeral());

        let context = history.context_for(AiTarget::Gemini, 5);
        assert!(context.contains("visible"));
        assert!(!context.contains("transient note"));
    }

    #[test]
    fn cap_drops_oldest_and_shifts_cursors() {
        let mut history = ConversationHistory::with_limit(3);
        history.push_user("a");
        history.push_target(AiTarget::Claude, "b");
        history.mark_seen(AiTarget::Claude);
        history.push_user("c");
        history.push_user("d");

        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[0].content, "b");
        // Claude had seen through "b" (index 1); after "a" dropped the
        // cursor points at "b" again (index 0), so "c" and "d" are new.
        let context = history.context_for(AiTarget::Claude, 5);
        assert!(!context.contains("USER said a"));
        assert!(context.contains("USER said c"));
        assert!(context.contains("USER said d"));
    }

    #[test]
    fn clear_resets_messages_and_cursors() {
        let mut history = ConversationHistory::new();
        history.push_user("hello");
        history.mark_seen(AiTarget::Claude);
        history.clear();

        assert!(history.is_empty());
        history.push_user("again");
        assert!(history.context_for(AiTarget::Claude, 5).contains("again"));
    }

    #[test]
    fn last_of_finds_most_recent_turn_by_speaker() {
        let mut history = ConversationHistory::new();
        history.push_target(AiTarget::Claude, "first");
        history.push_user("question");
        history.push_target(AiTarget::Claude, "second");

        let last = history.last_of(Speaker::Claude).map(|m| m.content.as_str());
        assert_eq!(last, Some("second"));
        assert!(history.last_of(Speaker::Gemini).is_none());
    }
}
