//! @-tag routing and prompt context assembly.
//!
//! Messages address an agent with a whitespace-delimited tag (`@cc`,
//! `@claude`, `@g`, `@gemini`, any case). The first tag wins and every
//! tag is removed from the text handed to the agent.
//!
//! Prompts open with an explicit chat header so a coding CLI does not
//! mistake replayed conversation for something to execute.

use duet_types::{AiTarget, ChatMessage};

/// Header prepended to every context block.
pub const CONTEXT_HEADER: &str = "[Chat context, reply to last USER message]";

/// Split a routing tag off a message.
///
/// Returns the addressed target (if any) and the message with all tags
/// removed and whitespace collapsed. Without a tag the trimmed message
/// is returned untouched.
#[must_use]
pub fn parse_routing_tag(text: &str) -> (Option<AiTarget>, String) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return (None, String::new());
    }

    let mut target = None;
    let mut kept: Vec<&str> = Vec::new();
    for token in trimmed.split_whitespace() {
        match tag_target(token) {
            Some(tagged) => {
                if target.is_none() {
                    target = Some(tagged);
                }
            }
            None => kept.push(token),
        }
    }

    if target.is_none() {
        return (None, trimmed.to_owned());
    }
    (target, kept.join(" "))
}

fn tag_target(token: &str) -> Option<AiTarget> {
    let tag = token.strip_prefix('@')?;
    AiTarget::parse(tag).ok()
}

/// Build the context block for `target` from turns it has not seen.
///
/// `last_seen` is the index of the last message the target produced;
/// `None` means it has never replied and sees everything. At most
/// `limit` turns are included, newest kept, and ephemeral turns are
/// skipped. Returns an empty string when nothing is new.
#[must_use]
pub fn build_context(
    messages: &[ChatMessage],
    last_seen: Option<usize>,
    limit: usize,
) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let start = last_seen.map_or(0, |idx| idx + 1).min(messages.len());
    let mut unseen = &messages[start..];
    if unseen.len() > limit {
        unseen = &unseen[unseen.len() - limit..];
    }

    let relevant: Vec<&ChatMessage> = unseen.iter().filter(|m| !m.ephemeral).collect();
    if relevant.is_empty() {
        return String::new();
    }

    let turns: Vec<String> = relevant
        .iter()
        .map(|m| format!("{} said {}", m.speaker.label(), m.content))
        .collect();
    format!("{CONTEXT_HEADER}\n{}", turns.join("\n\n"))
}

// ============================================================================
// Tests
// ============================================================================
