//! Shared conversation state for the duet.
//!
//! Both agents reply over one conversation, but each agent only runs when
//! spoken to. This crate tracks what each agent has already seen so its
//! next prompt replays just the turns it missed, and decides which agent
//! a message addresses.
//!
//! # Architecture
//!
//! ```text
//! ConversationHistory
//! ├── messages: bounded turn list (oldest dropped past the cap)
//! └── cursors: last message index each agent has seen
//!
//! routing
//! ├── parse_routing_tag: "@cc fix this" -> (Claude, "fix this")
//! └── build_context: unseen turns -> "[Chat context, ...]" block
//! ```

mod history;
mod routing;

pub use history::ConversationHistory;
pub use routing::{CONTEXT_HEADER, build_context, parse_routing_tag};
