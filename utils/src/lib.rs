//! Shared infrastructure utilities for Duet.
//!
//! This crate provides cross-cutting utilities that multiple Duet crates need
//! but that don't belong in the domain-pure `duet-types` crate:
//!
//! - **`clipboard`**: best-effort system clipboard with an OSC 52 fallback
//! - **`diff`**: unified rendering of tool diffs captured from CLI panes

pub mod clipboard;
pub mod diff;

pub use clipboard::{clip_preview, copy_to_clipboard};
pub use diff::unified_from_markers;
