//! Filesystem probe behind a trait.
//!
//! Parsers decide whether a `WriteFile` creates or overwrites by checking
//! the disk. They go through this trait so tests can run against a fake
//! filesystem.

use std::path::Path;

pub trait PathProbe: Send + Sync {
    /// Whether `path` currently exists on disk.
    fn exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl PathProbe for SystemProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
