//! Integration test modules.

mod checks;
mod high_impact;
