//! Module loader
//!
//! Resolves manifest entry point references to linked-in callables.

pub mod entry_points;

pub use entry_points::{EntryPointRegistry, EntryTarget, DEFAULT_ENTRY, ENTRY_SEPARATOR};
