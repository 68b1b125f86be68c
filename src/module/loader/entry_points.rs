//! Entry point registry
//!
//! Modules are linked into the host ahead of time; a manifest's
//! `entry_point` field names one of the targets registered here. Each target
//! exposes named entries, `main` being the default.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::module::traits::{EntryPoint, ModuleError};

/// Entry invoked when a reference names only a target
pub const DEFAULT_ENTRY: &str = "main";

/// Separator between target and entry in a reference (`target::entry`)
pub const ENTRY_SEPARATOR: &str = "::";

/// A launch target: a table of named entries
#[derive(Clone, Default)]
pub struct EntryTarget {
    entries: HashMap<String, Arc<dyn EntryPoint>>,
}

impl EntryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target whose only entry is [`DEFAULT_ENTRY`]
    pub fn main<E: EntryPoint + 'static>(entry: E) -> Self {
        Self::new().with_entry(DEFAULT_ENTRY, entry)
    }

    pub fn with_entry<E: EntryPoint + 'static>(
        mut self,
        name: impl Into<String>,
        entry: E,
    ) -> Self {
        self.entries.insert(name.into(), Arc::new(entry));
        self
    }

    pub fn entry(&self, name: &str) -> Option<Arc<dyn EntryPoint>> {
        self.entries.get(name).cloned()
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for EntryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entry_names().collect();
        names.sort_unstable();
        f.debug_struct("EntryTarget").field("entries", &names).finish()
    }
}

/// Registry of launch targets by name
#[derive(Debug, Clone, Default)]
pub struct EntryPointRegistry {
    targets: HashMap<String, EntryTarget>,
}

impl EntryPointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a target
    pub fn register_target(&mut self, name: impl Into<String>, target: EntryTarget) {
        let name = name.into();
        debug!("Registering entry target: {}", name);
        self.targets.insert(name, target);
    }

    /// Register `entry` as the `main` entry of target `name`
    pub fn register<E: EntryPoint + 'static>(&mut self, name: impl Into<String>, entry: E) {
        self.register_target(name, EntryTarget::main(entry));
    }

    pub fn contains_target(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Resolve an entry point reference to a callable
    ///
    /// A reference naming a registered target resolves to its `main` entry;
    /// otherwise it is split at its last `::` into target and entry.
    pub fn resolve(&self, reference: &str) -> Result<Arc<dyn EntryPoint>, ModuleError> {
        let reference = reference.trim();
        let (target_name, entry_name) = if self.contains_target(reference) {
            (reference, DEFAULT_ENTRY)
        } else {
            reference
                .rsplit_once(ENTRY_SEPARATOR)
                .filter(|(target, entry)| !target.is_empty() && !entry.is_empty())
                .ok_or_else(|| ModuleError::EntryTargetNotFound {
                    reference: reference.to_string(),
                })?
        };

        let target = self
            .targets
            .get(target_name)
            .ok_or_else(|| ModuleError::EntryTargetNotFound {
                reference: reference.to_string(),
            })?;

        target
            .entry(entry_name)
            .ok_or_else(|| ModuleError::EntryNotFound {
                target: target_name.to_string(),
                entry: entry_name.to_string(),
            })
    }
}
