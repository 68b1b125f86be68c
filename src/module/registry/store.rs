//! Module store
//!
//! Holds loaded module records in load order, keyed by (name, version).

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::module::registry::dependencies::Constraint;
use crate::module::registry::manifest::ModuleManifest;
use crate::module::registry::version::Version;
use crate::module::traits::{ModuleError, ModuleId, ModuleState};
use crate::module::validation::ValidatedManifest;

/// Loaded module record
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Module identity
    pub id: ModuleId,
    /// Parsed dependency constraints, in declaration order
    pub constraints: Vec<Constraint>,
    /// Original manifest
    pub manifest: ModuleManifest,
    /// Manifest file the module was loaded from, if any
    pub source: Option<PathBuf>,
    /// Lifecycle state
    pub state: ModuleState,
}

impl ModuleRecord {
    pub fn is_main(&self) -> bool {
        self.manifest.main
    }

    pub fn entry_point(&self) -> &str {
        &self.manifest.entry_point
    }
}

/// Module store
#[derive(Debug, Default)]
pub struct ModuleStore {
    /// Records in load order
    records: Vec<ModuleRecord>,
    /// Id -> index into `records`
    index: HashMap<ModuleId, usize>,
}

impl ModuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validated module in state Loaded
    ///
    /// An existing record with the same (name, version) is never overwritten.
    pub fn insert(
        &mut self,
        validated: ValidatedManifest,
        source: Option<PathBuf>,
    ) -> Result<ModuleId, ModuleError> {
        if self.index.contains_key(&validated.id) {
            return Err(ModuleError::DuplicateVersion(validated.id));
        }

        let id = validated.id.clone();
        self.index.insert(id.clone(), self.records.len());
        self.records.push(ModuleRecord {
            id: validated.id,
            constraints: validated.constraints,
            manifest: validated.manifest,
            source,
            state: ModuleState::Loaded,
        });
        debug!("Stored module {}", id);
        Ok(id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.index.contains_key(id)
    }

    /// All loaded versions of a module, in load order
    pub fn versions_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Version> + 'a {
        self.records
            .iter()
            .filter(move |r| r.id.name == name)
            .map(|r| &r.id.version)
    }

    /// Records in load order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn state(&self, id: &ModuleId) -> Option<ModuleState> {
        self.get(id).map(|r| r.state)
    }

    /// Move a module to `state`; returns false for unknown ids
    pub fn set_state(&mut self, id: &ModuleId, state: ModuleState) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                let record = &mut self.records[i];
                if record.state != state {
                    debug!("Module {}: {} -> {}", id, record.state, state);
                    record.state = state;
                }
                true
            }
            None => false,
        }
    }

    /// Move every record matching `filter` to `state`
    pub fn set_state_where<F>(&mut self, state: ModuleState, mut filter: F)
    where
        F: FnMut(&ModuleRecord) -> bool,
    {
        for record in self.records.iter_mut().filter(|r| filter(r)) {
            record.state = state;
        }
    }
}
