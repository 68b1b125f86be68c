//! Module system traits and interfaces
//!
//! Defines the lifecycle state, identity, context and error types shared by
//! the module manager, the loader and module code.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

use crate::module::registry::version::Version;
use crate::services::Services;

/// Module lifecycle state
///
/// `Loaded -> Resolved -> Launched`, or `Failed` from any earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleState {
    /// Manifest validated and stored
    Loaded,
    /// Every dependency constraint is satisfied and a single main module
    /// was selected
    Resolved,
    /// Main module whose entry point was invoked successfully
    Launched,
    /// Validation, resolution or launch failed
    ///
    /// Terminal for the `run()` that produced it, not for the process: the
    /// next `run()` puts the module back to `Loaded` and retries.
    Failed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Loaded => "loaded",
            ModuleState::Resolved => "resolved",
            ModuleState::Launched => "launched",
            ModuleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Module identity: (name, version)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId {
    pub name: String,
    pub version: Version,
}

impl ModuleId {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Context handed to a module's entry point at launch
///
/// Carries the module identity, the process-wide service registry and the
/// module's merged configuration.
#[derive(Clone)]
pub struct ModuleContext {
    /// Module identity
    pub id: ModuleId,
    /// Unique identifier for this launch (`name@version-<uuid>`)
    pub instance_id: String,
    /// Shared service registry
    pub services: Services,
    /// Module configuration (manifest values overlaid by runtime overrides)
    pub config: HashMap<String, String>,
}

impl ModuleContext {
    /// Create a new module context
    pub fn new(id: ModuleId, services: Services, config: HashMap<String, String>) -> Self {
        let instance_id = format!("{}-{}", id, uuid::Uuid::new_v4());
        Self {
            id,
            instance_id,
            services,
            config,
        }
    }

    /// Get a configuration value
    pub fn get_config(&self, key: &str) -> Option<&String> {
        self.config.get(key)
    }

    /// Get a configuration value with default
    pub fn get_config_or(&self, key: &str, default: &str) -> String {
        self.config
            .get(key)
            .map(|s| s.as_str())
            .unwrap_or(default)
            .to_string()
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("id", &self.id)
            .field("instance_id", &self.instance_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A launchable entry of a module
///
/// Entry points are registered with the [`EntryPointRegistry`] under the
/// reference a manifest names in its `entry_point` field. Any async closure
/// taking a [`ModuleContext`] is an entry point.
///
/// [`EntryPointRegistry`]: crate::module::loader::EntryPointRegistry
#[async_trait]
pub trait EntryPoint: Send + Sync {
    /// Run the module. Errors are surfaced to the caller of `run()`.
    async fn run(&self, ctx: ModuleContext) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> EntryPoint for F
where
    F: Fn(ModuleContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: ModuleContext) -> anyhow::Result<()> {
        (self)(ctx).await
    }
}

/// Module system errors
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Invalid module {source_name}: {}", .problems.join("; "))]
    InvalidModule {
        source_name: String,
        problems: Vec<String>,
    },

    #[error("Module {0} is already loaded")]
    DuplicateVersion(ModuleId),

    #[error("Failed to read module manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Module {module} depends on {target} {requirement}, which is not loaded")]
    DependencyNotFound {
        module: ModuleId,
        target: String,
        requirement: String,
    },

    #[error("Circular dependency between modules: {}", format_cycle(.modules))]
    DependencyCycle { modules: Vec<ModuleId> },

    #[error("{}", describe_missing_main(.candidates))]
    NoMainModule { candidates: Vec<ModuleId> },

    #[error("Entry point target not found: {reference}")]
    EntryTargetNotFound { reference: String },

    #[error("Entry {entry} not found on target {target}")]
    EntryNotFound { target: String, entry: String },

    #[error("Entry point of module {module} failed: {source}")]
    InvocationFailed {
        module: ModuleId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Module {0} has already been launched")]
    AlreadyLaunched(ModuleId),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),
}

impl ModuleError {
    /// Load-time errors are local to one module; the caller may skip it
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            ModuleError::InvalidModule { .. }
                | ModuleError::DuplicateVersion(_)
                | ModuleError::Io { .. }
        )
    }

    pub(crate) fn invalid(source_name: impl Into<String>, problem: impl Into<String>) -> Self {
        ModuleError::InvalidModule {
            source_name: source_name.into(),
            problems: vec![problem.into()],
        }
    }
}

fn format_cycle(ids: &[ModuleId]) -> String {
    ids.iter()
        .chain(ids.first())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn describe_missing_main(candidates: &[ModuleId]) -> String {
    if candidates.is_empty() {
        "No main module loaded".to_string()
    } else {
        format!(
            "No main module: {} modules are flagged main ({})",
            candidates.len(),
            candidates
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
