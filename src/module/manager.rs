//! Module manager for orchestrating all modules
//!
//! Handles loading (validate + store), dependency resolution, main module
//! selection and launch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::ModuleConfig;
use crate::module::loader::{EntryPointRegistry, EntryTarget};
use crate::module::registry::{
    ModuleDependencies, ModuleDiscovery, ModuleManifest, ModuleRecord, ModuleStore,
};
use crate::module::traits::{EntryPoint, ModuleContext, ModuleError, ModuleId, ModuleState};
use crate::module::validation::ManifestValidator;
use crate::services::Services;

/// Outcome of a successful resolution: launch order and the main module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Every loaded module, dependencies first
    pub order: Vec<ModuleId>,
    /// The module whose entry point is invoked
    pub main: ModuleId,
}

/// Result of loading a modules directory
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Modules loaded, in discovery order
    pub loaded: Vec<ModuleId>,
    /// Packages skipped, with the load error of each
    pub rejected: Vec<(PathBuf, ModuleError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Module manager coordinates all loaded modules
///
/// `load_*` and `run` take `&mut self`: all modules are loaded before a run
/// begins. The service registry handed to launched modules is shared and
/// may be used from any thread.
pub struct ModuleManager {
    /// Loaded modules
    store: ModuleStore,
    /// Linked-in entry points
    entry_points: EntryPointRegistry,
    /// Registry shared with launched modules
    services: Services,
    validator: ManifestValidator,
    /// Allow-list applied by `load_directory` (empty = all)
    enabled_modules: Vec<String>,
    /// Per-module configuration overrides, by module name
    module_configs: HashMap<String, HashMap<String, String>>,
}

impl ModuleManager {
    /// Create a new module manager around a service registry
    pub fn new(services: Services) -> Self {
        Self {
            store: ModuleStore::new(),
            entry_points: EntryPointRegistry::new(),
            services,
            validator: ManifestValidator::new(),
            enabled_modules: Vec::new(),
            module_configs: HashMap::new(),
        }
    }

    /// Create a new module manager applying the module section of the
    /// runtime configuration
    pub fn with_config(services: Services, config: &ModuleConfig) -> Self {
        Self {
            enabled_modules: config.enabled_modules.clone(),
            module_configs: config.module_configs.clone(),
            ..Self::new(services)
        }
    }

    pub fn entry_points(&self) -> &EntryPointRegistry {
        &self.entry_points
    }

    pub fn entry_points_mut(&mut self) -> &mut EntryPointRegistry {
        &mut self.entry_points
    }

    /// Register `entry` as the `main` entry of target `name`
    pub fn register_entry_point<E>(&mut self, name: impl Into<String>, entry: E)
    where
        E: EntryPoint + 'static,
    {
        self.entry_points.register(name, entry);
    }

    pub fn register_entry_target(&mut self, name: impl Into<String>, target: EntryTarget) {
        self.entry_points.register_target(name, target);
    }

    /// Load a module package
    ///
    /// `path` names the package without extension (`modules/greeter` for
    /// `modules/greeter.toml`); a path to the manifest file itself also works.
    pub async fn load_module<P: AsRef<Path>>(&mut self, path: P) -> Result<ModuleId, ModuleError> {
        let (manifest_path, _) = ModuleManifest::locate(path.as_ref())?;
        let source_name = manifest_path.display().to_string();
        info!("Loading module from {}", source_name);

        let metadata = tokio::fs::metadata(&manifest_path)
            .await
            .map_err(|source| ModuleError::Io {
                path: manifest_path.clone(),
                source,
            })?;
        self.validator.check_size(
            usize::try_from(metadata.len()).unwrap_or(usize::MAX),
            &source_name,
        )?;

        let (manifest, manifest_path) = ModuleManifest::from_path(&manifest_path).await?;
        self.insert(manifest, &source_name, Some(manifest_path))
    }

    /// Load an in-memory manifest with the same validation as `load_module`
    pub fn load_manifest(&mut self, manifest: ModuleManifest) -> Result<ModuleId, ModuleError> {
        let source_name = manifest.name.clone();
        self.insert(manifest, &source_name, None)
    }

    fn insert(
        &mut self,
        manifest: ModuleManifest,
        source_name: &str,
        source: Option<PathBuf>,
    ) -> Result<ModuleId, ModuleError> {
        let validated = self.validator.validated(manifest, source_name)?;
        let id = self.store.insert(validated, source)?;
        info!("Loaded module {}", id);
        Ok(id)
    }

    /// Load every module package found in `dir`
    ///
    /// Load errors skip the offending package and are collected in the
    /// report; only an unreadable directory fails the whole call.
    pub async fn load_directory<P: AsRef<Path>>(
        &mut self,
        dir: P,
    ) -> Result<LoadReport, ModuleError> {
        let packages = ModuleDiscovery::new(dir)
            .with_enabled(&self.enabled_modules)
            .discover_modules()?;

        let mut report = LoadReport::default();
        for package in packages {
            match self.load_module(&package).await {
                Ok(id) => report.loaded.push(id),
                Err(e) => {
                    warn!("Skipping module {}: {}", package.display(), e);
                    report.rejected.push((package, e));
                }
            }
        }

        info!(
            "Loaded {} modules ({} skipped)",
            report.loaded.len(),
            report.rejected.len()
        );
        Ok(report)
    }

    /// Resolve dependencies and select the main module without launching
    ///
    /// Module states are left untouched.
    pub fn resolve(&self) -> Result<LaunchPlan, ModuleError> {
        let resolution = ModuleDependencies::resolve(&self.store).map_err(|f| f.error)?;
        let main = Self::select_main(&self.store)?;
        Ok(LaunchPlan {
            order: resolution.load_order,
            main,
        })
    }

    /// Resolve, select and launch the main module
    ///
    /// All-or-nothing: nothing is invoked unless every dependency constraint
    /// is satisfied and exactly one module is flagged main. Modules become
    /// `Resolved` only once both checks pass; a failure to find or run the
    /// main entry point then leaves the other modules `Resolved`. Each call
    /// starts from a clean slate (Failed and Resolved modules go back to
    /// Loaded); once a module has been launched, later calls fail with
    /// `AlreadyLaunched`.
    pub async fn run(&mut self) -> Result<LaunchPlan, ModuleError> {
        if let Some(launched) = self.store.iter().find(|r| r.state == ModuleState::Launched) {
            return Err(ModuleError::AlreadyLaunched(launched.id.clone()));
        }
        self.store
            .set_state_where(ModuleState::Loaded, |r| r.state != ModuleState::Loaded);

        info!(
            "Resolving {} modules against {} entry targets",
            self.store.len(),
            self.entry_points.len()
        );
        if self.entry_points.is_empty() {
            warn!("No entry targets registered; the main module cannot be launched");
        }
        let resolution = match ModuleDependencies::resolve(&self.store) {
            Ok(resolution) => resolution,
            Err(failure) => {
                for id in &failure.failed {
                    self.store.set_state(id, ModuleState::Failed);
                }
                error!("Dependency resolution failed: {}", failure.error);
                return Err(failure.error);
            }
        };
        let main = match Self::select_main(&self.store) {
            Ok(main) => main,
            Err(e) => {
                if let ModuleError::NoMainModule { candidates } = &e {
                    for id in candidates {
                        self.store.set_state(id, ModuleState::Failed);
                    }
                }
                error!("{}", e);
                return Err(e);
            }
        };
        self.store.set_state_where(ModuleState::Resolved, |_| true);

        self.launch(&main).await?;
        Ok(LaunchPlan {
            order: resolution.load_order,
            main,
        })
    }

    async fn launch(&mut self, main: &ModuleId) -> Result<(), ModuleError> {
        let record = self
            .store
            .get(main)
            .ok_or_else(|| ModuleError::ModuleNotFound(main.to_string()))?;

        let entry = match self.entry_points.resolve(record.entry_point()) {
            Ok(entry) => entry,
            Err(e) => {
                error!("Cannot launch {}: {}", main, e);
                self.store.set_state(main, ModuleState::Failed);
                return Err(e);
            }
        };
        let ctx = ModuleContext::new(main.clone(), self.services.clone(), self.config_for(record));

        info!("Launching main module {} ({})", main, ctx.instance_id);
        // a panicking entry point surfaces as a JoinError
        let outcome = tokio::spawn(async move { entry.run(ctx).await }).await;
        let result = match outcome {
            Ok(result) => result,
            Err(join_error) => Err(anyhow::Error::new(join_error)),
        };

        match result {
            Ok(()) => {
                self.store.set_state(main, ModuleState::Launched);
                info!("Module {} launched", main);
                Ok(())
            }
            Err(source) => {
                error!("Module {} failed: {:#}", main, source);
                self.store.set_state(main, ModuleState::Failed);
                Err(ModuleError::InvocationFailed {
                    module: main.clone(),
                    source,
                })
            }
        }
    }

    fn select_main(store: &ModuleStore) -> Result<ModuleId, ModuleError> {
        let mut candidates: Vec<ModuleId> = store
            .iter()
            .filter(|r| r.is_main())
            .map(|r| r.id.clone())
            .collect();

        if candidates.len() == 1 {
            if let Some(main) = candidates.pop() {
                return Ok(main);
            }
        }
        Err(ModuleError::NoMainModule { candidates })
    }

    /// Manifest config overlaid by the runtime overrides for the module name
    fn config_for(&self, record: &ModuleRecord) -> HashMap<String, String> {
        let mut config = record.manifest.config.clone();
        if let Some(overrides) = self.module_configs.get(&record.id.name) {
            config.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        config
    }

    pub fn module_state(&self, id: &ModuleId) -> Option<ModuleState> {
        self.store.state(id)
    }

    /// Loaded module records, in load order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.store.iter()
    }

    /// Highest loaded version of the module called `name`
    pub fn find(&self, name: &str) -> Result<&ModuleRecord, ModuleError> {
        self.store
            .versions_of(name)
            .max()
            .and_then(|v| self.store.get(&ModuleId::new(name, v.clone())))
            .ok_or_else(|| ModuleError::ModuleNotFound(name.to_string()))
    }

    pub fn services(&self) -> &Services {
        &self.services
    }
}
