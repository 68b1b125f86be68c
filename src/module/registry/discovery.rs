//! Module discovery
//!
//! Scans a modules directory for manifest files and yields module package
//! paths (manifest path without its extension).

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::module::registry::manifest::ManifestFormat;
use crate::module::traits::ModuleError;

/// Module discovery scanner
pub struct ModuleDiscovery {
    /// Base directory to scan for modules
    modules_dir: PathBuf,
    /// Optional allow-list of package names (file stems)
    enabled: Option<Vec<String>>,
}

impl ModuleDiscovery {
    /// Create a new module discovery scanner
    pub fn new<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
            enabled: None,
        }
    }

    /// Only yield packages whose file stem is listed; an empty list keeps all
    pub fn with_enabled(mut self, enabled: &[String]) -> Self {
        self.enabled = (!enabled.is_empty()).then(|| enabled.to_vec());
        self
    }

    /// Discover module package paths, sorted by file name
    ///
    /// A package with both `.toml` and `.json` manifests is yielded once;
    /// loading it picks the TOML manifest.
    pub fn discover_modules(&self) -> Result<Vec<PathBuf>, ModuleError> {
        info!("Discovering modules in {:?}", self.modules_dir);

        let entries = fs::read_dir(&self.modules_dir).map_err(|source| ModuleError::Io {
            path: self.modules_dir.clone(),
            source,
        })?;

        let mut packages = BTreeSet::new();
        for entry in entries {
            let path = entry
                .map_err(|source| ModuleError::Io {
                    path: self.modules_dir.clone(),
                    source,
                })?
                .path();

            if !path.is_file() || ManifestFormat::from_path(&path).is_none() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(enabled) = &self.enabled {
                if !enabled.iter().any(|e| e == stem) {
                    debug!("Module {} not enabled, skipping", stem);
                    continue;
                }
            }
            packages.insert(path.with_extension(""));
        }

        info!("Discovered {} modules", packages.len());
        Ok(packages.into_iter().collect())
    }
}
