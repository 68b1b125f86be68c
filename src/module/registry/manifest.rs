//! Module manifest parsing
//!
//! A module package is located by a path without extension; the manifest
//! lives next to it as `<path>.toml` or `<path>.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::module::traits::ModuleError;

/// Manifest file extensions, probed in order
pub const MANIFEST_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// One dependency constraint: target module name plus version requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Target module name
    pub name: String,
    /// Version requirement (`*`, `1.2`, `>=1.0, <2.0`, `^1.4`, ...)
    #[serde(default = "default_requirement")]
    pub version: String,
}

fn default_requirement() -> String {
    "*".to_string()
}

impl DependencySpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Module manifest (module.toml / module.json structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Module name
    pub name: String,
    /// Module version (semantic versioning)
    pub version: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Module author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Reference of the entry point invoked when this module is launched
    pub entry_point: String,
    /// Whether this is the main module
    #[serde(default)]
    pub main: bool,
    /// Dependency constraints, in declaration order
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    /// Default configuration handed to the entry point
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// Manifest encoding, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(ManifestFormat::Toml),
            Some("json") => Some(ManifestFormat::Json),
            _ => None,
        }
    }
}

impl ModuleManifest {
    /// Minimal manifest with no dependencies and no main flag
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            author: None,
            entry_point: entry_point.into(),
            main: false,
            dependencies: Vec::new(),
            config: HashMap::new(),
        }
    }

    /// Builder helper: mark as main module
    pub fn with_main(mut self, main: bool) -> Self {
        self.main = main;
        self
    }

    /// Builder helper: append a dependency constraint
    pub fn with_dependency(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.dependencies.push(DependencySpec::new(name, version));
        self
    }

    /// Parse manifest contents
    ///
    /// `source_name` only labels errors.
    pub fn parse(
        contents: &str,
        format: ManifestFormat,
        source_name: &str,
    ) -> Result<Self, ModuleError> {
        match format {
            ManifestFormat::Toml => toml::from_str(contents).map_err(|e| {
                ModuleError::invalid(source_name, format!("Failed to parse manifest TOML: {e}"))
            }),
            ManifestFormat::Json => serde_json::from_str(contents).map_err(|e| {
                ModuleError::invalid(source_name, format!("Failed to parse manifest JSON: {e}"))
            }),
        }
    }

    /// Locate the manifest file for a module package path
    ///
    /// An existing file with a known manifest extension is used as-is;
    /// otherwise each extension in [`MANIFEST_EXTENSIONS`] is appended in turn.
    pub fn locate<P: AsRef<Path>>(path: P) -> Result<(PathBuf, ManifestFormat), ModuleError> {
        let path = path.as_ref();
        if let Some(format) = ManifestFormat::from_path(path) {
            if path.is_file() {
                return Ok((path.to_path_buf(), format));
            }
        }

        for ext in MANIFEST_EXTENSIONS {
            let candidate = with_appended_extension(path, ext);
            if candidate.is_file() {
                if let Some(format) = ManifestFormat::from_path(&candidate) {
                    return Ok((candidate, format));
                }
            }
        }

        Err(ModuleError::Io {
            path: with_appended_extension(path, MANIFEST_EXTENSIONS[0]),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "no manifest found (tried .{})",
                    MANIFEST_EXTENSIONS.join(", .")
                ),
            ),
        })
    }

    /// Load manifest from a module package path
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<(Self, PathBuf), ModuleError> {
        let (manifest_path, format) = Self::locate(path)?;
        let contents = tokio::fs::read_to_string(&manifest_path)
            .await
            .map_err(|source| ModuleError::Io {
                path: manifest_path.clone(),
                source,
            })?;
        let manifest = Self::parse(&contents, format, &manifest_path.display().to_string())?;
        Ok((manifest, manifest_path))
    }

    /// Serialize as pretty TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// `foo/bar` + `toml` -> `foo/bar.toml`, keeping dots already in the file name
fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}
