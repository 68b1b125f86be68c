//! Manifest validation framework
//!
//! Validates module manifests for structure before they enter the module
//! store. Dependencies are not resolved here, only checked for shape.

use tracing::{debug, warn};

use crate::module::registry::dependencies::Constraint;
use crate::module::registry::manifest::ModuleManifest;
use crate::module::registry::version::{Version, VersionReq};
use crate::module::traits::{ModuleError, ModuleId};

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Manifest is valid
    Valid,
    /// Manifest is invalid with specific errors
    Invalid(Vec<String>),
}

/// Manifest after structural validation: parsed identity and constraints
#[derive(Debug, Clone)]
pub struct ValidatedManifest {
    pub id: ModuleId,
    pub constraints: Vec<Constraint>,
    pub manifest: ModuleManifest,
}

/// Manifest validator
pub struct ManifestValidator {
    /// Maximum manifest size (bytes)
    max_manifest_size: usize,
    /// Maximum module name length
    max_name_len: usize,
}

impl ManifestValidator {
    /// Create a new manifest validator
    pub fn new() -> Self {
        Self {
            max_manifest_size: 64 * 1024, // 64 KB max
            max_name_len: 64,
        }
    }

    /// Reject manifest files above the size limit before parsing them
    pub fn check_size(&self, len: usize, source_name: &str) -> Result<(), ModuleError> {
        if len > self.max_manifest_size {
            return Err(ModuleError::invalid(
                source_name,
                format!(
                    "Manifest is {} bytes, limit is {} bytes",
                    len, self.max_manifest_size
                ),
            ));
        }
        Ok(())
    }

    /// Validate a module manifest
    pub fn validate(&self, manifest: &ModuleManifest) -> ValidationResult {
        let mut errors = Vec::new();

        if manifest.name.is_empty() {
            errors.push("Module name cannot be empty".to_string());
        } else if !self.is_valid_name(&manifest.name) {
            errors.push(format!(
                "Invalid module name: {} (must be alphanumeric with dashes/underscores/dots)",
                manifest.name
            ));
        }

        if manifest.version.is_empty() {
            errors.push("Module version cannot be empty".to_string());
        } else if let Err(e) = manifest.version.parse::<Version>() {
            errors.push(format!(
                "Invalid version format: {} (expected semantic versioning: {})",
                manifest.version, e.reason
            ));
        }

        if manifest.entry_point.trim().is_empty() {
            errors.push("Entry point cannot be empty".to_string());
        }

        errors.extend(self.validate_dependencies(manifest));

        if errors.is_empty() {
            debug!("Manifest validation passed for module: {}", manifest.name);
            ValidationResult::Valid
        } else {
            warn!(
                "Manifest validation failed for module {}: {:?}",
                manifest.name, errors
            );
            ValidationResult::Invalid(errors)
        }
    }

    /// Validate and parse a manifest into its identity and constraints
    pub fn validated(
        &self,
        manifest: ModuleManifest,
        source_name: &str,
    ) -> Result<ValidatedManifest, ModuleError> {
        if let ValidationResult::Invalid(problems) = self.validate(&manifest) {
            return Err(ModuleError::InvalidModule {
                source_name: source_name.to_string(),
                problems,
            });
        }

        // validate() has already vetted every string parsed below
        let version = manifest
            .version
            .parse::<Version>()
            .map_err(|e| ModuleError::invalid(source_name, e.to_string()))?;
        let constraints = manifest
            .dependencies
            .iter()
            .map(|dep| {
                dep.version
                    .parse::<VersionReq>()
                    .map(|requirement| Constraint {
                        target: dep.name.clone(),
                        requirement,
                    })
                    .map_err(|e| ModuleError::invalid(source_name, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedManifest {
            id: ModuleId::new(manifest.name.clone(), version),
            constraints,
            manifest,
        })
    }

    /// Validate module name format
    #[inline]
    fn is_valid_name(&self, name: &str) -> bool {
        if name.is_empty() || name.len() > self.max_name_len {
            return false;
        }

        // Must start with alphanumeric
        if !name.chars().next().is_some_and(|c| c.is_alphanumeric()) {
            return false;
        }

        name.chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    }

    /// Validate dependencies
    fn validate_dependencies(&self, manifest: &ModuleManifest) -> Vec<String> {
        let mut errors = Vec::new();

        for dep in &manifest.dependencies {
            if !self.is_valid_name(&dep.name) {
                errors.push(format!("Invalid dependency name: {}", dep.name));
            } else if dep.name == manifest.name {
                errors.push(format!("Module {} cannot depend on itself", dep.name));
            }

            if let Err(e) = dep.version.parse::<VersionReq>() {
                errors.push(format!(
                    "Invalid dependency version format: {} (for dependency: {}: {})",
                    dep.version, dep.name, e.reason
                ));
            }
        }

        errors
    }
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self::new()
    }
}
