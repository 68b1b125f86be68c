//! Module validation framework
//!
//! Structural manifest validation performed at load time.

pub mod manifest_validator;

pub use manifest_validator::{ManifestValidator, ValidatedManifest, ValidationResult};
