//! Module registry and discovery
//!
//! Handles module discovery, manifest parsing, versioning, the module store
//! and dependency resolution.

pub mod dependencies;
pub mod discovery;
pub mod manifest;
pub mod store;
pub mod version;

pub use dependencies::{Constraint, DependencyResolution, ModuleDependencies};
pub use discovery::ModuleDiscovery;
pub use manifest::{DependencySpec, ManifestFormat, ModuleManifest};
pub use store::{ModuleRecord, ModuleStore};
pub use version::{Version, VersionParseError, VersionReq};
