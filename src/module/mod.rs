//! Module system
//!
//! Loads modules described by manifests, resolves their dependencies on
//! each other, selects the single main module and launches it.
//!
//! ## Architecture
//!
//! - **Registry**: manifests, versions, the module store and dependency resolution
//! - **Validation**: structural checks applied before a module is stored
//! - **Loader**: entry points linked into the host, resolved by reference
//! - **Manager**: the load / resolve / launch sequence

pub mod loader;
pub mod manager;
pub mod registry;
pub mod traits;
pub mod validation;

pub use loader::{EntryPointRegistry, EntryTarget};
pub use manager::{LaunchPlan, LoadReport, ModuleManager};
pub use registry::{ModuleManifest, ModuleRecord, Version, VersionReq};
pub use traits::{EntryPoint, ModuleContext, ModuleError, ModuleId, ModuleState};
