//! modhost - minimal module runtime
//!
//! Loads self-contained modules described by manifests, resolves their
//! dependencies on each other, selects the single main module and launches
//! it. Launched modules interoperate through a typed service registry,
//! without compile-time references to each other.
//!
//! ## Components
//!
//! 1. `module`: manifests, versions, the module store, dependency resolution
//!    and the load / run sequence ([`ModuleManager`])
//! 2. `services`: the process-wide service registry ([`Services`])
//! 3. `config` and `utils`: runtime configuration and logging setup
//!
//! ## Example
//!
//! ```no_run
//! use modhost::{ModuleContext, ModuleManager, Services};
//!
//! # async fn launch() -> anyhow::Result<()> {
//! let mut manager = ModuleManager::new(Services::new());
//! manager.register_entry_point("app", |ctx: ModuleContext| async move {
//!     ctx.services.publish(std::sync::Arc::new(String::from("ready")));
//!     Ok::<_, anyhow::Error>(())
//! });
//! manager.load_directory("modules").await?;
//! manager.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod module;
pub mod services;
pub mod utils;

pub use config::{LoggingConfig, ModuleConfig, RuntimeConfig};
pub use module::{
    EntryPoint, EntryPointRegistry, EntryTarget, LaunchPlan, LoadReport, ModuleContext,
    ModuleError, ModuleId, ModuleManager, ModuleManifest, ModuleState, Version, VersionReq,
};
pub use services::{
    InterfaceType, ListenerRegistration, Registration, ServiceError, ServiceEvent,
    ServiceEventKind, ServiceListener, Services,
};
