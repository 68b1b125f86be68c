//! Service registry
//!
//! Process-wide, type-indexed registry through which modules publish and
//! discover implementations of shared interfaces:
//! - `registry`: the [`Services`] handle, interface types and lookup errors
//! - `events`: membership events and listener callbacks
//! - `registration`: handles returned by publish and listener registration

pub mod events;
pub mod registration;
pub mod registry;

pub use events::{ServiceEvent, ServiceEventKind, ServiceListener};
pub use registration::{ListenableService, ListenerRegistration, Registration};
pub use registry::{InterfaceType, ServiceError, Services};
