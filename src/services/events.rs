//! Service membership events and listeners
//!
//! Events are delivered synchronously, on the publishing thread, to the one
//! listener registered for the interface type. There is no queue.

use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::services::registry::InterfaceType;

/// Kind of membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    /// An instance was published
    Registered,
    /// An instance was removed by an unpublish of its bucket
    Unregistered,
}

/// Membership change of one instance under one interface type
pub struct ServiceEvent<T: ?Sized> {
    pub kind: ServiceEventKind,
    pub interface: InterfaceType,
    pub service: Arc<T>,
}

impl<T: ?Sized> ServiceEvent<T> {
    pub fn new(kind: ServiceEventKind, interface: InterfaceType, service: Arc<T>) -> Self {
        Self {
            kind,
            interface,
            service,
        }
    }
}

impl<T: ?Sized> Clone for ServiceEvent<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            interface: self.interface,
            service: Arc::clone(&self.service),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ServiceEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEvent")
            .field("kind", &self.kind)
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

/// Listener notified of bucket membership changes for interface type `T`
///
/// Callbacks run inside `publish`/`unregister`, after the registry lock has
/// been released, so they may call back into the registry. A slow listener
/// delays the publisher.
///
/// Delivery order follows the order in which callers reach the listener,
/// not the order of bucket changes. When `publish(x)` races an `unregister`
/// of the same interface, the listener may see `unregistered(x)` before
/// `registered(x)`, and by the time `registered(x)` runs `x` may already be
/// gone from the bucket.
///
/// Closures taking `&ServiceEvent<T>` are listeners too.
pub trait ServiceListener<T: ?Sized + 'static>: Send + Sync {
    fn registered(&self, service: &Arc<T>);

    fn unregistered(&self, service: &Arc<T>);
}

impl<T, F> ServiceListener<T> for F
where
    T: ?Sized + 'static,
    F: Fn(&ServiceEvent<T>) + Send + Sync,
{
    fn registered(&self, service: &Arc<T>) {
        self(&ServiceEvent::new(
            ServiceEventKind::Registered,
            InterfaceType::of::<T>(),
            Arc::clone(service),
        ));
    }

    fn unregistered(&self, service: &Arc<T>) {
        self(&ServiceEvent::new(
            ServiceEventKind::Unregistered,
            InterfaceType::of::<T>(),
            Arc::clone(service),
        ));
    }
}

/// Deliver `event` to `listener`
pub(crate) fn fire<T: ?Sized + 'static>(
    listener: &dyn ServiceListener<T>,
    event: &ServiceEvent<T>,
) {
    trace!(interface = %event.interface, kind = ?event.kind, "Delivering service event");
    match event.kind {
        ServiceEventKind::Registered => listener.registered(&event.service),
        ServiceEventKind::Unregistered => listener.unregistered(&event.service),
    }
}
