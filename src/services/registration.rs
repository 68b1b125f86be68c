//! Handles returned by publish and listener registration

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::services::events::ServiceListener;
use crate::services::registry::{InterfaceType, Services};

/// Handle for a publish under interface type `T`
///
/// Dropping the handle does not unpublish anything.
pub struct Registration<T: ?Sized> {
    services: Services,
    interface: InterfaceType,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Registration<T> {
    pub(crate) fn new(services: Services, interface: InterfaceType) -> Self {
        Self {
            services,
            interface,
            _marker: PhantomData,
        }
    }

    pub fn interface(&self) -> InterfaceType {
        self.interface
    }

    /// Unpublish every instance under `T`, not just the one this handle was
    /// returned for
    pub fn unregister(self) -> Vec<Arc<T>> {
        self.services.unregister::<T>()
    }
}

impl<T: ?Sized> fmt::Debug for Registration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("interface", &self.interface)
            .finish()
    }
}

/// Pending listener registration for `T`
///
/// Returned by [`Services::listen_to`]; nothing is registered until
/// [`with`](Self::with) is called.
#[must_use = "no listener is registered until `.with(..)` is called"]
pub struct ListenableService<'a, T: ?Sized> {
    services: &'a Services,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> ListenableService<'a, T> {
    pub(crate) fn new(services: &'a Services) -> Self {
        Self {
            services,
            _marker: PhantomData,
        }
    }

    /// Register `listener` for `T`, replacing any listener already present
    pub fn with<L>(self, listener: Arc<L>) -> ListenerRegistration<T>
    where
        L: ServiceListener<T> + 'static,
    {
        let listener: Arc<dyn ServiceListener<T>> = listener;
        let id = self.services.set_listener::<T>(listener);
        ListenerRegistration {
            services: self.services.clone(),
            interface: InterfaceType::of::<T>(),
            listener_id: id,
            _marker: PhantomData,
        }
    }
}

/// Handle for an installed listener
pub struct ListenerRegistration<T: ?Sized> {
    services: Services,
    interface: InterfaceType,
    listener_id: u64,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> ListenerRegistration<T> {
    pub fn interface(&self) -> InterfaceType {
        self.interface
    }

    /// Whether this listener is still the one installed for `T`
    pub fn is_active(&self) -> bool {
        self.services.has_listener(self.interface, self.listener_id)
    }

    /// Remove the listener
    ///
    /// Returns `false` if it had already been replaced by a later
    /// registration; the replacement is left in place.
    pub fn unregister(self) -> bool {
        self.services.remove_listener(self.interface, self.listener_id)
    }
}

impl<T: ?Sized> fmt::Debug for ListenerRegistration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("interface", &self.interface)
            .field("listener_id", &self.listener_id)
            .finish()
    }
}
