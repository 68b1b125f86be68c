//! Typed service registry.
//!
//! Modules publish implementations of shared interfaces and discover them by
//! interface type, without compile-time references to each other.
//!
//! Implementation details:
//! - Key = `TypeId` of the interface type; `T = dyn Trait` is the usual key.
//! - Value = ordered bucket of `Arc<T>` stored as `Box<dyn Any + Send + Sync>`
//!   (downcast on read), plus at most one listener.
//! - A second index maps `type_name::<T>()` to the interface type so that a
//!   module can discover an interface known only by name.
//! - One `RwLock` guards both maps: a `get`/`get_all` that starts after a
//!   `publish`/`unregister` returned observes its effect.
//!
//! Notes:
//! - Listener callbacks run after the lock is released; two racing publishers
//!   may therefore notify in a different order than they inserted, and a
//!   racing `unregister` may be delivered before the `publish` it removed.
//! - The name index is never pruned: `is_published` answers whether the name
//!   was ever published, not whether instances are currently present.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::services::events::{fire, ServiceEvent, ServiceEventKind, ServiceListener};
use crate::services::registration::{ListenableService, Registration};

/// Interface type handle: fully-qualified name plus `TypeId`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceType {
    name: &'static str,
    id: TypeId,
}

impl InterfaceType {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        InterfaceType {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Fully-qualified name, as produced by `std::any::type_name`
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Whether this handle denotes interface type `T`
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Debug for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("no instance published for {interface}")]
    NotPublished { interface: InterfaceType },

    #[error("{count} instances published for {interface}, expected exactly one")]
    MoreThanOneInstance {
        interface: InterfaceType,
        count: usize,
    },
}

type Boxed = Box<dyn Any + Send + Sync>;

/// Active listener: `Arc<dyn ServiceListener<T>>` behind `Any`
struct ListenerSlot {
    id: u64,
    listener: Boxed,
}

/// Instances and listener for one interface type
struct Bucket {
    services: Vec<Boxed>,
    listener: Option<ListenerSlot>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            services: Vec::new(),
            listener: None,
        }
    }

    fn listener<T: ?Sized + 'static>(&self) -> Option<Arc<dyn ServiceListener<T>>> {
        self.listener
            .as_ref()
            .and_then(|slot| slot.listener.downcast_ref::<Arc<dyn ServiceListener<T>>>())
            .cloned()
    }

    fn instances<T: ?Sized + Send + Sync + 'static>(&self) -> impl Iterator<Item = Arc<T>> + '_ {
        self.services
            .iter()
            .filter_map(|boxed| boxed.downcast_ref::<Arc<T>>().cloned())
    }
}

#[derive(Default)]
struct ServiceMaps {
    buckets: HashMap<TypeId, Bucket>,
    names: HashMap<&'static str, InterfaceType>,
    next_listener_id: u64,
}

/// Process-wide service registry
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Clone, Default)]
pub struct Services {
    inner: Arc<RwLock<ServiceMaps>>,
}

impl Services {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `service` under interface type `T`
    ///
    /// Appends to the bucket (duplicates allowed) and, if a listener is
    /// registered for `T`, calls its `registered` callback before returning.
    pub fn publish<T>(&self, service: Arc<T>) -> Registration<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let interface = InterfaceType::of::<T>();
        let (listener, count) = {
            let mut w = self.inner.write();
            w.names.insert(interface.name, interface);
            let bucket = w.buckets.entry(interface.id).or_insert_with(Bucket::new);
            bucket.services.push(Box::new(Arc::clone(&service)));
            (bucket.listener::<T>(), bucket.services.len())
        };
        debug!(%interface, count, "Published service");

        if let Some(listener) = listener {
            fire(
                listener.as_ref(),
                &ServiceEvent::new(ServiceEventKind::Registered, interface, service),
            );
        }
        Registration::new(self.clone(), interface)
    }

    /// The sole instance published under `T`
    pub fn get<T>(&self) -> Result<Arc<T>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let interface = InterfaceType::of::<T>();
        let r = self.inner.read();
        let Some(bucket) = r.buckets.get(&interface.id) else {
            return Err(ServiceError::NotPublished { interface });
        };

        match bucket.services.len() {
            0 => Err(ServiceError::NotPublished { interface }),
            1 => bucket
                .instances::<T>()
                .next()
                .ok_or(ServiceError::NotPublished { interface }),
            count => Err(ServiceError::MoreThanOneInstance { interface, count }),
        }
    }

    /// Every instance published under `T`, in registration order
    pub fn get_all<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let r = self.inner.read();
        r.buckets
            .get(&TypeId::of::<T>())
            .map(|bucket| bucket.instances::<T>().collect())
            .unwrap_or_default()
    }

    /// Number of instances currently published under `T`
    pub fn count<T: ?Sized + 'static>(&self) -> usize {
        self.inner
            .read()
            .buckets
            .get(&TypeId::of::<T>())
            .map_or(0, |b| b.services.len())
    }

    /// Start a listener registration for `T`; complete it with `.with(..)`
    pub fn listen_to<T>(&self) -> ListenableService<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        ListenableService::new(self)
    }

    /// Unpublish every instance under `T`
    ///
    /// The bucket is emptied atomically, then the listener (if any) gets one
    /// `unregistered` call per removed instance, in bucket order. The
    /// listener itself stays registered. Returns the removed instances.
    pub fn unregister<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let interface = InterfaceType::of::<T>();
        let (removed, listener) = {
            let mut w = self.inner.write();
            let Some(bucket) = w.buckets.get_mut(&interface.id) else {
                return Vec::new();
            };
            let removed: Vec<Arc<T>> = bucket
                .services
                .drain(..)
                .filter_map(|boxed| boxed.downcast::<Arc<T>>().ok().map(|b| *b))
                .collect();
            let listener = bucket.listener::<T>();
            if listener.is_none() {
                w.buckets.remove(&interface.id);
            }
            (removed, listener)
        };
        debug!(%interface, count = removed.len(), "Unregistered services");

        if let Some(listener) = listener {
            for service in &removed {
                fire(
                    listener.as_ref(),
                    &ServiceEvent::new(
                        ServiceEventKind::Unregistered,
                        interface,
                        Arc::clone(service),
                    ),
                );
            }
        }
        removed
    }

    /// Interface type previously published under `name`
    pub fn get_class(&self, name: &str) -> Option<InterfaceType> {
        self.inner.read().names.get(name).copied()
    }

    /// Whether any publish ever referenced the interface named `name`
    pub fn is_published(&self, name: &str) -> bool {
        self.inner.read().names.contains_key(name)
    }

    /// Number of instances currently published under the interface `name`
    pub fn count_by_name(&self, name: &str) -> usize {
        let r = self.inner.read();
        r.names
            .get(name)
            .and_then(|interface| r.buckets.get(&interface.id))
            .map_or(0, |b| b.services.len())
    }

    /// Every interface type ever published, sorted by name
    pub fn interfaces(&self) -> Vec<InterfaceType> {
        let mut all: Vec<InterfaceType> = self.inner.read().names.values().copied().collect();
        all.sort_by_key(|i| i.name);
        all
    }

    /// Install `listener` as the listener for `T`, replacing any previous one
    pub(crate) fn set_listener<T>(&self, listener: Arc<dyn ServiceListener<T>>) -> u64
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let interface = InterfaceType::of::<T>();
        let mut w = self.inner.write();
        w.next_listener_id += 1;
        let id = w.next_listener_id;
        let bucket = w.buckets.entry(interface.id).or_insert_with(Bucket::new);
        let replaced = bucket
            .listener
            .replace(ListenerSlot {
                id,
                listener: Box::new(listener),
            })
            .is_some();
        debug!(%interface, replaced, "Listener added");
        id
    }

    /// Remove listener `listener_id` if it is still the active one
    pub(crate) fn remove_listener(&self, interface: InterfaceType, listener_id: u64) -> bool {
        let mut w = self.inner.write();
        let Some(bucket) = w.buckets.get_mut(&interface.id) else {
            return false;
        };
        if bucket.listener.as_ref().map(|slot| slot.id) != Some(listener_id) {
            return false;
        }
        bucket.listener = None;
        if bucket.services.is_empty() {
            w.buckets.remove(&interface.id);
        }
        debug!(%interface, "Listener removed");
        true
    }

    /// Whether listener `listener_id` is the active one for `interface`
    pub(crate) fn has_listener(&self, interface: InterfaceType, listener_id: u64) -> bool {
        self.inner
            .read()
            .buckets
            .get(&interface.id)
            .and_then(|b| b.listener.as_ref())
            .is_some_and(|slot| slot.id == listener_id)
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.inner.read();
        let mut map = f.debug_map();
        for interface in r.names.values() {
            let count = r.buckets.get(&interface.id).map_or(0, |b| b.services.len());
            map.entry(interface, &count);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Hello(&'static str);

    impl Greeter for Hello {
        fn greet(&self) -> String {
            format!("hello {}", self.0)
        }
    }

    trait Other: Send + Sync {}

    struct Unit;

    impl Other for Unit {}

    #[test]
    fn test_publish_then_get() {
        let services = Services::new();
        let a: Arc<dyn Greeter> = Arc::new(Hello("a"));
        services.publish::<dyn Greeter>(Arc::clone(&a));

        let got = services.get::<dyn Greeter>().unwrap();
        assert_eq!(got.greet(), "hello a");
        assert!(Arc::ptr_eq(&a, &got));
    }

    #[test]
    fn test_get_requires_exactly_one() {
        let services = Services::new();
        assert!(matches!(
            services.get::<dyn Greeter>(),
            Err(ServiceError::NotPublished { .. })
        ));

        services.publish::<dyn Greeter>(Arc::new(Hello("a")));
        services.publish::<dyn Greeter>(Arc::new(Hello("b")));
        match services.get::<dyn Greeter>() {
            Err(ServiceError::MoreThanOneInstance { count, interface }) => {
                assert_eq!(count, 2);
                assert!(interface.is::<dyn Greeter>());
            }
            other => panic!("expected MoreThanOneInstance, got {:?}", other.err()),
        }

        let names: Vec<_> = services
            .get_all::<dyn Greeter>()
            .iter()
            .map(|g| g.greet())
            .collect();
        assert_eq!(names, ["hello a", "hello b"]);
    }

    #[test]
    fn test_same_instance_counted_twice() {
        let services = Services::new();
        let a: Arc<dyn Greeter> = Arc::new(Hello("a"));
        services.publish::<dyn Greeter>(Arc::clone(&a));
        services.publish::<dyn Greeter>(Arc::clone(&a));
        assert_eq!(services.count::<dyn Greeter>(), 2);
    }

    #[test]
    fn test_interfaces_are_independent() {
        let services = Services::new();
        services.publish::<dyn Greeter>(Arc::new(Hello("a")));
        services.publish::<dyn Other>(Arc::new(Unit));
        services.publish::<dyn Other>(Arc::new(Unit));

        assert!(services.get::<dyn Greeter>().is_ok());
        assert_eq!(services.get_all::<dyn Other>().len(), 2);

        services.unregister::<dyn Other>();
        assert!(services.get::<dyn Greeter>().is_ok());
        assert!(services.get_all::<dyn Other>().is_empty());
    }

    #[test]
    fn test_unregister_without_bucket_is_noop() {
        let services = Services::new();
        assert!(services.unregister::<dyn Greeter>().is_empty());
        assert!(!services.is_published(std::any::type_name::<dyn Greeter>()));
    }

    #[test]
    fn test_name_index_survives_unregister() {
        let services = Services::new();
        let name = std::any::type_name::<dyn Greeter>();
        assert_eq!(services.get_class(name), None);

        services.publish::<dyn Greeter>(Arc::new(Hello("a")));
        let interface = services.get_class(name).unwrap();
        assert!(interface.is::<dyn Greeter>());
        assert_eq!(services.count_by_name(name), 1);

        services.unregister::<dyn Greeter>();
        assert!(services.is_published(name));
        assert_eq!(services.count_by_name(name), 0);
    }

    #[test]
    fn test_concrete_types_are_keys_too() {
        let services = Services::new();
        services.publish(Arc::new(42u32));
        assert_eq!(*services.get::<u32>().unwrap(), 42);
        assert!(services.get::<u64>().is_err());
        assert!(services.is_published("u32"));
    }

    #[test]
    fn test_listener_can_reenter_registry() {
        let services = Services::new();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let handle = services.clone();
        let sink = Arc::clone(&observed);
        services
            .listen_to::<dyn Greeter>()
            .with(Arc::new(move |_: &ServiceEvent<dyn Greeter>| {
                sink.lock().push(handle.count::<dyn Greeter>());
            }));

        services.publish::<dyn Greeter>(Arc::new(Hello("a")));
        services.publish::<dyn Greeter>(Arc::new(Hello("b")));
        services.unregister::<dyn Greeter>();

        assert_eq!(*observed.lock(), [1, 2, 0, 0]);
    }

    #[test]
    fn test_interfaces_listing_sorted() {
        let services = Services::new();
        services.publish(Arc::new(1u8));
        services.publish::<dyn Other>(Arc::new(Unit));
        let names: Vec<_> = services.interfaces().iter().map(|i| i.name()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_concurrent_publish_and_read() {
        let services = Services::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let services = services.clone();
                std::thread::spawn(move || {
                    services.publish(Arc::new(i as u64));
                    services.get_all::<u64>().len()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap() >= 1);
        }
        assert_eq!(services.count::<u64>(), 8);
    }
}
