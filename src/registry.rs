//! Service factory registry.
//!
//! A capability is an interface type, usually a trait object such as
//! `dyn ThingService`. Registering a capability stores a factory that builds
//! an `Arc<dyn ThingService>` from a realm-scoped [`Client`]. Resolution looks
//! the factory up by the destination's capability and runs it.
//!
//! Implementation details:
//! - Key = `TypeId` of the capability; the type name is kept for messages.
//! - Value = `Factory<T>` stored as `Box<dyn Any + Send + Sync>`, downcast on read.
//! - Re-registering a capability replaces the previous factory.

use crate::error::{BoxError, ServiceError};
use crate::Client;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable key for a capability type.
#[derive(Clone, Copy, Eq)]
pub struct Capability {
    id: TypeId,
    name: &'static str,
}

impl Capability {
    /// The capability key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Capability {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully-qualified type name of the capability.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::hash::Hash for Capability {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Builds a service from a scoped client.
pub type Factory<T: ?Sized> = Arc<dyn Fn(Client) -> Result<Arc<T>, BoxError> + Send + Sync>;

type Boxed = Box<dyn Any + Send + Sync>;

/// Registry of service factories keyed by capability.
///
/// Registration is expected to finish during setup, but the map is guarded by
/// a lock so late registrations are safe.
pub struct Registry {
    factories: RwLock<HashMap<Capability, Boxed>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `factory` as the provider of capability `T`.
    ///
    /// A later registration for the same capability replaces this one.
    ///
    /// # Examples
    ///
    /// ```
    /// use realm_client::{Client, Registry};
    /// use std::sync::Arc;
    ///
    /// trait Things: Send + Sync {}
    /// struct HttpThings(Client);
    /// impl Things for HttpThings {}
    ///
    /// let registry = Registry::new();
    /// registry.register::<dyn Things, _>(|client| Ok(Arc::new(HttpThings(client)) as Arc<dyn Things>));
    /// assert!(registry.contains::<dyn Things>());
    /// ```
    pub fn register<T, F>(&self, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Client) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let capability = Capability::of::<T>();
        let factory: Factory<T> = Arc::new(factory);
        tracing::debug!(capability = capability.name(), "Registering service factory");
        self.factories.write().insert(capability, Box::new(factory));
    }

    /// Returns `true` if capability `T` has a factory.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.factories.read().contains_key(&Capability::of::<T>())
    }

    /// Returns the factory registered for capability `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotRegistered`] if nothing is registered.
    pub fn factory<T>(&self) -> Result<Factory<T>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let capability = Capability::of::<T>();
        let factories = self.factories.read();
        let boxed = factories
            .get(&capability)
            .ok_or(ServiceError::NotRegistered {
                capability: capability.name(),
            })?;

        boxed
            .downcast_ref::<Factory<T>>()
            .cloned()
            .ok_or(ServiceError::TypeMismatch {
                capability: capability.name(),
            })
    }

    /// Builds the service for capability `T` with `client`.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is registered or the factory fails.
    pub fn resolve<T>(&self, client: &Client) -> Result<Arc<T>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        // The lock is released before the factory runs, so factories may
        // consult the registry themselves.
        let factory = self.factory::<T>()?;
        factory(client.clone()).map_err(|source| ServiceError::Factory {
            capability: Capability::of::<T>().name(),
            source,
        })
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.factories.read().keys())
            .finish()
    }
}

/// A destination that can be filled from the registry.
///
/// Implemented for `Option<Arc<T>>`, where `T` is the capability.
pub trait Slot {
    /// The capability this slot requires.
    fn capability(&self) -> Capability;

    /// Resolves the capability with `client` and stores the service.
    fn bind(&mut self, registry: &Registry, client: &Client) -> Result<(), ServiceError>;
}

impl<T> Slot for Option<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn capability(&self) -> Capability {
        Capability::of::<T>()
    }

    fn bind(&mut self, registry: &Registry, client: &Client) -> Result<(), ServiceError> {
        *self = Some(registry.resolve::<T>(client)?);
        Ok(())
    }
}
