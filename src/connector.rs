//! Realm-aware service connector.
//!
//! A [`Connector`] combines the realm set, a service [`Registry`] and a
//! client. Scoping a connector to a realm, by name or from an inbound
//! request, yields a new connector whose client targets that realm; the
//! registry is shared. Services bound through the scoped connector receive
//! the scoped client.

use crate::options::Options;
use crate::realm::{RealmConfig, RealmsConfig};
use crate::registry::{Registry, Slot};
use crate::{error::BoxError, inbound::Inbound, Client, Error, Result};
use std::sync::Arc;

/// Binds service capabilities to realm-scoped clients.
///
/// # Examples
///
/// ```
/// use realm_client::{Client, Connector, RealmConfig, RealmsConfig};
/// use std::sync::Arc;
///
/// trait Accounts: Send + Sync {
///     fn host(&self) -> String;
/// }
///
/// struct HttpAccounts(Client);
///
/// impl Accounts for HttpAccounts {
///     fn host(&self) -> String {
///         self.0.options().host.clone()
///     }
/// }
///
/// # fn example() -> Result<(), realm_client::Error> {
/// let realms: RealmsConfig = [("acme_inc", RealmConfig {
///     host: "example.com".into(),
///     session: "42smurf99".into(),
///     ..Default::default()
/// })].into_iter().collect();
///
/// let connector = Connector::new(realms)?;
/// connector.register::<dyn Accounts, _>(|client| {
///     Ok(Arc::new(HttpAccounts(client.with_options(&realm_client::Options {
///         service_name: "accounts".into(),
///         ..Default::default()
///     }))) as Arc<dyn Accounts>)
/// });
///
/// let scoped = connector.with_realm("acme_inc")?;
/// let mut accounts: Option<Arc<dyn Accounts>> = None;
/// scoped.connect(&mut [&mut accounts])?;
/// assert_eq!(accounts.unwrap().host(), "example.com");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Connector {
    realms: Arc<RealmsConfig>,
    registry: Arc<Registry>,
    client: Client,
}

impl Connector {
    /// Creates a connector over `realms` with an unscoped client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the transport cannot be built.
    pub fn new(realms: RealmsConfig) -> Result<Self> {
        Self::with_base_options(realms, Options::default())
    }

    /// Creates a connector whose clients start from `options`.
    ///
    /// Host and session are normally left empty here; realm scoping fills them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the transport cannot be built.
    pub fn with_base_options(realms: RealmsConfig, options: Options) -> Result<Self> {
        Ok(Self {
            realms: Arc::new(realms),
            registry: Arc::new(Registry::new()),
            client: Client::unchecked(options)?,
        })
    }

    /// Registers `factory` as the provider of capability `T`.
    ///
    /// The registry is shared by every connector derived from this one.
    pub fn register<T, F>(&self, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Client) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.registry.register::<T, F>(factory);
    }

    /// The client handed to factories.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The configured realms.
    pub fn realms(&self) -> &RealmsConfig {
        &self.realms
    }

    /// The shared service registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns a connector whose client is rescoped with `overrides`.
    pub fn with_options(&self, overrides: &Options) -> Connector {
        self.rescoped(self.client.with_options(overrides))
    }

    /// Returns a connector scoped to the realm named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRealm`] if no realm has that name.
    pub fn with_realm(&self, name: &str) -> Result<Connector> {
        let config = self.realms.get(name).ok_or_else(|| Error::UnknownRealm {
            name: name.to_string(),
        })?;
        Ok(self.scoped_to(name, config, &Options::default()))
    }

    /// Returns a connector scoped to the realm serving an inbound request.
    ///
    /// The host is the last `X-Forwarded-Host` value, else the request's own
    /// host. The request's `Request-Id` is carried over.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHostConfig`] if no realm serves the host.
    pub fn with_request<B>(&self, req: &http::Request<B>) -> Result<Connector> {
        let inbound = Inbound::from_request(req);
        let host = inbound.host.unwrap_or_default();
        let (name, config) = self.realms.resolve_host(&host)?;
        let inherited = Options {
            request_id: inbound.request_id.unwrap_or_default(),
            ..Default::default()
        };
        Ok(self.scoped_to(name, config, &inherited))
    }

    /// Fills each slot with a service built from this connector's client.
    ///
    /// Slots are processed in order; the first failure stops processing and
    /// reports the slot's position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Service`] with the index of the slot that could not
    /// be bound.
    pub fn connect(&self, slots: &mut [&mut dyn Slot]) -> Result<()> {
        for (index, slot) in slots.iter_mut().enumerate() {
            slot.bind(&self.registry, &self.client).map_err(|source| {
                tracing::warn!(
                    index = index,
                    capability = slot.capability().name(),
                    error = %source,
                    "Could not bind service"
                );
                Error::Service { index, source }
            })?;
        }
        Ok(())
    }

    /// Builds the service for capability `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Service`] if nothing is registered or the factory fails.
    pub fn resolve<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.registry
            .resolve::<T>(&self.client)
            .map_err(|source| Error::Service { index: 0, source })
    }

    fn scoped_to(&self, name: &str, config: &RealmConfig, inherited: &Options) -> Connector {
        tracing::debug!(realm = name, host = %config.host, "Scoping connector to realm");
        let overrides = inherited.merge(&config.client_options());
        self.with_options(&overrides)
    }

    fn rescoped(&self, client: Client) -> Connector {
        Connector {
            realms: Arc::clone(&self.realms),
            registry: Arc::clone(&self.registry),
            client,
        }
    }
}
