//! Process-wide driver registry and client factory.
//!
//! Drivers are registered once during start-up (see
//! [`register_builtin_drivers`](crate::register_builtin_drivers)); the
//! list is append-only and its order is the order of preference.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::{debug, info};
use once_cell::sync::Lazy;

use super::{Client, Credentials};
use crate::config::{Environment, Environments};
use crate::error::{Error, ErrorKind, Result};

/// Global driver registry.
static REGISTRY: Lazy<ClientRegistry> = Lazy::new(ClientRegistry::new);

/// A driver type: validates arguments and opens connected clients.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Driver name used in logs and aggregated error messages.
    fn name(&self) -> &'static str;

    /// Pre-screen arguments without touching the network.
    fn validate_args(&self, credentials: &Credentials) -> Result<()> {
        credentials.validate()
    }

    /// Construct, validate and liveness-probe a client.
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Client>>;

    /// [`connect`](Self::connect) for a named profile.
    ///
    /// Drivers with profile-level settings override this; the default uses
    /// only the profile's credentials.
    async fn connect_with_environment(&self, environment: &Environment) -> Result<Box<dyn Client>> {
        self.connect(&environment.credentials()).await
    }
}

/// Ordered list of driver types.
#[derive(Default)]
pub struct ClientRegistry {
    drivers: RwLock<Vec<Arc<dyn DriverFactory>>>,
}

impl ClientRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the global registry.
    pub fn global() -> &'static ClientRegistry {
        &REGISTRY
    }

    /// Append a driver type. Earlier registrations are preferred.
    pub fn register(&self, driver: Arc<dyn DriverFactory>) {
        debug!("registering client driver '{}'", driver.name());
        // A poisoned lock still holds a consistent Vec.
        let mut drivers = self.drivers.write().unwrap_or_else(|e| e.into_inner());
        drivers.push(driver);
    }

    /// Names of the registered drivers, in preference order.
    pub fn names(&self) -> Vec<&'static str> {
        self.snapshot().iter().map(|d| d.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn DriverFactory>> {
        self.drivers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Connect through the first registered driver that works.
    ///
    /// Construction failures are collected and, if every driver fails,
    /// reduced to a single error: connection-level errors win over
    /// invalid arguments, which win over type errors.
    pub async fn create(&self, credentials: &Credentials) -> Result<Box<dyn Client>> {
        self.create_with(credentials, None).await
    }

    /// [`create`](Self::create) for a named profile.
    ///
    /// Each driver receives the whole profile, so settings beyond the
    /// credentials (such as the NX-API cookie) reach the connection.
    pub async fn create_from_environment(
        &self,
        environments: &Environments,
        name: Option<&str>,
    ) -> Result<Box<dyn Client>> {
        let environment = environments.get(name)?;
        self.create_with(&environment.credentials(), Some(environment))
            .await
    }

    async fn create_with(
        &self,
        credentials: &Credentials,
        environment: Option<&Environment>,
    ) -> Result<Box<dyn Client>> {
        let drivers = self.snapshot();
        if drivers.is_empty() {
            return Err(Error::Config("no client drivers are registered".into()));
        }

        let mut failures = Vec::with_capacity(drivers.len());
        for driver in drivers {
            let attempt = match (driver.validate_args(credentials), environment) {
                (Ok(()), Some(environment)) => driver.connect_with_environment(environment).await,
                (Ok(()), None) => driver.connect(credentials).await,
                (Err(e), _) => Err(e),
            };
            match attempt {
                Ok(client) => {
                    info!("connected using the '{}' driver", driver.name());
                    return Ok(client);
                }
                Err(e) if collectable(&e) => {
                    debug!("driver '{}' failed: {}", driver.name(), e);
                    failures.push((driver.name(), e));
                }
                Err(e) => return Err(e),
            }
        }

        Err(aggregate(failures))
    }
}

fn collectable(error: &Error) -> bool {
    error.is_client_error()
        || matches!(error.kind(), ErrorKind::InvalidArgument | ErrorKind::TypeError)
}

fn joined(failures: &[(&'static str, Error)]) -> String {
    failures
        .iter()
        .map(|(name, e)| format!("{}: {}", name, e.message()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce construction failures to the single most informative error.
fn aggregate(failures: Vec<(&'static str, Error)>) -> Error {
    let (mut client, rest): (Vec<_>, Vec<_>) =
        failures.into_iter().partition(|(_, e)| e.is_client_error());

    if client.len() == 1 {
        if let Some((_, e)) = client.pop() {
            return e;
        }
    }
    if !client.is_empty() {
        let message = joined(&client);
        let kind = client[0].1.kind();
        if client.iter().all(|(_, e)| e.kind() == kind) {
            let (_, first) = client.swap_remove(0);
            return first.with_message(message);
        }
        return Error::Client(message);
    }

    let (invalid, rest): (Vec<_>, Vec<_>) = rest
        .into_iter()
        .partition(|(_, e)| e.kind() == ErrorKind::InvalidArgument);
    if !invalid.is_empty() {
        return Error::InvalidArgument(joined(&invalid));
    }
    if !rest.is_empty() {
        return Error::TypeError(joined(&rest));
    }

    Error::Client("every driver failed without reporting an error".into())
}
