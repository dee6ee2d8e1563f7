//! Named registry of live connections

use parking_lot::RwLock;
use sqlgate_core::{ConnectionConfig, Error, Result};
use sqlgate_drivers::DriverRegistry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{Connection, ConnectionOps};

/// Maps connection names to live connections
pub struct ConnectionRegistry {
    drivers: DriverRegistry,
    connections: RwLock<HashMap<String, Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// Create a registry that resolves drivers from the built-in set
    pub fn new() -> Self {
        Self::with_drivers(DriverRegistry::with_defaults())
    }

    pub fn with_drivers(drivers: DriverRegistry) -> Self {
        Self {
            drivers,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Get the driver registry
    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Open a connection with the driver named by `config.driver` and store it
    /// under `name`, replacing any previous entry with that name.
    #[tracing::instrument(skip(self, config), fields(driver = %config.driver))]
    pub fn connect(&self, config: ConnectionConfig, name: &str) -> Result<Arc<Connection>> {
        let driver = self.drivers.create(&config.driver)?;
        let connection = Arc::new(Connection::open(name, config, driver)?);
        let previous = self
            .connections
            .write()
            .insert(name.to_string(), connection.clone());
        if previous.is_some() {
            tracing::debug!(connection = %name, "replaced registered connection");
        }
        Ok(connection)
    }

    /// Get a connection by name
    pub fn get(&self, name: &str) -> Result<Arc<Connection>> {
        self.connections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NoSuchConnection(name.to_string()))
    }

    /// Remove a connection from the registry and close it
    #[tracing::instrument(skip(self))]
    pub fn disconnect(&self, name: &str) -> Result<()> {
        let connection = self
            .connections
            .write()
            .remove(name)
            .ok_or_else(|| Error::NoSuchConnection(name.to_string()))?;
        connection.disconnect()
    }

    /// Registered connection names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
