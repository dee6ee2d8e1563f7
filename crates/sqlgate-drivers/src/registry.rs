//! Driver registry for resolving driver names to factories

use sqlgate_core::{Driver, DriverFactory, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers
pub struct DriverRegistry {
    factories: HashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "mysql")]
        {
            let factory: Arc<dyn DriverFactory> = Arc::new(crate::mysql::MySqlDriverFactory::new());
            registry.register(factory.clone());
            registry.register_as("mysqli", factory.clone());
            registry.register_as("mariadb", factory);
        }

        registry
    }

    /// Register a factory under its own name
    pub fn register(&mut self, factory: Arc<dyn DriverFactory>) {
        let name = factory.name();
        self.register_as(name, factory);
    }

    /// Register a factory under an additional name
    pub fn register_as(&mut self, name: &str, factory: Arc<dyn DriverFactory>) {
        let name = name.to_ascii_lowercase();
        tracing::info!(driver = %name, "registering database driver");
        self.factories.insert(name, factory);
    }

    /// Get a factory by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<Arc<dyn DriverFactory>> {
        let factory = self.factories.get(&name.to_ascii_lowercase()).cloned();
        if factory.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        factory
    }

    /// Create an unconnected driver for `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn Driver>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownDriver(name.to_string()))?
            .create()
    }

    /// List all registered driver names
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
