//! Connection configuration bag

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Name of the driver used when a configuration does not say otherwise
pub const DEFAULT_DRIVER: &str = "mysql";

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

/// Vendor option list passed through to the engine's option-setting call.
///
/// The scalar form is the legacy spelling of connect flags; drivers accept it
/// but remap it to [`ConnectionConfig::flags`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DriverOptions {
    Scalar(u32),
    Map(IndexMap<String, serde_json::Value>),
}

/// A pre-existing native connection handle the driver should adopt instead of connecting.
///
/// The payload is engine specific; each driver takes out the type it understands.
/// Clones share the same slot, so the handle is adopted at most once.
#[derive(Clone)]
pub struct ResourceHandle(Arc<Mutex<Option<Box<dyn Any + Send>>>>);

impl ResourceHandle {
    pub fn new<T: Any + Send>(native: T) -> Self {
        Self(Arc::new(Mutex::new(Some(Box::new(native)))))
    }

    /// Take the handle out if it holds a `T`. A handle of another type is left in place.
    pub fn take<T: Any + Send>(&self) -> Option<T> {
        let mut slot = self.0.lock();
        let boxed = slot.take()?;
        match boxed.downcast::<T>() {
            Ok(native) => Some(*native),
            Err(other) => {
                *slot = Some(other);
                None
            }
        }
    }

    pub fn is_taken(&self) -> bool {
        self.0.lock().is_none()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("taken", &self.is_taken())
            .finish()
    }
}

/// Connection configuration.
///
/// Drivers fill missing fields with engine defaults during `connect`; once the
/// connection is established the resolved configuration is only read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver ID (e.g., "mysql")
    #[serde(default = "default_driver")]
    pub driver: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Unix socket or named pipe
    pub socket: Option<String>,
    #[serde(alias = "user")]
    pub username: Option<String>,
    #[serde(alias = "pass")]
    pub password: Option<String>,
    pub database: Option<String>,
    /// Vendor specific option codes and values
    pub options: Option<DriverOptions>,
    /// Vendor connect flags bitmask
    pub flags: Option<u32>,
    /// Character set to apply after connecting. Empty string skips the step.
    pub charset: Option<String>,
    /// Try to reuse a persistent link
    #[serde(default)]
    pub persistent: bool,
    /// Stream results row by row instead of buffering them client side
    #[serde(default)]
    pub unbuffered: bool,
    pub sqlmode: Option<String>,
    /// Session time zone to apply after connecting. Empty string skips the step.
    pub timezone: Option<String>,
    #[serde(skip)]
    pub resource: Option<ResourceHandle>,
    /// Keys the core does not recognise, kept for downstream collaborators
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DRIVER)
    }
}

impl ConnectionConfig {
    /// Create an empty configuration for the given driver
    pub fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            host: None,
            port: None,
            socket: None,
            username: None,
            password: None,
            database: None,
            options: None,
            flags: None,
            charset: None,
            persistent: false,
            unbuffered: false,
            sqlmode: None,
            timezone: None,
            resource: None,
            extra: IndexMap::new(),
        }
    }

    /// Parse a configuration from a TOML document
    pub fn from_toml_str(document: &str) -> Result<Self> {
        toml::from_str(document)
            .map_err(|e| Error::Configuration(format!("Invalid connection configuration: {}", e)))
    }

    /// Build a configuration from a JSON value (object)
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::Configuration(format!("Invalid connection configuration: {}", e)))
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_socket(mut self, socket: &str) -> Self {
        self.socket = Some(socket.to_string());
        self
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.to_string());
        self
    }

    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.timezone = Some(timezone.to_string());
        self
    }

    pub fn with_sqlmode(mut self, sqlmode: &str) -> Self {
        self.sqlmode = Some(sqlmode.to_string());
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn unbuffered(mut self, unbuffered: bool) -> Self {
        self.unbuffered = unbuffered;
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Add one vendor option, switching a legacy scalar `options` to map form
    pub fn with_option(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        match &mut self.options {
            Some(DriverOptions::Map(map)) => {
                map.insert(key.to_string(), value.into());
            }
            _ => {
                let mut map = IndexMap::new();
                map.insert(key.to_string(), value.into());
                self.options = Some(DriverOptions::Map(map));
            }
        }
        self
    }

    pub fn with_resource(mut self, resource: ResourceHandle) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Set a pass-through parameter
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Get a pass-through parameter
    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }
}
