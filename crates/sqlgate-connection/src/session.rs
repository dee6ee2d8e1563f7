//! Session: a connection registry plus the connection calls are dispatched to

use parking_lot::RwLock;
use sqlgate_core::{ConnectionConfig, Error, Result, ResultDriver, RowData, Value};
use std::sync::{Arc, Weak};

use crate::{Connection, ConnectionOps, ConnectionRegistry};

/// Name used when a connection is opened without one
pub const DEFAULT_CONNECTION: &str = "0";

/// Explicit context holding a registry and an active connection.
///
/// Operations from [`ConnectionOps`] go to the active connection. Several
/// sessions may share one registry and still point at different connections.
///
/// The active slot does not own the connection: once the registry drops it
/// and no caller holds it, the session reports [`Error::NotConnected`].
pub struct Session {
    registry: Arc<ConnectionRegistry>,
    active: RwLock<Option<Weak<Connection>>>,
}

impl Session {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            active: RwLock::new(None),
        }
    }

    /// Session over a fresh registry with the built-in drivers
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(ConnectionRegistry::new()))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Open a connection, register it under `name` (default `"0"`) and make it active
    pub fn connect(&self, config: ConnectionConfig, name: Option<&str>) -> Result<Arc<Connection>> {
        let connection = self
            .registry
            .connect(config, name.unwrap_or(DEFAULT_CONNECTION))?;
        *self.active.write() = Some(Arc::downgrade(&connection));
        Ok(connection)
    }

    /// Whether there is an active connection with a live link
    pub fn is_connected(&self) -> bool {
        self.get_connection(None)
            .is_ok_and(|connection| connection.is_connected())
    }

    /// The named connection, or the active one when no name is given
    pub fn get_connection(&self, name: Option<&str>) -> Result<Arc<Connection>> {
        match name {
            Some(name) => self.registry.get(name),
            None => self
                .active
                .read()
                .as_ref()
                .and_then(Weak::upgrade)
                .ok_or(Error::NotConnected),
        }
    }

    /// Make `connection` active. The registry is not touched.
    pub fn set_connection(&self, connection: Arc<Connection>) -> Arc<Connection> {
        *self.active.write() = Some(Arc::downgrade(&connection));
        connection
    }

    /// Make the named registered connection active
    #[deprecated(note = "use `set_connection(get_connection(Some(name))?)`")]
    pub fn activate(&self, name: &str) -> Result<Arc<Connection>> {
        tracing::warn!(connection = %name, "Session::activate is deprecated, use set_connection");
        let connection = self.registry.get(name)?;
        Ok(self.set_connection(connection))
    }

    fn current(&self) -> Result<Arc<Connection>> {
        self.get_connection(None)
    }
}

impl ConnectionOps for Session {
    fn disconnect(&self) -> Result<()> {
        self.current()?.disconnect()
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Option<Box<dyn ResultDriver>>> {
        self.current()?.query(sql, params)
    }

    fn native_query(&self, sql: &str) -> Result<Option<Box<dyn ResultDriver>>> {
        self.current()?.native_query(sql)
    }

    fn fetch(&self, sql: &str, params: &[Value]) -> Result<Option<RowData>> {
        self.current()?.fetch(sql, params)
    }

    fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<RowData>> {
        self.current()?.fetch_all(sql, params)
    }

    fn fetch_single(&self, sql: &str, params: &[Value]) -> Result<Option<Value>> {
        self.current()?.fetch_single(sql, params)
    }

    fn affected_rows(&self) -> Result<u64> {
        self.current()?.affected_rows()
    }

    fn insert_id(&self, sequence: Option<&str>) -> Result<u64> {
        self.current()?.insert_id(sequence)
    }

    fn begin(&self, savepoint: Option<&str>) -> Result<()> {
        self.current()?.begin(savepoint)
    }

    fn commit(&self, savepoint: Option<&str>) -> Result<()> {
        self.current()?.commit(savepoint)
    }

    fn rollback(&self, savepoint: Option<&str>) -> Result<()> {
        self.current()?.rollback(savepoint)
    }
}
