//! A named, connected driver

use sqlgate_core::{
    ConnectionConfig, Driver, DriverException, Result, ResultDriver, RowData, Value,
};

use crate::ConnectionOps;
use crate::bind::bind_params;

/// One live database connection: a driver plus the configuration it resolved
pub struct Connection {
    name: String,
    config: ConnectionConfig,
    driver: Box<dyn Driver>,
}

impl Connection {
    /// Connect `driver` with `config`.
    ///
    /// The stored configuration is the one the driver resolved, with engine
    /// defaults filled in.
    #[tracing::instrument(skip(config, driver), fields(driver = driver.name(), host = config.host.as_deref()))]
    pub fn open(name: &str, mut config: ConnectionConfig, driver: Box<dyn Driver>) -> Result<Self> {
        driver.connect(&mut config).map_err(|e| {
            tracing::error!(error = %e, "failed to connect");
            e
        })?;
        tracing::info!(connection = %name, "connection established");
        Ok(Self {
            name: name.to_string(),
            config,
            driver,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("driver", &self.driver.name())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ConnectionOps for Connection {
    fn disconnect(&self) -> Result<()> {
        tracing::info!(connection = %self.name, "disconnecting");
        self.driver.disconnect();
        Ok(())
    }

    #[tracing::instrument(skip(self, sql, params), fields(connection = %self.name, params = params.len()))]
    fn query(&self, sql: &str, params: &[Value]) -> Result<Option<Box<dyn ResultDriver>>> {
        let sql = bind_params(self.driver.as_ref(), sql, params)?;
        self.driver.query(&sql)
    }

    fn native_query(&self, sql: &str) -> Result<Option<Box<dyn ResultDriver>>> {
        self.driver.query(sql)
    }

    fn fetch(&self, sql: &str, params: &[Value]) -> Result<Option<RowData>> {
        match self.query(sql, params)? {
            Some(mut result) => result.fetch(true),
            None => Ok(None),
        }
    }

    fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<RowData>> {
        let mut rows = Vec::new();
        if let Some(mut result) = self.query(sql, params)? {
            while let Some(row) = result.fetch(true)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn fetch_single(&self, sql: &str, params: &[Value]) -> Result<Option<Value>> {
        let row = match self.query(sql, params)? {
            Some(mut result) => result.fetch(false)?,
            None => None,
        };
        Ok(row.and_then(|row| row.into_values().into_iter().next()))
    }

    fn affected_rows(&self) -> Result<u64> {
        self.driver.affected_rows().ok_or_else(|| {
            DriverException::generic("Cannot retrieve number of affected rows.", 0).into()
        })
    }

    fn insert_id(&self, sequence: Option<&str>) -> Result<u64> {
        self.driver
            .insert_id(sequence)
            .ok_or_else(|| DriverException::generic("Cannot retrieve last generated ID.", 0).into())
    }

    fn begin(&self, savepoint: Option<&str>) -> Result<()> {
        self.driver.begin(savepoint)
    }

    fn commit(&self, savepoint: Option<&str>) -> Result<()> {
        self.driver.commit(savepoint)
    }

    fn rollback(&self, savepoint: Option<&str>) -> Result<()> {
        self.driver.rollback(savepoint)
    }
}
