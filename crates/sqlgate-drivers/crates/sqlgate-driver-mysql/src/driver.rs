//! MySQL driver implementation

use chrono::Local;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use sqlgate_core::{
    ConnectionConfig, Driver, DriverException, DriverFactory, DriverOptions, Error, Result,
    ResultDriver, TemporalValue,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::connection::AsyncMySqlConnector;
use crate::errors::{NativeError, create_exception};
use crate::escape;
use crate::link::{ConnectParams, NativeConnector, NativeLink, ResultMode};
use crate::result::{LinkSlot, MySqlResult};

const DEFAULT_CHARSET: &str = "utf8";

static INFO_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(.+?): +(\d+) *").ok());

/// Client-library level defaults used when a configuration leaves a field out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineDefaults {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EngineDefaults {
    /// Read the defaults the MySQL client tools honour
    /// (`MYSQL_HOST`, `MYSQL_TCP_PORT`, `MYSQL_UNIX_PORT`, `MYSQL_USER`, `MYSQL_PWD`)
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            host: var("MYSQL_HOST"),
            port: var("MYSQL_TCP_PORT").and_then(|p| p.parse().ok()),
            socket: var("MYSQL_UNIX_PORT"),
            username: var("MYSQL_USER"),
            password: var("MYSQL_PWD"),
        }
    }
}

/// MySQL database driver
///
/// Holds at most one native link. Result cursors it returns reference the
/// link weakly, so dropping the driver closes the connection even while
/// cursors are still around.
pub struct MySqlDriver {
    connector: Arc<dyn NativeConnector>,
    defaults: EngineDefaults,
    link: LinkSlot,
    buffered: AtomicBool,
}

impl MySqlDriver {
    /// Create a driver that connects through `mysql_async`
    pub fn new() -> Self {
        Self::with_connector(Arc::new(AsyncMySqlConnector::new()))
            .with_defaults(EngineDefaults::from_env())
    }

    /// Create a driver that opens links through `connector`
    pub fn with_connector(connector: Arc<dyn NativeConnector>) -> Self {
        tracing::debug!("MySQL driver initialized");
        Self {
            connector,
            defaults: EngineDefaults::default(),
            link: Arc::new(Mutex::new(None)),
            buffered: AtomicBool::new(true),
        }
    }

    pub fn with_defaults(mut self, defaults: EngineDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Server thread id of the live link
    pub fn resource(&self) -> Option<u32> {
        self.link.lock().as_ref().map(|link| link.thread_id())
    }

    fn apply_defaults(&self, config: &mut ConnectionConfig) {
        if config.charset.is_none() {
            config.charset = Some(DEFAULT_CHARSET.to_string());
        }
        if config.timezone.is_none() {
            config.timezone = Some(Local::now().format("%:z").to_string());
        }
        if config.username.is_none() {
            config.username = self.defaults.username.clone();
        }
        if config.password.is_none() {
            config.password = self.defaults.password.clone();
        }
        if config.socket.is_none() {
            config.socket = self.defaults.socket.clone();
        }
        if config.host.is_none() {
            config.host = self.defaults.host.clone();
            config.port = if config.host.is_some() {
                self.defaults.port
            } else {
                None
            };
        }
    }

    fn connect_params(config: &mut ConnectionConfig) -> ConnectParams {
        let options = match config.options.clone() {
            Some(DriverOptions::Scalar(flags)) => {
                tracing::warn!(
                    "configuration item 'options' must be a map; use 'flags' for client flag constants"
                );
                config.flags = Some(flags);
                Vec::new()
            }
            Some(DriverOptions::Map(map)) => map.into_iter().collect(),
            None => Vec::new(),
        };
        ConnectParams {
            host: config.host.clone(),
            port: config.port,
            socket: config.socket.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
            flags: config.flags.unwrap_or(0),
            options,
            persistent: config.persistent,
        }
    }

    fn open_link(&self, config: &mut ConnectionConfig) -> Result<Box<dyn NativeLink>> {
        if let Some(resource) = &config.resource {
            tracing::debug!("adopting existing MySQL link");
            return resource.take::<Box<dyn NativeLink>>().ok_or_else(|| {
                Error::Configuration("resource is not an unused MySQL link".to_string())
            });
        }

        self.apply_defaults(config);
        let params = Self::connect_params(config);
        self.connector.connect(&params).map_err(|err: NativeError| {
            tracing::error!(code = err.code, error = %err.message, "failed to connect to MySQL");
            Error::Driver(DriverException::generic(err.message, err.code))
        })
    }

    fn run(&self, sql: String) -> Result<()> {
        self.query(&sql).map(|_| ())
    }

    fn apply_session_settings(&self, config: &ConnectionConfig) -> Result<()> {
        if let Some(charset) = config.charset.as_deref().filter(|c| !c.is_empty()) {
            let switched = self
                .link
                .lock()
                .as_mut()
                .map(|link| link.set_charset(charset))
                .unwrap_or(false);
            if !switched {
                tracing::debug!(charset, "fast charset switch failed, falling back to SET NAMES");
                self.run(format!("SET NAMES '{}'", self.escape_raw(charset)))?;
            }
        }
        if let Some(sqlmode) = config.sqlmode.as_deref() {
            self.run(format!("SET sql_mode='{}'", self.escape_raw(sqlmode)))?;
        }
        if let Some(timezone) = config.timezone.as_deref().filter(|t| !t.is_empty()) {
            self.run(format!("SET time_zone='{}'", self.escape_raw(timezone)))?;
        }
        Ok(())
    }

    fn escape_raw(&self, value: &str) -> String {
        match self.link.lock().as_ref() {
            Some(link) => link.escape_string(value),
            None => escape::real_escape_string(value),
        }
    }
}

impl Default for MySqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    #[tracing::instrument(skip(self, config), fields(host = config.host.as_deref(), database = config.database.as_deref()))]
    fn connect(&self, config: &mut ConnectionConfig) -> Result<()> {
        self.disconnect();

        let link = self.open_link(config)?;
        let thread_id = link.thread_id();
        *self.link.lock() = Some(link);
        self.buffered.store(!config.unbuffered, Ordering::SeqCst);

        self.apply_session_settings(config)?;

        tracing::info!(thread_id, buffered = !config.unbuffered, "MySQL connection established");
        Ok(())
    }

    fn disconnect(&self) {
        let link = self.link.lock().take();
        if let Some(mut link) = link {
            let thread_id = link.thread_id();
            link.close();
            tracing::info!(thread_id, "MySQL connection closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.link.lock().is_some()
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn query(&self, sql: &str) -> Result<Option<Box<dyn ResultDriver>>> {
        let buffered = self.buffered.load(Ordering::SeqCst);
        let mode = if buffered {
            ResultMode::Store
        } else {
            ResultMode::Use
        };

        let outcome = {
            let mut slot = self.link.lock();
            let link = slot.as_mut().ok_or(Error::NotConnected)?;
            link.query(sql, mode)
        };

        match outcome {
            Ok(Some(native)) => {
                tracing::debug!(buffered, "statement returned a result set");
                Ok(Some(Box::new(MySqlResult::new(native, &self.link, buffered))))
            }
            Ok(None) => {
                tracing::debug!("statement executed");
                Ok(None)
            }
            Err(err) => {
                tracing::debug!(code = err.code, error = %err.message, "statement failed");
                Err(create_exception(err.message, err.code, sql).into())
            }
        }
    }

    fn affected_rows(&self) -> Option<u64> {
        let rows = self.link.lock().as_ref().map(|link| link.affected_rows())?;
        u64::try_from(rows).ok()
    }

    fn insert_id(&self, _sequence: Option<&str>) -> Option<u64> {
        self.link.lock().as_ref().map(|link| link.insert_id())
    }

    fn info(&self) -> Result<IndexMap<String, u64>> {
        let info = {
            let slot = self.link.lock();
            slot.as_ref().ok_or(Error::NotConnected)?.info()
        };
        let mut counters = IndexMap::new();
        if let (Some(info), Some(pattern)) = (info, INFO_PATTERN.as_ref()) {
            for caps in pattern.captures_iter(&info) {
                if let Ok(value) = caps[2].parse::<u64>() {
                    counters.insert(caps[1].to_string(), value);
                }
            }
        }
        Ok(counters)
    }

    fn begin(&self, savepoint: Option<&str>) -> Result<()> {
        match savepoint {
            Some(name) => self.run(format!("SAVEPOINT {}", name)),
            None => self.run("START TRANSACTION".to_string()),
        }
    }

    fn commit(&self, savepoint: Option<&str>) -> Result<()> {
        match savepoint {
            Some(name) => self.run(format!("RELEASE SAVEPOINT {}", name)),
            None => self.run("COMMIT".to_string()),
        }
    }

    fn rollback(&self, savepoint: Option<&str>) -> Result<()> {
        match savepoint {
            Some(name) => self.run(format!("ROLLBACK TO SAVEPOINT {}", name)),
            None => self.run("ROLLBACK".to_string()),
        }
    }

    fn escape_text(&self, value: &str) -> String {
        format!("'{}'", self.escape_raw(value))
    }

    fn escape_binary(&self, value: &[u8]) -> String {
        escape::escape_binary(value)
    }

    fn escape_identifier(&self, value: &str) -> String {
        escape::escape_identifier(value)
    }

    fn escape_bool(&self, value: bool) -> String {
        String::from(if value { "1" } else { "0" })
    }

    fn escape_date(&self, value: TemporalValue) -> Result<String> {
        escape::escape_date(&value)
    }

    fn escape_datetime(&self, value: TemporalValue) -> Result<String> {
        escape::escape_datetime(&value)
    }

    fn escape_like(&self, value: &str, pos: i32) -> String {
        escape::escape_like(value, pos)
    }

    fn apply_limit(&self, sql: &mut String, limit: Option<i64>, offset: Option<i64>) -> Result<()> {
        escape::apply_limit(sql, limit, offset)
    }
}

/// Creates [`MySqlDriver`] instances
pub struct MySqlDriverFactory {
    connector: Option<Arc<dyn NativeConnector>>,
    defaults: Option<EngineDefaults>,
}

impl MySqlDriverFactory {
    pub fn new() -> Self {
        Self {
            connector: None,
            defaults: None,
        }
    }

    /// Factory whose drivers open links through `connector` with empty engine defaults
    pub fn with_connector(connector: Arc<dyn NativeConnector>) -> Self {
        Self {
            connector: Some(connector),
            defaults: Some(EngineDefaults::default()),
        }
    }

    pub fn with_defaults(mut self, defaults: EngineDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }
}

impl Default for MySqlDriverFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverFactory for MySqlDriverFactory {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn display_name(&self) -> &'static str {
        "MySQL"
    }

    fn default_port(&self) -> Option<u16> {
        Some(3306)
    }

    fn create(&self) -> Result<Box<dyn Driver>> {
        let connector = match &self.connector {
            Some(connector) => connector.clone(),
            None => Arc::new(AsyncMySqlConnector::new()),
        };
        let defaults = self.defaults.clone().unwrap_or_else(EngineDefaults::from_env);
        Ok(Box::new(
            MySqlDriver::with_connector(connector).with_defaults(defaults),
        ))
    }
}
