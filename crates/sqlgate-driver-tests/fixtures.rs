//! Test fixtures for scenario tests.
//!
//! [`TestMode`] is the rstest case parameter: it selects whether the session's
//! connection buffers result sets or streams them. [`scripted_fixture`] builds
//! a [`Session`] whose driver talks to a [`ScriptedServer`] pre-loaded with a
//! small `actor` table, so the same assertions can run in both modes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sqlgate_driver_tests::fixtures::{TestMode, scripted_fixture};
//! use rstest::rstest;
//!
//! #[rstest]
//! #[case::buffered(TestMode::Buffered)]
//! #[case::streaming(TestMode::Streaming)]
//! fn test_select_actor(#[case] mode: TestMode) -> anyhow::Result<()> {
//!     let fixture = scripted_fixture(mode)?;
//!     let rows = fixture.session.fetch_all(ACTOR_SELECT, &[])?;
//!     assert_eq!(rows.len(), 3);
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use sqlgate_connection::{ConnectionRegistry, Session};
use sqlgate_core::{ConnectionConfig, Value};
use sqlgate_driver_mysql::testing::ScriptedServer;
use sqlgate_driver_mysql::{FieldInfo, MySqlDriverFactory};
use sqlgate_drivers::DriverRegistry;
use std::env;
use std::sync::{Arc, Once};

/// Statement the scripted engine answers with the sample actor rows
pub const ACTOR_SELECT: &str = "SELECT actor_id, first_name, last_name FROM actor ORDER BY actor_id";

/// MySQL type codes used by the sample table
const TYPE_LONG: u8 = 3;
const TYPE_VAR_STRING: u8 = 253;

/// Result mode a scenario runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestMode {
    /// Results are materialised client side
    Buffered,
    /// Results are read row by row from the link
    Streaming,
}

impl TestMode {
    pub fn name(&self) -> &'static str {
        match self {
            TestMode::Buffered => "buffered",
            TestMode::Streaming => "streaming",
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, TestMode::Buffered)
    }

    /// Connection configuration for this mode
    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new("mysql")
            .with_host("db")
            .with_database("sakila")
            .with_timezone("+00:00")
            .unbuffered(!self.is_buffered())
    }
}

/// A session wired to a scripted engine
pub struct Fixture {
    pub mode: TestMode,
    pub server: ScriptedServer,
    pub session: Session,
}

impl Fixture {
    /// Statements the engine received after connection setup
    pub fn statements(&self) -> Vec<String> {
        self.server
            .executed()
            .into_iter()
            .filter(|sql| !sql.starts_with("SET "))
            .collect()
    }
}

/// Install a tracing subscriber once per test binary.
///
/// The filter comes from `RUST_LOG`; output goes through the test writer so it
/// is captured per test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Driver registry whose MySQL factory opens links to `server`
pub fn scripted_drivers(server: &ScriptedServer) -> DriverRegistry {
    let mut drivers = DriverRegistry::new();
    drivers.register(Arc::new(MySqlDriverFactory::with_connector(server.connector())));
    drivers
}

/// Load the sample `actor` table into the scripted engine
pub fn seed_actors(server: &ScriptedServer) {
    let fields = vec![
        FieldInfo::new("actor_id", TYPE_LONG).with_table("actor"),
        FieldInfo::new("first_name", TYPE_VAR_STRING).with_table("actor"),
        FieldInfo::new("last_name", TYPE_VAR_STRING).with_table("actor"),
    ];
    let rows = [
        (1, "PENELOPE", "GUINESS"),
        (2, "NICK", "WAHLBERG"),
        (3, "ED", "CHASE"),
    ]
    .into_iter()
    .map(|(id, first, last)| vec![Value::Int64(id), Value::from(first), Value::from(last)])
    .collect();
    server.rows(ACTOR_SELECT, fields, rows);
    server.rows(
        "SELECT 1",
        vec![FieldInfo::new("1", TYPE_LONG)],
        vec![vec![Value::Int64(1)]],
    );
}

/// Build a connected session over a freshly seeded scripted engine
pub fn scripted_fixture(mode: TestMode) -> Result<Fixture> {
    init_tracing();
    let server = ScriptedServer::new();
    seed_actors(&server);

    let registry = ConnectionRegistry::with_drivers(scripted_drivers(&server));
    let session = Session::new(Arc::new(registry));
    session
        .connect(mode.config(), None)
        .with_context(|| format!("failed to connect scripted session ({})", mode.name()))?;

    tracing::debug!(mode = mode.name(), "scripted fixture ready");
    Ok(Fixture {
        mode,
        server,
        session,
    })
}

/// Configuration for a live server, when `SQLGATE_TEST_MYSQL_HOST` is set
///
/// `SQLGATE_TEST_MYSQL_PORT`, `_USER`, `_PASSWORD` and `_DATABASE` refine it.
pub fn live_config() -> Option<ConnectionConfig> {
    let host = env::var("SQLGATE_TEST_MYSQL_HOST").ok()?;
    let mut config = ConnectionConfig::new("mysql").with_host(&host);
    if let Some(port) = env::var("SQLGATE_TEST_MYSQL_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
    {
        config = config.with_port(port);
    }
    let user = env::var("SQLGATE_TEST_MYSQL_USER").unwrap_or_else(|_| "root".to_string());
    let password = env::var("SQLGATE_TEST_MYSQL_PASSWORD").unwrap_or_default();
    config = config.with_credentials(&user, &password);
    if let Ok(database) = env::var("SQLGATE_TEST_MYSQL_DATABASE") {
        config = config.with_database(&database);
    }
    Some(config)
}
