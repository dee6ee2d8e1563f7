//! MySQL/MariaDB driver implementation
//!
//! [`MySqlDriver`] implements the [`sqlgate_core::Driver`] contract on top of a
//! native link. The production link drives `mysql_async` on a dedicated Tokio
//! runtime; the `testing` feature adds a scripted in-memory engine.

mod connection;
mod driver;
mod errors;
mod escape;
mod link;
mod result;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod driver_tests;

pub use connection::{AsyncMySqlConnector, AsyncMySqlLink, CLIENT_FOUND_ROWS};
pub use driver::{EngineDefaults, MySqlDriver, MySqlDriverFactory};
pub use errors::{
    CR_COMMANDS_OUT_OF_SYNC, CR_CONNECTION_ERROR, CR_SERVER_GONE_ERROR, CR_SERVER_LOST,
    CR_UNKNOWN_ERROR, ERROR_ACCESS_DENIED, ERROR_DATA_TRUNCATED, ERROR_DUPLICATE_ENTRY,
    NativeError, classify, create_exception,
};
pub use escape::MAX_LIMIT;
pub use link::{
    ConnectParams, FieldInfo, NativeConnector, NativeLink, NativeResult, ResultMode,
    StoredResult,
};
pub use result::{LinkSlot, MySqlResult};
