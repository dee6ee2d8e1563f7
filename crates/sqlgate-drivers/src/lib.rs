//! SQLGate Drivers - Database driver implementations
//!
//! This crate bundles the concrete engine drivers behind features and provides
//! the [`DriverRegistry`] that resolves a configuration's `driver` name to a
//! factory.

#[cfg(feature = "mysql")]
pub use sqlgate_driver_mysql as mysql;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from sqlgate-core
pub use sqlgate_core::{
    ConnectionConfig, Driver, DriverFactory, Error, Result, ResultDriver, RowData, Value,
};
