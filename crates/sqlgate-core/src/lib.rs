//! SQLGate Core - Core abstractions and traits for the database layer
//!
//! This crate provides the fundamental traits and types that all other
//! SQLGate crates depend on. It defines:
//!
//! - `Driver` - Trait for engine adapters (connect, execute, transactions, escaping)
//! - `ResultDriver` - Trait for result cursors (fetch, seek, free, column metadata)
//! - `DriverFactory` - Trait for creating driver instances by name
//! - `ConnectionConfig` - The configuration bag drivers consume
//! - Common types like `Value`, `RowData`, `ResultColumn`, and the `Error` taxonomy

mod config;
mod driver;
mod error;
mod temporal;
mod types;

pub use config::*;
pub use driver::*;
pub use error::*;
pub use temporal::*;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
