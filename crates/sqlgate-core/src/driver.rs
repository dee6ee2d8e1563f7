//! Driver and result-set trait definitions

use indexmap::IndexMap;
use std::any::Any;

use crate::{ConnectionConfig, Result, ResultColumn, RowData, TemporalValue};

/// Capability set for connecting, executing SQL and controlling transactions
/// against one engine.
///
/// Every operation blocks the calling thread until the engine answers. A driver
/// owns at most one native connection; the result cursors it hands out are
/// independent objects that only keep a non-owning reference to it.
pub trait Driver: Send + Sync {
    /// Unique identifier for this driver (e.g., "mysql")
    fn name(&self) -> &'static str;

    /// Connect to the database.
    ///
    /// Missing configuration entries are filled with engine defaults in place,
    /// so after a successful call `config` holds the resolved settings.
    fn connect(&self, config: &mut ConnectionConfig) -> Result<()>;

    /// Close the native connection. Never fails, closing twice is harmless.
    fn disconnect(&self);

    /// Whether a live native connection is held
    fn is_connected(&self) -> bool;

    /// Execute a statement.
    ///
    /// Returns a cursor for tabular results and `None` for statements that
    /// produce no rows.
    fn query(&self, sql: &str) -> Result<Option<Box<dyn ResultDriver>>>;

    /// Rows affected by the last statement, `None` when not applicable
    fn affected_rows(&self) -> Option<u64>;

    /// Identifier generated by the last insert.
    ///
    /// The sequence name is for engines with named sequences and may be ignored.
    fn insert_id(&self, sequence: Option<&str>) -> Option<u64>;

    /// Counters the engine reported for the last statement (e.g. `Records`, `Warnings`)
    fn info(&self) -> Result<IndexMap<String, u64>> {
        Ok(IndexMap::new())
    }

    /// Begin a transaction, or create a savepoint when a name is given
    fn begin(&self, savepoint: Option<&str>) -> Result<()>;

    /// Commit a transaction, or release a savepoint when a name is given
    fn commit(&self, savepoint: Option<&str>) -> Result<()>;

    /// Roll back a transaction, or roll back to a savepoint when a name is given
    fn rollback(&self, savepoint: Option<&str>) -> Result<()>;

    /// Quote a text literal
    fn escape_text(&self, value: &str) -> String;

    /// Quote a binary literal
    fn escape_binary(&self, value: &[u8]) -> String;

    /// Quote an identifier
    fn escape_identifier(&self, value: &str) -> String;

    fn escape_bool(&self, value: bool) -> String;

    fn escape_date(&self, value: TemporalValue) -> Result<String>;

    fn escape_datetime(&self, value: TemporalValue) -> Result<String>;

    /// Quote a value for use in a LIKE pattern.
    ///
    /// `pos < 0` adds a leading wildcard, `pos > 0` a trailing one and
    /// `pos == 0` both.
    fn escape_like(&self, value: &str, pos: i32) -> String;

    /// Decode binary data read from a result set
    fn unescape_binary(&self, value: &[u8]) -> Vec<u8> {
        value.to_vec()
    }

    /// Append a LIMIT/OFFSET clause to `sql`
    fn apply_limit(&self, sql: &mut String, limit: Option<i64>, offset: Option<i64>) -> Result<()>;
}

/// Capability set for iterating, seeking and freeing one query's result set.
///
/// Implementations release the native result when dropped unless it was
/// handed out with [`ResultDriver::detach`].
pub trait ResultDriver: Send {
    /// Whether the result is materialised client side (seekable and countable)
    fn is_buffered(&self) -> bool;

    /// Whether the native result has been released or detached
    fn is_freed(&self) -> bool;

    /// Number of rows; only available for buffered results
    fn row_count(&self) -> Result<u64>;

    /// Fetch the next row, `None` past the last one
    fn fetch(&mut self, associative: bool) -> Result<Option<RowData>>;

    /// Move the cursor without fetching; only available for buffered results
    fn seek(&mut self, row: u64) -> Result<bool>;

    /// Release the native result. Idempotent.
    fn free(&mut self);

    /// Column metadata, computed once per result
    fn columns(&mut self) -> Result<&[ResultColumn]>;

    /// Hand the raw native result to the caller, disabling automatic release.
    ///
    /// The payload type is engine specific.
    fn detach(&mut self) -> Option<Box<dyn Any + Send>>;
}

impl std::fmt::Debug for dyn ResultDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultDriver")
            .field("buffered", &self.is_buffered())
            .field("freed", &self.is_freed())
            .finish()
    }
}

/// Creates unconnected driver instances for one engine
pub trait DriverFactory: Send + Sync {
    /// Driver ID matched against [`ConnectionConfig::driver`]
    fn name(&self) -> &'static str;

    /// Human-readable name (e.g., "MySQL")
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Default connection port (None for file-based databases)
    fn default_port(&self) -> Option<u16> {
        None
    }

    fn create(&self) -> Result<Box<dyn Driver>>;
}
