//! Operations available on a connection and forwarded by a session

use sqlgate_core::{Result, ResultDriver, RowData, Value};

/// Every operation a [`crate::Session`] forwards to its active connection.
///
/// `query` and the fetch helpers substitute `?` placeholders with escaped
/// parameters; `native_query` sends the SQL untouched.
pub trait ConnectionOps {
    /// Close the underlying native connection
    fn disconnect(&self) -> Result<()>;

    fn query(&self, sql: &str, params: &[Value]) -> Result<Option<Box<dyn ResultDriver>>>;

    fn native_query(&self, sql: &str) -> Result<Option<Box<dyn ResultDriver>>>;

    /// First row as an associative row, `None` when there are no rows
    fn fetch(&self, sql: &str, params: &[Value]) -> Result<Option<RowData>>;

    /// All rows as associative rows
    fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<RowData>>;

    /// First column of the first row
    fn fetch_single(&self, sql: &str, params: &[Value]) -> Result<Option<Value>>;

    /// Rows affected by the last statement; fails when the engine cannot tell
    fn affected_rows(&self) -> Result<u64>;

    /// Identifier generated by the last insert; fails when there is none
    fn insert_id(&self, sequence: Option<&str>) -> Result<u64>;

    fn begin(&self, savepoint: Option<&str>) -> Result<()>;

    fn commit(&self, savepoint: Option<&str>) -> Result<()>;

    fn rollback(&self, savepoint: Option<&str>) -> Result<()>;
}
