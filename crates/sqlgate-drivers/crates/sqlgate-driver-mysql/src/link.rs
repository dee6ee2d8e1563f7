//! Native link seam
//!
//! The driver never talks to a wire protocol directly. It issues SQL strings
//! through a [`NativeLink`] and gets [`NativeResult`] handles back, the same
//! way the engine's client library hands out connection and result objects.
//! [`crate::connection`] implements the seam over `mysql_async`,
//! [`crate::testing`] implements it in memory.

use indexmap::IndexMap;
use sqlgate_core::Value;

use crate::errors::NativeError;
use crate::escape;

/// How the engine delivers a tabular result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// Materialise every row client side before returning
    Store,
    /// Stream rows from the server as they are fetched
    Use,
}

/// Field metadata record as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldInfo {
    pub name: String,
    pub org_name: String,
    pub table: String,
    pub org_table: String,
    pub db: String,
    /// Character set number, 63 means binary
    pub charset: u16,
    pub length: u32,
    /// Protocol type code (`MYSQL_TYPE_*`)
    pub type_code: u8,
    pub flags: u16,
    pub decimals: u8,
}

impl FieldInfo {
    pub fn new(name: &str, type_code: u8) -> Self {
        Self {
            name: name.to_string(),
            org_name: name.to_string(),
            type_code,
            charset: 33,
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self.org_table = table.to_string();
        self
    }

    pub fn with_charset(mut self, charset: u16) -> Self {
        self.charset = charset;
        self
    }

    /// The record as a name → value map, exposed as column vendor metadata
    pub fn vendor_record(&self) -> IndexMap<String, Value> {
        let mut record = IndexMap::new();
        record.insert("name".to_string(), Value::from(self.name.as_str()));
        record.insert("orgname".to_string(), Value::from(self.org_name.as_str()));
        record.insert("table".to_string(), Value::from(self.table.as_str()));
        record.insert("orgtable".to_string(), Value::from(self.org_table.as_str()));
        record.insert("db".to_string(), Value::from(self.db.as_str()));
        record.insert("charsetnr".to_string(), Value::Int64(self.charset.into()));
        record.insert("length".to_string(), Value::Int64(self.length.into()));
        record.insert("type".to_string(), Value::Int64(self.type_code.into()));
        record.insert("flags".to_string(), Value::Int64(self.flags.into()));
        record.insert("decimals".to_string(), Value::Int64(self.decimals.into()));
        record
    }
}

/// Resolved parameters for opening a native link
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Client connect flags bitmask
    pub flags: u32,
    /// Vendor options in configuration order
    pub options: Vec<(String, serde_json::Value)>,
    pub persistent: bool,
}

/// A native result handle
pub trait NativeResult: Send {
    fn fields(&self) -> &[FieldInfo];

    /// Next row, `None` once the result is exhausted
    fn fetch_row(&mut self) -> Result<Option<Vec<Value>>, NativeError>;

    /// Row count, `None` for streamed results
    fn num_rows(&self) -> Option<u64>;

    /// Position the cursor; `false` when out of range or not seekable
    fn data_seek(&mut self, row: u64) -> bool;
}

/// A live native connection
pub trait NativeLink: Send {
    /// Run one statement. `None` means the statement produced no result set.
    fn query(
        &mut self,
        sql: &str,
        mode: ResultMode,
    ) -> Result<Option<Box<dyn NativeResult>>, NativeError>;

    /// Fast-path character set switch; `false` when the engine refused it
    fn set_charset(&mut self, charset: &str) -> bool;

    /// Rows affected by the last statement, -1 when it failed or did not apply
    fn affected_rows(&self) -> i64;

    fn insert_id(&self) -> u64;

    /// Engine info string for the last statement, e.g. `Records: 3  Duplicates: 0  Warnings: 0`
    fn info(&self) -> Option<String>;

    /// Server-side connection (thread) id
    fn thread_id(&self) -> u32;

    fn escape_string(&self, value: &str) -> String {
        escape::real_escape_string(value)
    }

    /// Close the link. Further calls are no-ops.
    fn close(&mut self);
}

/// Opens native links
pub trait NativeConnector: Send + Sync {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn NativeLink>, NativeError>;
}

/// A fully materialised result: rows held in memory plus a read position
#[derive(Debug, Clone, Default)]
pub struct StoredResult {
    fields: Vec<FieldInfo>,
    rows: Vec<Vec<Value>>,
    position: usize,
}

impl StoredResult {
    pub fn new(fields: Vec<FieldInfo>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            fields,
            rows,
            position: 0,
        }
    }
}

impl NativeResult for StoredResult {
    fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    fn fetch_row(&mut self) -> Result<Option<Vec<Value>>, NativeError> {
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn num_rows(&self) -> Option<u64> {
        Some(self.rows.len() as u64)
    }

    fn data_seek(&mut self, row: u64) -> bool {
        match usize::try_from(row) {
            Ok(index) if index < self.rows.len() => {
                self.position = index;
                true
            }
            _ => false,
        }
    }
}
