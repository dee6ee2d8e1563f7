//! Result cursor over a native MySQL result handle

use parking_lot::Mutex;
use sqlgate_core::{DriverException, Error, Result, ResultColumn, ResultDriver, RowData};
use std::any::Any;
use std::sync::{Arc, Weak};

use crate::errors::NativeError;
use crate::escape;
use crate::link::{FieldInfo, NativeLink, NativeResult};

/// Shared slot holding a driver's native link, empty once disconnected
pub type LinkSlot = Arc<Mutex<Option<Box<dyn NativeLink>>>>;

/// A query result owned independently of the driver that produced it.
///
/// The cursor keeps only a weak reference to the driver's link. Buffered
/// results stay readable after the driver is gone; streamed ones fail with
/// "server has gone away".
pub struct MySqlResult {
    native: Option<Box<dyn NativeResult>>,
    link: Weak<Mutex<Option<Box<dyn NativeLink>>>>,
    buffered: bool,
    names: Vec<String>,
    columns: Option<Vec<ResultColumn>>,
}

impl MySqlResult {
    pub(crate) fn new(native: Box<dyn NativeResult>, link: &LinkSlot, buffered: bool) -> Self {
        let names = native.fields().iter().map(|f| f.name.clone()).collect();
        Self {
            native: Some(native),
            link: Arc::downgrade(link),
            buffered,
            names,
            columns: None,
        }
    }

    /// Give up the native handle without freeing it
    pub fn into_native(mut self) -> Option<Box<dyn NativeResult>> {
        self.native.take()
    }

    fn native_mut(&mut self) -> Result<&mut Box<dyn NativeResult>> {
        self.native
            .as_mut()
            .ok_or_else(|| Error::NotSupported("Result set has already been freed.".to_string()))
    }

    fn link_alive(&self) -> bool {
        self.link
            .upgrade()
            .map(|slot| slot.lock().is_some())
            .unwrap_or(false)
    }
}

fn column_from_field(field: &FieldInfo) -> ResultColumn {
    let full_name = if field.table.is_empty() {
        field.name.clone()
    } else {
        format!("{}.{}", field.table, field.name)
    };
    ResultColumn {
        name: field.name.clone(),
        table: field.org_table.clone(),
        full_name,
        native_type: escape::native_type_name(field.type_code),
        semantic_type: escape::semantic_type(field.type_code),
        vendor: field.vendor_record(),
    }
}

fn fetch_error(err: NativeError) -> Error {
    Error::Driver(DriverException::generic(err.message, err.code))
}

impl ResultDriver for MySqlResult {
    fn is_buffered(&self) -> bool {
        self.buffered
    }

    fn is_freed(&self) -> bool {
        self.native.is_none()
    }

    fn row_count(&self) -> Result<u64> {
        let native = self
            .native
            .as_ref()
            .ok_or_else(|| Error::NotSupported("Result set has already been freed.".to_string()))?;
        if !self.buffered {
            return Err(Error::NotSupported(
                "Row count is not available for unbuffered queries.".to_string(),
            ));
        }
        native.num_rows().ok_or_else(|| {
            Error::NotSupported("Row count is not available for unbuffered queries.".to_string())
        })
    }

    fn fetch(&mut self, associative: bool) -> Result<Option<RowData>> {
        let buffered = self.buffered;
        if self.native.is_some() && !buffered && !self.link_alive() {
            return Err(fetch_error(NativeError::server_gone()));
        }
        let native = self.native_mut()?;
        let values = match native.fetch_row().map_err(fetch_error)? {
            Some(values) => values,
            None => return Ok(None),
        };
        Ok(Some(RowData::from_parts(&self.names, values, associative)))
    }

    fn seek(&mut self, row: u64) -> Result<bool> {
        let buffered = self.buffered;
        let native = self.native_mut()?;
        if !buffered {
            return Err(Error::NotSupported(
                "Cannot seek an unbuffered result set.".to_string(),
            ));
        }
        Ok(native.data_seek(row))
    }

    fn free(&mut self) {
        if self.native.take().is_some() {
            tracing::debug!(buffered = self.buffered, "result set freed");
        }
    }

    fn columns(&mut self) -> Result<&[ResultColumn]> {
        if self.columns.is_none() {
            let native = self.native_mut()?;
            let columns = native.fields().iter().map(column_from_field).collect();
            self.columns = Some(columns);
        }
        Ok(self.columns.as_deref().unwrap_or_default())
    }

    fn detach(&mut self) -> Option<Box<dyn Any + Send>> {
        let native = self.native.take()?;
        tracing::debug!("result set detached from cursor");
        Some(Box::new(native))
    }
}

impl Drop for MySqlResult {
    fn drop(&mut self) {
        self.free();
    }
}
