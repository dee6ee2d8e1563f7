//! MySQL error codes and their classification into semantic kinds

use sqlgate_core::{DriverErrorKind, DriverException};

/// Server error: access denied for user
pub const ERROR_ACCESS_DENIED: i32 = 1045;
/// Server error: duplicate entry for a unique key
pub const ERROR_DUPLICATE_ENTRY: i32 = 1062;
/// Server error: data truncated for column
pub const ERROR_DATA_TRUNCATED: i32 = 1265;

/// Client error: unknown error
pub const CR_UNKNOWN_ERROR: i32 = 2000;
/// Client error: can't connect
pub const CR_CONNECTION_ERROR: i32 = 2002;
/// Client error: server has gone away
pub const CR_SERVER_GONE_ERROR: i32 = 2006;
/// Client error: lost connection during query
pub const CR_SERVER_LOST: i32 = 2013;
/// Client error: commands out of sync
pub const CR_COMMANDS_OUT_OF_SYNC: i32 = 2014;

const FOREIGN_KEY_CODES: &[i32] = &[1216, 1217, 1451, 1452, 1701];
const UNIQUE_CODES: &[i32] = &[1062, 1557, 1569, 1586];
const NOT_NULL_CODES: &[i32] = &[1048, 1121, 1138, 1171, 1252, 1263, 1566];

/// Error reported by the native link: engine code plus message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({code})")]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn server_gone() -> Self {
        Self::new(CR_SERVER_GONE_ERROR, "MySQL server has gone away")
    }

    pub fn out_of_sync() -> Self {
        Self::new(
            CR_COMMANDS_OUT_OF_SYNC,
            "Commands out of sync; you can't run this command now",
        )
    }

    /// Convert into a classified exception for the statement that failed
    pub fn into_exception(self, sql: &str) -> DriverException {
        create_exception(self.message, self.code, sql)
    }
}

/// Map a native error code to its semantic kind. First match wins.
pub fn classify(code: i32) -> DriverErrorKind {
    if FOREIGN_KEY_CODES.contains(&code) {
        DriverErrorKind::ForeignKeyConstraintViolation
    } else if UNIQUE_CODES.contains(&code) {
        DriverErrorKind::UniqueConstraintViolation
    } else if NOT_NULL_CODES.contains(&code) {
        DriverErrorKind::NotNullConstraintViolation
    } else {
        DriverErrorKind::Generic
    }
}

/// Build the exception for a failed statement
pub fn create_exception(message: impl Into<String>, code: i32, sql: &str) -> DriverException {
    DriverException::new(classify(code), message, code).with_sql(sql)
}
