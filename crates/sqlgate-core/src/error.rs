//! Error types for SQLGate

use std::fmt;
use thiserror::Error;

/// Semantic kind of a failed statement, derived from the engine's native code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverErrorKind {
    /// Any failure that is not a recognised constraint violation
    Generic,
    ForeignKeyConstraintViolation,
    UniqueConstraintViolation,
    NotNullConstraintViolation,
}

impl DriverErrorKind {
    /// Whether the kind is one of the constraint violation subkinds
    pub fn is_constraint_violation(self) -> bool {
        !matches!(self, DriverErrorKind::Generic)
    }
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverErrorKind::Generic => "driver error",
            DriverErrorKind::ForeignKeyConstraintViolation => "foreign key constraint violation",
            DriverErrorKind::UniqueConstraintViolation => "unique constraint violation",
            DriverErrorKind::NotNullConstraintViolation => "not null constraint violation",
        };
        f.write_str(name)
    }
}

/// Failure reported by the database engine.
///
/// Carries the native message and code, and the SQL text that triggered it
/// when the failure came from a statement rather than from connecting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message} (code {code}){}", sql_suffix(.sql))]
pub struct DriverException {
    message: String,
    code: i32,
    sql: Option<String>,
    kind: DriverErrorKind,
}

fn sql_suffix(sql: &Option<String>) -> String {
    match sql {
        Some(sql) => format!(" in query: {}", sql),
        None => String::new(),
    }
}

impl DriverException {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>, code: i32) -> Self {
        Self {
            message: message.into(),
            code,
            sql: None,
            kind,
        }
    }

    /// Generic failure with no statement attached (e.g. connect errors)
    pub fn generic(message: impl Into<String>, code: i32) -> Self {
        Self::new(DriverErrorKind::Generic, message, code)
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }
}

/// Core error type for SQLGate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Driver(#[from] DriverException),

    /// Usage the current driver or cursor mode cannot honour
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not connected to a database")]
    NotConnected,

    #[error("There is no connection named '{0}'")]
    NoSuchConnection(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown driver: {0}")]
    UnknownDriver(String),
}

impl Error {
    /// Kind of the underlying driver failure, if this is one
    pub fn driver_kind(&self) -> Option<DriverErrorKind> {
        match self {
            Error::Driver(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// Native engine code of the underlying driver failure, if this is one
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Driver(e) => Some(e.code()),
            _ => None,
        }
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported(_))
    }
}

/// Result type alias for SQLGate operations
pub type Result<T> = std::result::Result<T, Error>;
