//! SQLGate Driver Testing Suite
//!
//! Scenario tests that exercise the whole stack: `Session` → `ConnectionRegistry`
//! → `MySqlDriver` → native link. Every scenario runs twice through rstest, once
//! with buffered results and once streaming, against the scripted engine from
//! `sqlgate_driver_mysql::testing`.
//!
//! # Test Categories
//!
//! - Connection tests (defaults, session setup, named connections)
//! - Select tests (cursor iteration, seeking, row counts, column metadata)
//! - Error tests (constraint classification, out-of-sync links, closed links)
//! - Transaction tests (begin/commit/rollback and savepoints)
//! - Live tests against a real server (ignored unless configured)
//!
//! # Usage
//!
//! ```bash
//! # Scripted scenarios
//! cargo test -p sqlgate-driver-tests
//!
//! # Live scenarios
//! export SQLGATE_TEST_MYSQL_HOST=127.0.0.1
//! export SQLGATE_TEST_MYSQL_USER=root SQLGATE_TEST_MYSQL_PASSWORD=secret
//! cargo test -p sqlgate-driver-tests -- --ignored
//! ```

#![warn(clippy::all)]

// Core infrastructure
pub mod fixtures;

#[cfg(test)]
pub mod connection_tests;

#[cfg(test)]
pub mod select_tests;

#[cfg(test)]
pub mod error_tests;

#[cfg(test)]
pub mod transaction_tests;

#[cfg(test)]
pub mod live_tests;
