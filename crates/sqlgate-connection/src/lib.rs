//! SQLGate Connection - Connection registry and session dispatch
//!
//! A [`ConnectionRegistry`] holds named live connections. A [`Session`] adds an
//! "active" connection on top and forwards [`ConnectionOps`] calls to it.

mod bind;
mod connection;
mod ops;
mod registry;
mod session;

#[cfg(test)]
mod session_tests;

pub use bind::{bind_params, value_to_literal};
pub use connection::Connection;
pub use ops::ConnectionOps;
pub use registry::ConnectionRegistry;
pub use session::{DEFAULT_CONNECTION, Session};

pub use sqlgate_core::VERSION;
