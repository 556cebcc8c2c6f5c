//! Execution core of a MySQL-style database client adapter.
//!
//! Manages prepared statements against a single physical connection: a
//! bounded statement cache partitioned by process identity (so a forked
//! child never closes its parent's native handles), the prepare-or-reuse
//! execution pipeline, connection lifecycle, and a tolerant
//! transaction-begin path. The concrete driver is injected through the
//! traits in [`driver`].

pub mod adapter;
pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
mod executor;
pub mod prelude;
pub mod results;
pub mod transaction;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use adapter::Adapter;
pub use config::AdapterConfig;
pub use error::{AdapterError, DriverError};
pub use results::ResultSet;
pub use transaction::BeginOutcome;
pub use types::Value;
