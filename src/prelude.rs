//! Convenient imports for common functionality.

pub use crate::adapter::{Adapter, IdentitySource};
pub use crate::cache::{CacheEntry, ProcessId, StatementCache};
pub use crate::config::AdapterConfig;
pub use crate::driver::{
    Capabilities, ConnectOptions, Connection, Driver, PreparedStatement, RawResult, SslOptions,
};
pub use crate::error::{AdapterError, DriverError};
pub use crate::results::{ResultSet, Row};
pub use crate::transaction::BeginOutcome;
pub use crate::types::Value;
