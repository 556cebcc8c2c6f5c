//! The seam between the adapter core and a concrete database driver.
//!
//! Everything the core needs from a driver is expressed through these
//! traits: an opaque connection handle, prepared-statement handles, and
//! raw results from the non-prepared query path. Optional driver
//! features are probed once at connect time and reported through
//! [`Capabilities`] so call sites branch on stored flags instead of
//! re-probing per call.

use std::time::Duration;

use crate::error::DriverError;
use crate::types::Value;

/// Optional driver features, resolved once per connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// Supports a lightweight status call usable as a liveness probe.
    pub status_probe: bool,
    /// Supports re-authenticating as another (or the same) user without a
    /// full reconnect.
    pub change_user: bool,
    /// Supports the auto-reconnect flag.
    pub reconnect_flag: bool,
    /// Reports the last generated insert id.
    pub insert_id: bool,
    /// Reports server version information.
    pub server_info: bool,
}

/// TLS material handed to the driver before connecting.
#[derive(Debug, Clone, Default)]
pub struct SslOptions {
    pub key: Option<String>,
    pub cert: Option<String>,
    pub ca: Option<String>,
    pub capath: Option<String>,
    pub cipher: Option<String>,
}

/// Everything a driver needs to establish a session. Pre-connection
/// options (character set, TLS, timeouts) are applied by the driver
/// before the physical connect.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<String>,
    pub username: String,
    pub password: String,
    pub database: String,
    pub encoding: Option<String>,
    pub ssl: SslOptions,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

/// Factory for driver connections.
pub trait Driver {
    type Conn: Connection;

    /// Apply pre-connection options and perform the physical connect.
    ///
    /// # Errors
    ///
    /// Returns the driver's error when no session can be established.
    fn connect(&self, options: &ConnectOptions) -> Result<Self::Conn, DriverError>;
}

/// One live session handle. Not safe for concurrent use; the adapter
/// serializes all access.
pub trait Connection {
    type Stmt: PreparedStatement;
    type Raw: RawResult;

    /// Which optional features this connection supports.
    fn capabilities(&self) -> Capabilities;

    /// Toggle the driver's auto-reconnect behavior. A successful connect
    /// resets this flag, so the adapter sets it only after connecting.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the option cannot be applied.
    fn set_reconnect(&mut self, enabled: bool) -> Result<(), DriverError>;

    /// Re-authenticate on the same physical connection.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if re-authentication fails.
    fn change_user(
        &mut self,
        username: &str,
        password: &str,
        database: &str,
    ) -> Result<(), DriverError>;

    /// Compile `sql` into a prepared statement.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the statement cannot be prepared.
    fn prepare(&mut self, sql: &str) -> Result<Self::Stmt, DriverError>;

    /// Run `sql` directly, outside the prepared-statement API. Returns
    /// `None` for statements that produce no result set.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if execution fails.
    fn query(&mut self, sql: &str) -> Result<Option<Self::Raw>, DriverError>;

    /// Lightweight status call (capability: `status_probe`).
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the server cannot be reached.
    fn stat(&mut self) -> Result<String, DriverError>;

    /// Errno left by the most recent driver call, if any.
    fn last_error_code(&self) -> Option<u32>;

    /// Last generated insert id (capability: `insert_id`).
    fn insert_id(&mut self) -> u64;

    /// Server version string (capability: `server_info`).
    fn server_info(&self) -> Option<String>;

    /// Close the session. Closing a broken connection may fail; callers
    /// treat that as a no-op.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the close itself fails.
    fn close(self) -> Result<(), DriverError>;
}

/// A driver-compiled statement bound to one SQL string and one
/// connection. Must be closed exactly once.
pub trait PreparedStatement {
    /// Execute with the given parameter values.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if binding or execution fails.
    fn execute(&mut self, params: &[Value]) -> Result<(), DriverError>;

    /// Column names of the pending result, or `None` when the statement
    /// produces no result set.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if metadata cannot be fetched.
    fn result_metadata(&mut self) -> Result<Option<Vec<String>>, DriverError>;

    /// Fetch all pending rows in driver order.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if a row cannot be fetched.
    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, DriverError>;

    /// Rows affected by the most recent execution.
    fn affected_rows(&self) -> u64;

    /// Release the pending result set, if any.
    fn free_result(&mut self);

    /// Close the statement handle. Closing an already-invalid handle may
    /// fail; callers treat that as a no-op.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the close itself fails.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// Result of a direct (non-prepared) query.
pub trait RawResult {
    /// Column names in driver-reported order.
    fn columns(&self) -> Vec<String>;

    /// Fetch all rows in driver order.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if a row cannot be fetched.
    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, DriverError>;

    /// Release the underlying driver result.
    fn free(self);
}

/// Statement handle type of a driver's connection.
pub type ConnStmt<D> = <<D as Driver>::Conn as Connection>::Stmt;
