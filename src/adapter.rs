//! Adapter facade and connection lifecycle.

use tracing::debug;

use crate::cache::{ProcessId, StatementCache};
use crate::config::AdapterConfig;
use crate::driver::{Capabilities, ConnStmt, Connection, Driver, RawResult};
use crate::error::AdapterError;

/// Supplies the current process identity for cache partitioning. The
/// default reads the OS pid; tests inject their own source to simulate a
/// fork in-process.
pub type IdentitySource = Box<dyn Fn() -> ProcessId + Send>;

/// Execution core for one physical connection.
///
/// Owns the connection handle, the prepared-statement cache and the
/// driver capability flags. Not safe for concurrent use; callers needing
/// a pool build one above this type, one adapter per physical connection.
pub struct Adapter<D: Driver> {
    driver: D,
    config: AdapterConfig,
    conn: Option<D::Conn>,
    caps: Capabilities,
    cache: StatementCache<ConnStmt<D>>,
    identity: IdentitySource,
}

impl<D: Driver> Adapter<D> {
    /// Build an adapter from a driver and a validated configuration. No
    /// connection is established yet; call [`Adapter::connect`].
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Config` when the configuration is invalid.
    pub fn new(driver: D, config: AdapterConfig) -> Result<Self, AdapterError> {
        config.validate()?;
        let cache = StatementCache::new(config.statement_cache_limit);
        Ok(Self {
            driver,
            config,
            conn: None,
            caps: Capabilities::default(),
            cache,
            identity: Box::new(ProcessId::current),
        })
    }

    /// Replace the process-identity source used for cache partitioning.
    #[must_use]
    pub fn with_identity_source(mut self, identity: IdentitySource) -> Self {
        self.identity = identity;
        self
    }

    /// Establish the session: pre-connection options, physical connect,
    /// then the post-connect configuration. The auto-reconnect flag is
    /// applied only after the connect succeeds, since a successful connect
    /// resets it driver-side. An existing session is closed first, and its
    /// cached statements dropped; they belong to the old connection.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Connection` when no session can be
    /// established, or `AdapterError::Execution` when post-connect session
    /// setup fails.
    pub fn connect(&mut self) -> Result<(), AdapterError> {
        if self.conn.is_some() {
            self.disconnect();
            self.clear_statement_cache();
        }
        let options = self.config.connect_options();
        let mut conn = self
            .driver
            .connect(&options)
            .map_err(AdapterError::Connection)?;
        let caps = conn.capabilities();
        if self.config.reconnect && caps.reconnect_flag {
            conn.set_reconnect(true).map_err(AdapterError::Connection)?;
        }
        self.caps = caps;
        self.conn = Some(conn);
        self.configure_session()?;
        debug!(database = %self.config.database, "connected");
        Ok(())
    }

    /// Disconnect, drop every cached statement, connect. No stale
    /// prepared statement survives a reconnect.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`Adapter::connect`].
    pub fn reconnect(&mut self) -> Result<(), AdapterError> {
        self.disconnect();
        self.clear_statement_cache();
        self.connect()
    }

    /// Close the session. Closing an already-broken connection never
    /// raises.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = conn.close();
            debug!("disconnected");
        }
    }

    /// Re-authenticate as the configured user and re-run the post-connect
    /// session setup, when the driver supports it; otherwise a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Connection` when re-authentication fails,
    /// or `AdapterError::NotConnected` while disconnected.
    pub fn reset(&mut self) -> Result<(), AdapterError> {
        if !self.caps.change_user {
            return Ok(());
        }
        let conn = self.conn.as_mut().ok_or(AdapterError::NotConnected)?;
        conn.change_user(
            &self.config.username,
            &self.config.password,
            &self.config.database,
        )
        .map_err(AdapterError::Connection)?;
        debug!(username = %self.config.username, "re-authenticated");
        self.configure_session()
    }

    /// Lightweight liveness probe. Reports `false` rather than raising:
    /// any driver error during the probe means the connection is unusable.
    pub fn is_active(&mut self) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            return false;
        };
        let probe_ok = if self.caps.status_probe {
            conn.stat().is_ok()
        } else {
            match conn.query("SELECT 1") {
                Ok(Some(raw)) => {
                    raw.free();
                    true
                }
                Ok(None) => true,
                Err(_) => false,
            }
        };
        probe_ok && conn.last_error_code().is_none()
    }

    /// Close and drop every statement cached for the current process
    /// identity. Runs before reconnect and before shutdown.
    pub fn clear_statement_cache(&mut self) {
        let pid = (self.identity)();
        self.cache.clear(pid);
        debug!("statement cache cleared");
    }

    /// Number of statements cached for the current process identity.
    #[must_use]
    pub fn statement_cache_len(&self) -> usize {
        self.cache.len((self.identity)())
    }

    /// Whether `sql` is cached for the current process identity.
    #[must_use]
    pub fn statement_cache_contains(&self, sql: &str) -> bool {
        self.cache.contains((self.identity)(), sql)
    }

    /// Capability flags probed at connect time. All defaults (nothing
    /// supported) while disconnected.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Server version string, when the driver reports one.
    #[must_use]
    pub fn server_info(&self) -> Option<String> {
        if !self.caps.server_info {
            return None;
        }
        self.conn.as_ref().and_then(Connection::server_info)
    }

    /// `SET NAMES` for the configured encoding, and keep `SELECT ... WHERE
    /// id IS NULL` from matching the last inserted row.
    fn configure_session(&mut self) -> Result<(), AdapterError> {
        if let Some(encoding) = self.config.encoding.clone() {
            self.execute_direct(&format!("SET NAMES {encoding}"))?;
        }
        self.execute_direct("SET SQL_AUTO_IS_NULL=0")?;
        Ok(())
    }

    pub(crate) fn parts_mut(
        &mut self,
    ) -> Result<(&mut D::Conn, &mut StatementCache<ConnStmt<D>>, ProcessId), AdapterError> {
        let pid = (self.identity)();
        let conn = self.conn.as_mut().ok_or(AdapterError::NotConnected)?;
        Ok((conn, &mut self.cache, pid))
    }
}

impl<D: Driver> Drop for Adapter<D> {
    fn drop(&mut self) {
        self.clear_statement_cache();
        self.disconnect();
    }
}
