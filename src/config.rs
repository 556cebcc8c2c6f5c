use std::time::Duration;

use serde::Deserialize;

use crate::driver::{ConnectOptions, SslOptions};
use crate::error::AdapterError;

fn default_username() -> String {
    "root".to_string()
}

const fn default_statement_cache_limit() -> usize {
    1000
}

/// Adapter configuration.
///
/// `database` is the only required key; everything else falls back to the
/// defaults below. Deserializable so callers can feed it straight from
/// their own config files:
/// ```rust
/// use sql_adapter::config::AdapterConfig;
///
/// let config: AdapterConfig =
///     serde_json::from_str(r#"{ "database": "app", "encoding": "utf8mb4" }"#).unwrap();
/// assert_eq!(config.username, "root");
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<String>,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// When set, `SET NAMES <encoding>` runs after every connect.
    pub encoding: Option<String>,
    /// Enable the driver's auto-reconnect flag after connecting.
    #[serde(default)]
    pub reconnect: bool,
    pub sslca: Option<String>,
    pub sslkey: Option<String>,
    pub sslcert: Option<String>,
    pub sslcapath: Option<String>,
    pub sslcipher: Option<String>,
    /// Timeouts in seconds, applied as driver options before connecting.
    pub connect_timeout: Option<u64>,
    pub read_timeout: Option<u64>,
    pub write_timeout: Option<u64>,
    /// Capacity bound of the prepared-statement cache, per process
    /// identity.
    #[serde(default = "default_statement_cache_limit")]
    pub statement_cache_limit: usize,
}

impl AdapterConfig {
    /// Configuration with defaults for everything but the database name.
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            host: None,
            port: None,
            socket: None,
            username: default_username(),
            password: String::new(),
            database: database.into(),
            encoding: None,
            reconnect: false,
            sslca: None,
            sslkey: None,
            sslcert: None,
            sslcapath: None,
            sslcipher: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            statement_cache_limit: default_statement_cache_limit(),
        }
    }

    /// Check the invariants the adapter relies on.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Config` when `database` is empty or the
    /// statement cache limit is zero.
    pub fn validate(&self) -> Result<(), AdapterError> {
        if self.database.is_empty() {
            return Err(AdapterError::Config("database is required".to_string()));
        }
        if self.statement_cache_limit == 0 {
            return Err(AdapterError::Config(
                "statement_cache_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Assemble the options handed to the driver at connect time.
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            socket: self.socket.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            encoding: self.encoding.clone(),
            ssl: SslOptions {
                key: self.sslkey.clone(),
                cert: self.sslcert.clone(),
                ca: self.sslca.clone(),
                capath: self.sslcapath.clone(),
                cipher: self.sslcipher.clone(),
            },
            connect_timeout: self.connect_timeout.map(Duration::from_secs),
            read_timeout: self.read_timeout.map(Duration::from_secs),
            write_timeout: self.write_timeout.map(Duration::from_secs),
        }
    }
}
