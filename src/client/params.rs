//! Connection parameters for PostgreSQL connections.
//!
//! [`ConnectParams`] carries everything needed to open one connection to a
//! specific host/database pair. The probe builds a fresh set of parameters
//! for every connection scope it opens during a test cycle.

use std::fmt;
use std::time::Duration;

/// Default timeout for a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// SSL negotiation mode, mirroring the libpq `sslmode` values the probe
/// accepts from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SslMode {
    /// Never use TLS.
    Disable,
    /// Use TLS if the server supports it.
    Prefer,
    /// Require TLS, without verifying the server certificate chain
    /// (database clusters commonly run with operator-issued certificates).
    Require,
}

impl SslMode {
    /// Parse a configured `sslmode` string.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "disable" => Some(SslMode::Disable),
            "prefer" => Some(SslMode::Prefer),
            "require" => Some(SslMode::Require),
            _ => None,
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslMode::Disable => write!(f, "disable"),
            SslMode::Prefer => write!(f, "prefer"),
            SslMode::Require => write!(f, "require"),
        }
    }
}

impl From<SslMode> for tokio_postgres::config::SslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require => tokio_postgres::config::SslMode::Require,
        }
    }
}

/// Parameters for a single database connection.
#[derive(Clone, Debug)]
pub struct ConnectParams {
    /// Hostname or pod IP to connect to.
    pub host: String,
    /// Service port.
    pub port: u16,
    /// Database name.
    pub dbname: String,
    /// Role to authenticate as.
    pub user: String,
    /// Password for the role.
    pub password: String,
    /// SSL negotiation mode.
    pub ssl_mode: SslMode,
    /// Timeout for the connection attempt.
    pub connect_timeout: Duration,
}

impl ConnectParams {
    /// Create parameters with the default connect timeout.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        ssl_mode: SslMode,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            dbname: dbname.into(),
            user: user.into(),
            password: password.into(),
            ssl_mode,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
