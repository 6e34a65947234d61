//! Environment-sourced probe configuration.
//!
//! The probe is configured entirely through environment variables supplied
//! by its pod spec; everything except the cluster identity and the admin
//! credential has a default. `from_lookup` takes the variable source as a
//! closure so parsing is testable without touching process environment.

use std::time::Duration;

use thiserror::Error;

use crate::client::{SslMode, DEFAULT_CONNECT_TIMEOUT};
use crate::probe::connections::RetryPolicy;

/// Default admin-connection retry attempts.
const DEFAULT_CONN_ATTEMPTS: u32 = 6;
/// Default interval between admin-connection attempts, seconds.
const DEFAULT_CONN_INTERVAL_SECS: u64 = 10;
/// Default replication wait before replica validation, seconds.
const DEFAULT_REPLICATION_WAIT_SECS: u64 = 10;
/// Default role-poll interval, seconds.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
/// Default delay before the first cycle, giving the pod time to settle.
const DEFAULT_STARTUP_DELAY_SECS: u64 = 5;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Deployment-sync (ArgoCD) call-out configuration. Present only when
/// `AUTO_PROMOTE=true`.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Host (and optional port) of the ArgoCD API service.
    pub service_address: String,
    /// Application to sync; ArgoCD app names are lowercase.
    pub app_name: String,
    /// Session token, as issued (trailing newline stripped).
    pub token: String,
    /// Whether to verify the ArgoCD server certificate.
    pub verify_tls: bool,
}

/// Probe configuration.
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// Namespace the database cluster runs in.
    pub namespace: String,
    /// Cluster name, as carried in the operator's labels.
    pub cluster_name: String,
    /// This pod's name.
    pub pod_name: String,
    /// Administrative database role.
    pub admin_user: String,
    /// Password for the administrative role.
    pub admin_password: String,
    /// Database service port.
    pub service_port: u16,
    /// SSL negotiation mode for all database connections.
    pub ssl_mode: SslMode,
    /// Retry policy for the admin connection (the one racing container
    /// startup). All other connections are single-attempt.
    pub conn_retry: RetryPolicy,
    /// Timeout for a single connection attempt.
    pub connect_timeout: Duration,
    /// Delay before the first cycle.
    pub startup_delay: Duration,
    /// Fixed wait for asynchronous replication to catch up.
    pub replication_wait: Duration,
    /// Interval between role-poll ticks.
    pub poll_interval: Duration,
    /// Configured log level (one of trace/debug/info/warning/error/critical).
    pub log_level: String,
    /// Deployment-sync call-out, when enabled.
    pub sync: Option<SyncConfig>,
}

impl ProbeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = require(&lookup, "NAMESPACE")?;
        let cluster_name = require(&lookup, "CLUSTER_NAME")?;
        let pod_name = match lookup("HOSTNAME") {
            Some(name) => name,
            None => hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .map_err(|_| ConfigError::Missing("HOSTNAME"))?,
        };
        let admin_user = require(&lookup, "DB_USER")?;
        let admin_password = require(&lookup, "DB_USER_PASSWORD")?;

        let service_port = parse_or("SERVICE_PORT", lookup("SERVICE_PORT"), 5432)?;
        let ssl_mode = match lookup("SSLMODE") {
            Some(value) => SslMode::parse(&value).ok_or(ConfigError::Invalid {
                key: "SSLMODE",
                value,
            })?,
            None => SslMode::Require,
        };

        let attempts: u32 = parse_or(
            "POSTGRES_CONN_ATTEMPTS",
            lookup("POSTGRES_CONN_ATTEMPTS"),
            DEFAULT_CONN_ATTEMPTS,
        )?;
        let interval_secs: u64 = parse_or(
            "POSTGRES_CONN_INTERVAL",
            lookup("POSTGRES_CONN_INTERVAL"),
            DEFAULT_CONN_INTERVAL_SECS,
        )?;

        let replication_wait_secs: u64 = parse_or(
            "REPLICATION_WAIT_SECONDS",
            lookup("REPLICATION_WAIT_SECONDS"),
            DEFAULT_REPLICATION_WAIT_SECS,
        )?;
        let poll_interval_secs: u64 = parse_or(
            "POLL_INTERVAL_SECONDS",
            lookup("POLL_INTERVAL_SECONDS"),
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let startup_delay_secs: u64 = parse_or(
            "STARTUP_DELAY_SECONDS",
            lookup("STARTUP_DELAY_SECONDS"),
            DEFAULT_STARTUP_DELAY_SECS,
        )?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let auto_promote = parse_bool("AUTO_PROMOTE", lookup("AUTO_PROMOTE"), false)?;
        let sync = if auto_promote {
            Some(SyncConfig {
                service_address: require(&lookup, "ARGOCD_SERVICE_ADDRESS")?,
                app_name: require(&lookup, "ARGOCD_APP_NAME")?.to_lowercase(),
                // Tokens mounted from secrets commonly carry a trailing newline.
                token: require(&lookup, "ARGOCD_TOKEN")?.trim_end_matches('\n').to_string(),
                verify_tls: parse_bool("ARGOCD_VERIFY_TLS", lookup("ARGOCD_VERIFY_TLS"), true)?,
            })
        } else {
            None
        };

        Ok(Self {
            namespace,
            cluster_name,
            pod_name,
            admin_user,
            admin_password,
            service_port,
            ssl_mode,
            conn_retry: RetryPolicy::new(attempts, Duration::from_secs(interval_secs)),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            startup_delay: Duration::from_secs(startup_delay_secs),
            replication_wait: Duration::from_secs(replication_wait_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
            log_level,
            sync,
        })
    }

    /// Hostname of the load-balanced primary service.
    pub fn primary_service_host(&self) -> String {
        format!("{}-ha.{}.svc", self.cluster_name, self.namespace)
    }

    /// Hostname of the load-balanced replica service.
    pub fn replica_service_host(&self) -> String {
        format!("{}-replicas.{}.svc", self.cluster_name, self.namespace)
    }

    /// Map the configured log level onto a tracing level directive.
    pub fn tracing_level(&self) -> &'static str {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warning" | "warn" => "warn",
            "error" => "error",
            "critical" => "error",
            _ => "info",
        }
    }
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
        None => Ok(default),
    }
}
