//! Database client module.
//!
//! Defines the narrow capability interface the probe core uses to talk to
//! PostgreSQL ([`DbDriver`] / [`DbConnection`]) and a tokio-postgres backed
//! implementation. The orchestrator only ever sees the traits, so its tests
//! run against in-memory doubles.
//!
//! ## Architecture
//!
//! - `params`: connection parameters and SSL mode
//! - `statements`: parameterized DDL/DML builders with identifier quoting
//! - `postgres`: the production driver (tokio-postgres + native-tls)

pub mod params;
pub mod postgres;
pub mod statements;

pub use params::{ConnectParams, SslMode, DEFAULT_CONNECT_TIMEOUT};
pub use postgres::PostgresDriver;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("postgres driver error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("TLS configuration error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("connection already closed")]
    Closed,

    #[error("unexpected query result: {0}")]
    UnexpectedResult(String),
}

/// A single live database connection.
///
/// Connections run in auto-commit mode: every statement is committed as it
/// executes, so DDL issued on one connection is immediately visible to
/// others. Cross-connection replication validation depends on this.
#[async_trait]
pub trait DbConnection: Send + Sync {
    /// Execute a statement, discarding any result rows.
    async fn execute(&self, statement: &str) -> Result<(), DbError>;

    /// Run a query expected to return a single bigint (e.g. a row count).
    async fn query_count(&self, statement: &str) -> Result<i64, DbError>;

    /// Run a query expected to return a single text value.
    async fn query_string(&self, statement: &str) -> Result<String, DbError>;

    /// Close the connection. Idempotent.
    async fn close(&mut self);
}

/// Capability to open database connections.
#[async_trait]
pub trait DbDriver: Send + Sync {
    /// Open a new connection. One network connection is established per
    /// call; the returned handle is exclusively owned by the caller.
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DbConnection>, DbError>;
}
