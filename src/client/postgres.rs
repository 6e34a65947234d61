//! tokio-postgres backed implementation of the database capability.
//!
//! Each connection owns a background task driving the wire protocol; the
//! task ends when the client half is dropped. tokio-postgres runs in
//! auto-commit mode outside explicit transactions, which is exactly what
//! the probe requires for cross-connection visibility of its DDL.

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::{ConnectParams, DbConnection, DbDriver, DbError};

/// Production database driver.
pub struct PostgresDriver;

#[async_trait]
impl DbDriver for PostgresDriver {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DbConnection>, DbError> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&params.host)
            .port(params.port)
            .dbname(&params.dbname)
            .user(&params.user)
            .password(&params.password)
            .ssl_mode(params.ssl_mode.into())
            .connect_timeout(params.connect_timeout);

        // `sslmode=require` semantics: encrypt the session without
        // verifying the certificate chain, matching libpq. Operator-managed
        // clusters serve operator-issued certificates.
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        let tls = postgres_native_tls::MakeTlsConnector::new(connector);

        debug!(host = %params.host, dbname = %params.dbname, user = %params.user, "Connecting to PostgreSQL");
        let (client, connection) = config.connect(tls).await?;

        let io_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "PostgreSQL connection task ended with error");
            }
        });

        Ok(Box::new(PostgresConnection {
            client: Some(client),
            io_task: Some(io_task),
        }))
    }
}

/// A live connection plus the task driving its socket.
pub struct PostgresConnection {
    client: Option<tokio_postgres::Client>,
    io_task: Option<JoinHandle<()>>,
}

impl PostgresConnection {
    fn client(&self) -> Result<&tokio_postgres::Client, DbError> {
        self.client.as_ref().ok_or(DbError::Closed)
    }
}

#[async_trait]
impl DbConnection for PostgresConnection {
    async fn execute(&self, statement: &str) -> Result<(), DbError> {
        // Simple-query protocol: no prepared-statement cache to invalidate
        // when the active role changes mid-session.
        self.client()?.batch_execute(statement).await?;
        Ok(())
    }

    async fn query_count(&self, statement: &str) -> Result<i64, DbError> {
        let row = self.client()?.query_one(statement, &[]).await?;
        row.try_get::<_, i64>(0)
            .map_err(|e| DbError::UnexpectedResult(e.to_string()))
    }

    async fn query_string(&self, statement: &str) -> Result<String, DbError> {
        let row = self.client()?.query_one(statement, &[]).await?;
        row.try_get::<_, String>(0)
            .map_err(|e| DbError::UnexpectedResult(e.to_string()))
    }

    async fn close(&mut self) {
        // Dropping the client ends the background connection task.
        self.client.take();
        if let Some(io_task) = self.io_task.take() {
            if let Err(e) = io_task.await {
                debug!(error = %e, "PostgreSQL connection task panicked during close");
            }
        }
    }
}
