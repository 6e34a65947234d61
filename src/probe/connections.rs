//! Connection lifecycle management.
//!
//! Every database connection the probe opens belongs to exactly one
//! [`ConnectionScope`], and a [`ConnectionSet`] owns at most one live
//! handle per scope for the duration of one test cycle. The admin
//! connection is the only one that retries: it races container startup,
//! so the database behind it may still be initializing when the sidecar
//! comes up. Every other scope is single-attempt, and a failure there
//! halts only the affected validation branch.

use std::fmt;
use std::time::Duration;

use tracing::{debug, error};

use crate::client::{ConnectParams, DbConnection, DbDriver};

/// The four connection scopes of a test cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionScope {
    /// Administrative connection to the `postgres` database via the
    /// primary service.
    AdminPrimary,
    /// Test-credential connection to the test database via the primary
    /// service.
    TestPrimary,
    /// Test-credential connection via the load-balanced replica service.
    TestReplicaService,
    /// Test-credential connection to one individually addressed replica
    /// pod.
    TestReplicaPod(String),
}

impl fmt::Display for ConnectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionScope::AdminPrimary => write!(f, "admin (primary service)"),
            ConnectionScope::TestPrimary => write!(f, "test database (primary service)"),
            ConnectionScope::TestReplicaService => write!(f, "test database (replica service)"),
            ConnectionScope::TestReplicaPod(pod_name) => {
                write!(f, "test database (replica pod {pod_name})")
            }
        }
    }
}

/// Bounded retry policy for the admin connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one.
    pub max_attempts: u32,
    /// Sleep between attempts.
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

/// Owns the live connections of one test cycle, one slot per scope.
#[derive(Default)]
pub struct ConnectionSet {
    admin: Option<Box<dyn DbConnection>>,
    test_primary: Option<Box<dyn DbConnection>>,
    test_replica_service: Option<Box<dyn DbConnection>>,
    test_replica_pod: Option<(String, Box<dyn DbConnection>)>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the admin connection with bounded retry.
    ///
    /// On exhaustion the slot stays unset and the error is logged, not
    /// raised; callers must check [`admin`](Self::admin) before issuing
    /// administrative statements.
    pub async fn open_admin(
        &mut self,
        driver: &dyn DbDriver,
        params: &ConnectParams,
        policy: RetryPolicy,
    ) {
        for attempt in 1..=policy.max_attempts {
            debug!(attempt, "Admin connection attempt");
            match driver.connect(params).await {
                Ok(conn) => {
                    self.admin = Some(conn);
                    return;
                }
                Err(e) if attempt < policy.max_attempts => {
                    debug!(error = %e, "Database is still initializing, will retry");
                    tokio::time::sleep(policy.interval).await;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        attempts = policy.max_attempts,
                        "Admin connection attempts exhausted"
                    );
                }
            }
        }
    }

    /// Open a test-scoped connection with a single attempt. Returns
    /// whether the connection is now present; on failure the slot stays
    /// unset and only the calling branch is affected.
    pub async fn open_test(
        &mut self,
        scope: ConnectionScope,
        driver: &dyn DbDriver,
        params: &ConnectParams,
    ) -> bool {
        match driver.connect(params).await {
            Ok(conn) => {
                match scope {
                    ConnectionScope::AdminPrimary => {
                        // Admin opens go through open_admin; treat this as
                        // a plain single-attempt open if ever requested.
                        self.replace_admin(conn).await;
                    }
                    ConnectionScope::TestPrimary => {
                        self.close(&ConnectionScope::TestPrimary).await;
                        self.test_primary = Some(conn);
                    }
                    ConnectionScope::TestReplicaService => {
                        self.close(&ConnectionScope::TestReplicaService).await;
                        self.test_replica_service = Some(conn);
                    }
                    ConnectionScope::TestReplicaPod(pod_name) => {
                        // One pod slot at a time; a leftover from an
                        // earlier pod is closed before being replaced.
                        self.close_current_replica_pod().await;
                        self.test_replica_pod = Some((pod_name, conn));
                    }
                }
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to open test connection");
                false
            }
        }
    }

    async fn replace_admin(&mut self, conn: Box<dyn DbConnection>) {
        self.close(&ConnectionScope::AdminPrimary).await;
        self.admin = Some(conn);
    }

    pub fn admin(&self) -> Option<&dyn DbConnection> {
        self.admin.as_deref()
    }

    pub fn test_primary(&self) -> Option<&dyn DbConnection> {
        self.test_primary.as_deref()
    }

    pub fn test_replica_service(&self) -> Option<&dyn DbConnection> {
        self.test_replica_service.as_deref()
    }

    /// The currently held replica-pod connection, if any.
    pub fn replica_pod(&self) -> Option<&dyn DbConnection> {
        self.test_replica_pod.as_ref().map(|(_, conn)| conn.as_ref())
    }

    /// Close the connection for a scope. Idempotent: closing an absent or
    /// already-closed scope is a no-op, never an error.
    pub async fn close(&mut self, scope: &ConnectionScope) {
        let conn = match scope {
            ConnectionScope::AdminPrimary => self.admin.take(),
            ConnectionScope::TestPrimary => self.test_primary.take(),
            ConnectionScope::TestReplicaService => self.test_replica_service.take(),
            ConnectionScope::TestReplicaPod(pod_name) => match self.test_replica_pod.take() {
                Some((held, conn)) if held == *pod_name => Some(conn),
                other => {
                    self.test_replica_pod = other;
                    None
                }
            },
        };

        if let Some(mut conn) = conn {
            conn.close().await;
            debug!(%scope, "Connection closed");
        }
    }

    /// Close whichever replica-pod connection is currently held.
    pub async fn close_current_replica_pod(&mut self) {
        if let Some((pod_name, mut conn)) = self.test_replica_pod.take() {
            conn.close().await;
            debug!(scope = %ConnectionScope::TestReplicaPod(pod_name), "Connection closed");
        }
    }

    /// True when no scope holds a live connection.
    pub fn is_empty(&self) -> bool {
        self.admin.is_none()
            && self.test_primary.is_none()
            && self.test_replica_service.is_none()
            && self.test_replica_pod.is_none()
    }
}
