//! The test-cycle orchestrator.
//!
//! Drives one full create → replicate-wait → validate → cleanup sequence.
//! Branch failures (a replica that cannot be reached, a row count that is
//! off) are recorded in the cycle report and never abort sibling branches;
//! the only fatal condition is exhausting the admin connection retries,
//! since nothing can proceed without the administrative role. Cleanup runs
//! regardless of how the cycle went, covering every connection scope that
//! was successfully opened, in reverse dependency order.

use tracing::{debug, error, info, warn};

use crate::client::{statements, ConnectParams, DbConnection, DbDriver, DbError};
use crate::config::ProbeConfig;
use crate::credentials::TestCredential;
use crate::probe::connections::{ConnectionScope, ConnectionSet};
use crate::probe::context::ProbeContext;
use crate::probe::discovery::discover_replicas;
use crate::probe::error::ValidationError;
use crate::probe::pods::PodLister;
use crate::probe::role::{detect_role, Role};
use crate::sync::SyncTrigger;

/// Database the admin connection attaches to.
pub const ADMIN_DB: &str = "postgres";
/// Name of the throwaway test database.
pub const TEST_DB: &str = "test_db";
/// Name of the test schema.
pub const TEST_SCHEMA: &str = "test_schema";
/// Name of the seeded test table.
pub const TEST_TABLE: &str = "test_table";
/// Rows seeded into the test table; every validation expects exactly this.
pub const EXPECTED_ROWS: i64 = 1000;

/// How one cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The pod was a replica at admit time; a normal outcome, no work done.
    NotPrimary,
    /// Role detection failed; the tick is skipped without touching the
    /// promotion state, since neither role was observed.
    RoleUnknown,
    /// Admin connection retries were exhausted; the cycle was aborted
    /// before anything was created.
    AdminUnavailable,
    /// The cycle ran to completion (possibly with recorded failures).
    Completed(CycleReport),
}

/// What happened during a completed cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Replica pods individually checked.
    pub replicas_checked: usize,
    /// Validation branches that failed; empty means all checks passed.
    pub validation_failures: Vec<ValidationError>,
    /// Teardown steps that failed. Logged and counted, never masking an
    /// otherwise-successful validation outcome.
    pub cleanup_failures: usize,
    /// No replicas were found: the cluster is not highly available.
    pub degraded: bool,
}

impl CycleReport {
    /// True when every validation branch passed.
    pub fn passed(&self) -> bool {
        self.validation_failures.is_empty()
    }
}

/// Which test objects a cycle has (attempted to) create, driving cleanup.
/// Flags are set on attempt, not success: a duplicate-creation error means
/// a leftover from an interrupted prior cycle, which cleanup should drop.
#[derive(Debug, Default)]
struct DatasetState {
    role_provisioned: bool,
    database_created: bool,
    schema_created: bool,
    table_created: bool,
}

/// One run of the test orchestration protocol.
pub struct TestCycle<'a> {
    config: &'a ProbeConfig,
    driver: &'a dyn DbDriver,
    pods: &'a dyn PodLister,
    sync: Option<&'a dyn SyncTrigger>,
    credential: &'a TestCredential,
}

impl<'a> TestCycle<'a> {
    pub fn new(ctx: &'a ProbeContext) -> Self {
        Self {
            config: &ctx.config,
            driver: ctx.driver.as_ref(),
            pods: ctx.pods.as_ref(),
            sync: ctx.sync.as_deref(),
            credential: &ctx.credential,
        }
    }

    /// Run one full cycle to its defined completion.
    pub async fn run(&self) -> CycleOutcome {
        info!("Starting new self-test run");

        // Admit: replicas idle, only the primary tests.
        let role = match detect_role(
            self.pods,
            &self.config.namespace,
            &self.config.cluster_name,
            &self.config.pod_name,
        )
        .await
        {
            Ok(role) => role,
            Err(e) => {
                warn!(error = %e, "Role detection failed, skipping this cycle");
                return CycleOutcome::RoleUnknown;
            }
        };
        if role == Role::Replica {
            info!("Not primary at test time; see the primary pod's log for test results");
            return CycleOutcome::NotPrimary;
        }

        let mut conns = ConnectionSet::new();
        conns
            .open_admin(self.driver, &self.admin_params(), self.config.conn_retry)
            .await;
        if conns.admin().is_none() {
            // Nothing was created, so cleanup is a no-op.
            error!("No admin connection available, aborting cycle");
            return CycleOutcome::AdminUnavailable;
        }

        let mut report = CycleReport::default();
        let mut dataset = DatasetState::default();

        self.provision_and_validate_primary(&mut conns, &mut dataset, &mut report)
            .await;

        if dataset.table_created {
            // Fixed wait for asynchronous replication; a wrong count after
            // the wait is itself the signal of a replication problem.
            debug!(wait = ?self.config.replication_wait, "Waiting for replication");
            tokio::time::sleep(self.config.replication_wait).await;
            self.validate_replicas(&mut conns, &mut report).await;
        }

        self.cleanup(&mut conns, &dataset, &mut report).await;
        debug_assert!(conns.is_empty(), "cycle finished with live connections");

        if report.passed() {
            info!(
                replicas = report.replicas_checked,
                "All self-test validations passed"
            );
            if let Some(sync) = self.sync {
                if let Err(e) = sync.trigger_sync().await {
                    warn!(error = %e, "Deployment sync failed");
                }
            }
        } else {
            warn!(
                failures = report.validation_failures.len(),
                "Self-test run finished with validation failures"
            );
        }

        CycleOutcome::Completed(report)
    }

    /// Provision the test role and database on the admin connection, then
    /// create and validate the dataset on the primary test connection.
    async fn provision_and_validate_primary(
        &self,
        conns: &mut ConnectionSet,
        dataset: &mut DatasetState,
        report: &mut CycleReport,
    ) {
        let provisioned = match conns.admin() {
            Some(admin) => self.provision_on_admin(admin, dataset, report).await,
            None => false,
        };
        if !provisioned {
            return;
        }

        let params = self.test_params(self.config.primary_service_host());
        if !conns
            .open_test(ConnectionScope::TestPrimary, self.driver, &params)
            .await
        {
            report
                .validation_failures
                .push(ValidationError::ConnectionUnavailable {
                    scope: ConnectionScope::TestPrimary,
                });
            return;
        }
        let Some(test_conn) = conns.test_primary() else {
            return;
        };

        info!("Creating test schema in {TEST_DB}");
        if let Err(e) = test_conn.execute(&statements::create_schema(TEST_SCHEMA)).await {
            warn!(error = %e, "Test schema creation failed (may be left over from an interrupted run)");
        }
        dataset.schema_created = true;

        info!("Creating test table with {EXPECTED_ROWS} rows");
        if let Err(e) = test_conn
            .execute(&statements::create_seeded_table(
                TEST_SCHEMA,
                TEST_TABLE,
                EXPECTED_ROWS,
            ))
            .await
        {
            warn!(error = %e, "Test table creation failed (may be left over from an interrupted run)");
        }
        dataset.table_created = true;

        self.validate_count(test_conn, ConnectionScope::TestPrimary, report)
            .await;
    }

    /// Steps on the admin connection: version banner, role provisioning,
    /// database creation. Returns whether dataset creation may proceed.
    async fn provision_on_admin(
        &self,
        admin: &dyn DbConnection,
        dataset: &mut DatasetState,
        report: &mut CycleReport,
    ) -> bool {
        match admin.query_string(statements::SERVER_VERSION).await {
            Ok(version) => info!(%version, "PostgreSQL server version"),
            Err(e) => warn!(error = %e, "Failed to query server version"),
        }

        info!(user = %self.credential.user, "Provisioning test role");
        match admin
            .execute(&statements::create_role(
                &self.credential.user,
                self.credential.password(),
            ))
            .await
        {
            Ok(()) => {
                if let Err(e) = admin
                    .execute(&statements::elevate_role(&self.credential.user))
                    .await
                {
                    warn!(error = %e, "Failed to grant privileges to the test role");
                }
            }
            // Duplicate creation is expected when an interrupted prior
            // cycle left the role behind; cleanup drops it either way.
            Err(e) => warn!(error = %e, "Test role creation failed (may already exist)"),
        }
        dataset.role_provisioned = true;

        // The test credential owns everything it creates from here on.
        if let Err(e) = admin
            .execute(&statements::set_role(&self.credential.user))
            .await
        {
            warn!(error = %e, "Failed to switch to the test role");
            report.validation_failures.push(ValidationError::Statement {
                scope: ConnectionScope::AdminPrimary,
                source: e,
            });
            return false;
        }

        info!("Creating test database {TEST_DB}");
        match admin.execute(&statements::create_database(TEST_DB)).await {
            Ok(()) => {
                if let Err(e) = admin
                    .execute(&statements::grant_database(TEST_DB, &self.credential.user))
                    .await
                {
                    warn!(error = %e, "Failed to grant test database privileges");
                }
            }
            Err(e) => warn!(error = %e, "Test database creation failed (may already exist)"),
        }
        dataset.database_created = true;

        true
    }

    /// Discover replicas and validate the dataset through the replica
    /// service and through every individually addressed replica pod.
    async fn validate_replicas(&self, conns: &mut ConnectionSet, report: &mut CycleReport) {
        let replicas = match discover_replicas(
            self.pods,
            &self.config.namespace,
            &self.config.cluster_name,
        )
        .await
        {
            Ok(replicas) => replicas,
            Err(e) => {
                warn!(error = %e, "Replica discovery failed, skipping replica validation");
                report.degraded = true;
                return;
            }
        };
        if replicas.is_empty() {
            warn!("No replica pods detected; this cluster is not highly available");
            report.degraded = true;
            return;
        }

        // The replica service load-balances and may land on any replica.
        let params = self.test_params(self.config.replica_service_host());
        if conns
            .open_test(ConnectionScope::TestReplicaService, self.driver, &params)
            .await
        {
            if let Some(conn) = conns.test_replica_service() {
                self.validate_count(conn, ConnectionScope::TestReplicaService, report)
                    .await;
            }
        } else {
            report
                .validation_failures
                .push(ValidationError::ConnectionUnavailable {
                    scope: ConnectionScope::TestReplicaService,
                });
        }

        // Also check each replica pod directly: the service only proves one
        // of them caught up. A failure on one pod must not stop the others.
        for pod in replicas.iter() {
            let scope = ConnectionScope::TestReplicaPod(pod.name.clone());
            let params = self.test_params(pod.ip.clone());
            if conns.open_test(scope.clone(), self.driver, &params).await {
                if let Some(conn) = conns.replica_pod() {
                    self.validate_count(conn, scope.clone(), report).await;
                    report.replicas_checked += 1;
                }
                conns.close(&scope).await;
            } else {
                report
                    .validation_failures
                    .push(ValidationError::ConnectionUnavailable { scope });
            }
        }
    }

    /// Count the rows visible through one connection and record the result.
    async fn validate_count(
        &self,
        conn: &dyn DbConnection,
        scope: ConnectionScope,
        report: &mut CycleReport,
    ) {
        info!(%scope, expected = EXPECTED_ROWS, "Validating test data");
        match conn
            .query_count(&statements::count_rows(TEST_SCHEMA, TEST_TABLE))
            .await
        {
            Ok(found) if found == EXPECTED_ROWS => {
                info!(%scope, "Validation succeeded");
            }
            Ok(found) => {
                warn!(%scope, found, expected = EXPECTED_ROWS, "Row count mismatch");
                report
                    .validation_failures
                    .push(ValidationError::RowCountMismatch {
                        scope,
                        expected: EXPECTED_ROWS,
                        found,
                    });
            }
            Err(e) => {
                warn!(%scope, error = %e, "Validation query failed");
                report
                    .validation_failures
                    .push(ValidationError::Statement { scope, source: e });
            }
        }
    }

    /// Tear down everything the cycle created, in reverse dependency
    /// order. Each step is independently guarded: one failed or absent
    /// connection never blocks cleanup on the others.
    async fn cleanup(
        &self,
        conns: &mut ConnectionSet,
        dataset: &DatasetState,
        report: &mut CycleReport,
    ) {
        info!("Cleaning up test objects and connections");

        conns.close_current_replica_pod().await;
        conns.close(&ConnectionScope::TestReplicaService).await;

        if let Some(conn) = conns.test_primary() {
            if dataset.table_created {
                let result = conn
                    .execute(&statements::drop_table(TEST_SCHEMA, TEST_TABLE))
                    .await;
                record_cleanup(result, "drop test table", report);
            }
            if dataset.schema_created {
                let result = conn.execute(&statements::drop_schema(TEST_SCHEMA)).await;
                record_cleanup(result, "drop test schema", report);
            }
        }
        conns.close(&ConnectionScope::TestPrimary).await;

        if let Some(admin) = conns.admin() {
            if dataset.role_provisioned || dataset.database_created {
                let result = admin
                    .execute(&statements::set_role(&self.config.admin_user))
                    .await;
                record_cleanup(result, "switch back to admin role", report);
            }
            if dataset.database_created {
                // Every test_db connection is closed by now, so the drop
                // can take the database lock.
                let result = admin.execute(&statements::drop_database(TEST_DB)).await;
                record_cleanup(result, "drop test database", report);
            }
            if dataset.role_provisioned {
                let result = admin
                    .execute(&statements::drop_role(&self.credential.user))
                    .await;
                record_cleanup(result, "drop test role", report);
            }
        }
        conns.close(&ConnectionScope::AdminPrimary).await;
    }

    fn admin_params(&self) -> ConnectParams {
        let mut params = ConnectParams::new(
            self.config.primary_service_host(),
            self.config.service_port,
            ADMIN_DB,
            self.config.admin_user.clone(),
            self.config.admin_password.clone(),
            self.config.ssl_mode,
        );
        params.connect_timeout = self.config.connect_timeout;
        params
    }

    fn test_params(&self, host: String) -> ConnectParams {
        let mut params = ConnectParams::new(
            host,
            self.config.service_port,
            TEST_DB,
            self.credential.user.clone(),
            self.credential.password().to_string(),
            self.config.ssl_mode,
        );
        params.connect_timeout = self.config.connect_timeout;
        params
    }
}

fn record_cleanup(result: Result<(), DbError>, action: &str, report: &mut CycleReport) {
    match result {
        Ok(()) => info!(action, "Cleanup step succeeded"),
        Err(e) => {
            warn!(action, error = %e, "Cleanup step failed");
            report.cleanup_failures += 1;
        }
    }
}
