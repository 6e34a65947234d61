// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the self-test cycle and promotion gating.
//!
//! These tests drive full test cycles against in-memory doubles of the
//! database driver and the pod lister, WITHOUT requiring a Kubernetes
//! cluster or a PostgreSQL server.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run a specific test
//! cargo test --test functional test_full_cycle_with_two_replicas
//! ```
//!
//! ## Test Categories
//!
//! - **Cycle tests**: the end-to-end protocol (provision, validate,
//!   replica fan-out, cleanup), including degraded and failure branches
//! - **Promotion tests**: exactly-once-per-promotion re-trigger behavior
//!   across role sequences
//!
//! ## Design Principles
//!
//! - **No infrastructure required**: mocks implement the same capability
//!   traits production uses, so tests exercise the real orchestrator
//! - **Fast execution**: retry intervals and waits are zero in fixtures

mod mock_pods;
mod promotion_tests;

pub use mock_db::*;
pub use mock_pods::*;

use std::sync::Arc;
use std::time::Duration;

use pg_self_test::client::SslMode;
use pg_self_test::config::ProbeConfig;
use pg_self_test::credentials::TestCredential;
use pg_self_test::probe::connections::RetryPolicy;
use pg_self_test::probe::ProbeContext;

/// Pod name the fixtures treat as "this pod".
pub const SELF_POD: &str = "hippo-instance1-0";

/// Configuration fixture with all delays zeroed.
pub fn test_config() -> ProbeConfig {
    ProbeConfig {
        namespace: "pg".to_string(),
        cluster_name: "hippo".to_string(),
        pod_name: SELF_POD.to_string(),
        admin_user: "postgres".to_string(),
        admin_password: "admin-pw".to_string(),
        service_port: 5432,
        ssl_mode: SslMode::Disable,
        conn_retry: RetryPolicy::new(3, Duration::ZERO),
        connect_timeout: Duration::from_secs(1),
        startup_delay: Duration::ZERO,
        replication_wait: Duration::ZERO,
        poll_interval: Duration::ZERO,
        log_level: "debug".to_string(),
        sync: None,
    }
}

/// Assemble a probe context over the given doubles.
pub fn test_context(driver: MockDriver, pods: MockPodLister) -> ProbeContext {
    let mut ctx = ProbeContext::new(test_config(), Arc::new(driver), Arc::new(pods), None);
    ctx.credential = TestCredential::new("test_user", "test-pw");
    ctx
}
