//! Exactly-once-per-promotion behavior across role changes.
//!
//! Each test drives the same tick logic the probe loop runs: detect the
//! role, consult the promotion gate, run a cycle when the gate opens, and
//! fold the outcome back into the gate.

use pg_self_test::apply_outcome;
use pg_self_test::probe::role::{detect_role, PromotionGate};
use pg_self_test::probe::{ProbeContext, TestCycle};

use crate::{test_context, MockDriver, MockPodLister, SELF_POD};

/// One probe tick. Returns whether a cycle ran.
async fn tick(ctx: &ProbeContext, gate: &mut PromotionGate) -> bool {
    let role = detect_role(
        ctx.pods.as_ref(),
        &ctx.config.namespace,
        &ctx.config.cluster_name,
        &ctx.config.pod_name,
    )
    .await
    .unwrap();
    if !gate.should_run(role) {
        return false;
    }
    let outcome = TestCycle::new(ctx).run().await;
    apply_outcome(gate, &outcome);
    true
}

fn cluster_with_self_as(primary: &str) -> (MockDriver, MockPodLister) {
    let driver = MockDriver::new();
    let pods = MockPodLister::new();
    pods.set_primary(primary);
    pods.add_replica("hippo-repl1-0", "10.0.0.11");
    (driver, pods)
}

#[tokio::test]
async fn test_cycle_runs_once_per_promotion() {
    let (driver, pods) = cluster_with_self_as("hippo-instance2-0");
    let ctx = test_context(driver.clone(), pods.clone());
    let mut gate = PromotionGate::new();

    // Replica ticks: nothing runs.
    assert!(!tick(&ctx, &mut gate).await);
    assert!(!tick(&ctx, &mut gate).await);

    // Promotion: the cycle runs once, then stays quiet while primary.
    pods.set_primary(SELF_POD);
    assert!(tick(&ctx, &mut gate).await);
    assert!(!tick(&ctx, &mut gate).await);
    assert!(!tick(&ctx, &mut gate).await);

    // Demotion and re-promotion: the cycle runs again.
    pods.set_primary("hippo-instance2-0");
    assert!(!tick(&ctx, &mut gate).await);
    pods.set_primary(SELF_POD);
    assert!(tick(&ctx, &mut gate).await);

    // Two promotions, two full cycles worth of work.
    let state = driver.state();
    assert_eq!(state.count_of("CREATE DATABASE"), 2);
    assert_eq!(state.count_of("DROP DATABASE"), 2);
    assert!(state.all_connections_closed());
}

#[tokio::test]
async fn test_failed_validation_still_consumes_the_promotion() {
    let (driver, pods) = cluster_with_self_as(SELF_POD);
    driver
        .state()
        .row_counts
        .insert("10.0.0.11".to_string(), 0);

    let ctx = test_context(driver.clone(), pods);
    let mut gate = PromotionGate::new();

    // The cycle completes with a recorded failure. It still counts as the
    // run for this promotion; a known-bad cycle is not retried every tick.
    assert!(tick(&ctx, &mut gate).await);
    assert!(gate.has_run_as_primary());
    assert!(!tick(&ctx, &mut gate).await);
    assert_eq!(driver.state().count_of("CREATE DATABASE"), 1);
}

#[tokio::test]
async fn test_admin_unavailable_retries_on_the_next_tick() {
    let (driver, pods) = cluster_with_self_as(SELF_POD);
    driver.state().admin_connect_failures = 3;

    let ctx = test_context(driver.clone(), pods);
    let mut gate = PromotionGate::new();

    // All three attempts of the first tick fail, so the promotion is not
    // consumed and the next tick tries the whole cycle again.
    assert!(tick(&ctx, &mut gate).await);
    assert!(!gate.has_run_as_primary());
    assert_eq!(driver.state().count_of("CREATE DATABASE"), 0);

    assert!(tick(&ctx, &mut gate).await);
    assert!(gate.has_run_as_primary());
    assert_eq!(driver.state().count_of("CREATE DATABASE"), 1);
    assert!(driver.state().all_connections_closed());
}

#[tokio::test]
async fn test_role_change_between_gate_and_admit_is_safe() {
    let (driver, pods) = cluster_with_self_as(SELF_POD);
    let ctx = test_context(driver.clone(), pods.clone());
    let mut gate = PromotionGate::new();

    // The gate opens on the detected primary role, but the pod is demoted
    // before the cycle's own admit check. The cycle does nothing and the
    // gate is cleared, so the next promotion still triggers a run.
    let role = detect_role(
        ctx.pods.as_ref(),
        &ctx.config.namespace,
        &ctx.config.cluster_name,
        &ctx.config.pod_name,
    )
    .await
    .unwrap();
    assert!(gate.should_run(role));
    pods.set_primary("hippo-instance2-0");
    let outcome = TestCycle::new(&ctx).run().await;
    apply_outcome(&mut gate, &outcome);

    assert!(driver.state().statements.is_empty());
    assert!(!gate.has_run_as_primary());
    pods.set_primary(SELF_POD);
    assert!(tick(&ctx, &mut gate).await);
    assert_eq!(driver.state().count_of("CREATE DATABASE"), 1);
}
