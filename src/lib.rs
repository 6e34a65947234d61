//! pg-self-test library crate.
//!
//! A self-test probe that runs as a sidecar in every pod of a replicated
//! PostgreSQL cluster. On the primary it provisions a throwaway credential
//! and dataset, waits for replication, validates the dataset from the
//! replica service and from every replica pod, tears everything down, and
//! re-runs exactly once per promotion.

pub mod client;
pub mod config;
pub mod credentials;
pub mod probe;
pub mod sync;

use tracing::{info, warn};

use probe::cycle::CycleOutcome;
use probe::role::{detect_role, PromotionGate};
use probe::{ProbeContext, TestCycle};

/// Run the probe loop: one full cycle immediately, then poll the role on
/// the configured interval and re-run the cycle once per promotion.
///
/// Never returns under normal operation; the process is terminated
/// externally. A cycle in progress always runs to its defined completion,
/// since the only sleeps are between cycles.
pub async fn run_probe(ctx: ProbeContext) {
    let mut gate = PromotionGate::new();

    // Give the pod time to settle before the first cycle.
    tokio::time::sleep(ctx.config.startup_delay).await;
    let outcome = TestCycle::new(&ctx).run().await;
    apply_outcome(&mut gate, &outcome);

    loop {
        tokio::time::sleep(ctx.config.poll_interval).await;

        // The gate must see the role computed this tick, never a cached
        // one: a pod may go PRIMARY → REPLICA → PRIMARY across our
        // lifetime and must test again after the second promotion.
        let role = match detect_role(
            ctx.pods.as_ref(),
            &ctx.config.namespace,
            &ctx.config.cluster_name,
            &ctx.config.pod_name,
        )
        .await
        {
            Ok(role) => role,
            Err(e) => {
                warn!(error = %e, "Role detection failed, skipping this tick");
                continue;
            }
        };

        if gate.should_run(role) {
            info!(%role, "Untested promotion detected, starting test cycle");
            let outcome = TestCycle::new(&ctx).run().await;
            apply_outcome(&mut gate, &outcome);
        }
    }
}

/// Fold a cycle outcome into the promotion state.
pub fn apply_outcome(gate: &mut PromotionGate, outcome: &CycleOutcome) {
    match outcome {
        // A completed run counts even when validation failed: the failure
        // is reported through the log stream, and re-running a known-bad
        // cycle every tick would not make it pass.
        CycleOutcome::Completed(_) => gate.record_completed_run(),
        CycleOutcome::NotPrimary => gate.mark_replica(),
        // Neither role nor a run was observed; leave the state alone so
        // the next tick decides.
        CycleOutcome::AdminUnavailable | CycleOutcome::RoleUnknown => {}
    }
}
