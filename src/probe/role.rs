//! Role detection and the promotion gate.
//!
//! A pod is primary iff its own name appears in the set of pods the
//! operator labels `role=master` for this cluster. An empty result is not
//! an error: it simply means "not primary". The promotion gate enforces
//! at-most-once-per-promotion execution of the test cycle.

use std::fmt;

use tracing::debug;

use crate::probe::error::DiscoveryError;
use crate::probe::pods::{role_selector, PodLister};

/// Database role of the current pod at one probe tick. Recomputed from
/// cluster state every tick, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The cluster member currently accepting writes.
    Primary,
    /// A read-only member replicating from the primary.
    Replica,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Primary => write!(f, "primary"),
            Role::Replica => write!(f, "replica"),
        }
    }
}

/// Classify the current pod as primary or replica.
///
/// Read-only; tolerates an empty result set (absence is "not primary").
pub async fn detect_role(
    pods: &dyn PodLister,
    namespace: &str,
    cluster_name: &str,
    pod_name: &str,
) -> Result<Role, DiscoveryError> {
    let selector = role_selector("master", cluster_name);
    let primary_pods = pods.list_pods(namespace, &selector).await?;

    let role = if primary_pods.iter().any(|pod| pod.name == pod_name) {
        Role::Primary
    } else {
        Role::Replica
    };
    debug!(%role, pod = pod_name, "Detected role");
    Ok(role)
}

/// Tracks whether the test has run since this node last became primary.
///
/// The flag is cleared on every tick where the node is a replica, not only
/// set on success; a PRIMARY → REPLICA → PRIMARY sequence therefore
/// retests after the second promotion.
#[derive(Debug, Default)]
pub struct PromotionGate {
    has_run_as_primary: bool,
}

impl PromotionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether the cycle should run for a freshly detected role.
    /// Must be handed the role computed this tick, never a cached one.
    pub fn should_run(&mut self, current_role: Role) -> bool {
        match current_role {
            Role::Replica => {
                self.has_run_as_primary = false;
                false
            }
            Role::Primary => !self.has_run_as_primary,
        }
    }

    /// Record that a cycle ran to completion as primary.
    pub fn record_completed_run(&mut self) {
        self.has_run_as_primary = true;
    }

    /// Record that the node was a replica at admit time.
    pub fn mark_replica(&mut self) {
        self.has_run_as_primary = false;
    }

    pub fn has_run_as_primary(&self) -> bool {
        self.has_run_as_primary
    }
}
