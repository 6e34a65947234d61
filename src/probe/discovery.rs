//! Replica pod discovery.
//!
//! Pod membership can change between cycles, so discovery is re-run every
//! cycle and the result treated as a snapshot, never live-updated.

use tracing::debug;

use crate::probe::error::DiscoveryError;
use crate::probe::pods::{role_selector, PodLister};

/// A replica pod the probe can address directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaPod {
    pub name: String,
    pub ip: String,
}

/// Snapshot of the replica pods at discovery time.
#[derive(Clone, Debug, Default)]
pub struct ReplicaPodSet {
    pods: Vec<ReplicaPod>,
}

impl ReplicaPodSet {
    pub fn has_replicas(&self) -> bool {
        !self.pods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplicaPod> {
        self.pods.iter()
    }
}

/// List the replica pods for the cluster. An empty set is a valid result
/// (single-node deployment), not an error.
pub async fn discover_replicas(
    pods: &dyn PodLister,
    namespace: &str,
    cluster_name: &str,
) -> Result<ReplicaPodSet, DiscoveryError> {
    let selector = role_selector("replica", cluster_name);
    let listed = pods.list_pods(namespace, &selector).await?;

    let mut replicas = Vec::with_capacity(listed.len());
    for pod in listed {
        match pod.ip {
            Some(ip) => replicas.push(ReplicaPod { name: pod.name, ip }),
            // No IP yet means the pod is still scheduling; it cannot be
            // validated this cycle.
            None => debug!(pod = %pod.name, "Skipping replica pod without an assigned IP"),
        }
    }

    debug!(count = replicas.len(), "Discovered replica pods");
    Ok(ReplicaPodSet { pods: replicas })
}
