//! Pod-listing capability.
//!
//! The probe reads cluster state exclusively through [`PodLister`], a
//! narrow interface over "list pods by label selector". Production uses
//! the in-cluster Kubernetes client; tests substitute an in-memory double.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use tracing::debug;

use crate::probe::error::DiscoveryError;

/// Label carrying a pod's database role (`master` or `replica`).
pub const ROLE_LABEL: &str = "postgres-operator.crunchydata.com/role";
/// Label carrying the cluster name.
pub const CLUSTER_LABEL: &str = "postgres-operator.crunchydata.com/cluster";

/// Build the selector for pods with a given role in a given cluster.
pub fn role_selector(role: &str, cluster_name: &str) -> String {
    format!("{ROLE_LABEL}={role},{CLUSTER_LABEL}={cluster_name}")
}

/// Identity of a pod as far as the probe cares: name plus (if assigned)
/// its IP.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodInfo {
    pub name: String,
    pub ip: Option<String>,
}

/// Capability to list pods by label selector.
#[async_trait]
pub trait PodLister: Send + Sync {
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodInfo>, DiscoveryError>;
}

/// Pod lister backed by the in-cluster Kubernetes client.
///
/// The client is created once at startup and reused read-only across all
/// cycles; it is dropped only at process shutdown.
pub struct KubePodLister {
    client: Client,
}

impl KubePodLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodLister for KubePodLister {
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodInfo>, DiscoveryError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(label_selector);
        let list = api.list(&params).await?;

        debug!(
            namespace,
            label_selector,
            count = list.items.len(),
            "Listed pods"
        );

        Ok(list
            .items
            .into_iter()
            .filter_map(|pod| {
                let name = pod.metadata.name?;
                let ip = pod.status.and_then(|s| s.pod_ip);
                Some(PodInfo { name, ip })
            })
            .collect())
    }
}
