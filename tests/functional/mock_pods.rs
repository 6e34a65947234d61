//! In-memory double for the pod-listing capability.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use pg_self_test::probe::error::DiscoveryError;
use pg_self_test::probe::pods::{PodInfo, PodLister};

/// Scriptable cluster membership.
#[derive(Default)]
pub struct MockPodState {
    /// Name of the pod currently labeled `role=master`, if any.
    pub primary: Option<String>,
    /// Pods labeled `role=replica`.
    pub replicas: Vec<PodInfo>,
    /// When set, every list call fails.
    pub fail: bool,
}

/// The pod-lister double handed to the orchestrator.
#[derive(Clone, Default)]
pub struct MockPodLister {
    state: Arc<Mutex<MockPodState>>,
}

impl MockPodLister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the scriptable state for setup.
    pub fn state(&self) -> MutexGuard<'_, MockPodState> {
        self.state.lock().unwrap()
    }

    /// Label this pod name as the primary.
    pub fn set_primary(&self, pod_name: &str) {
        self.state().primary = Some(pod_name.to_string());
    }

    /// Add a replica pod with an assigned IP.
    pub fn add_replica(&self, name: &str, ip: &str) {
        self.state().replicas.push(PodInfo {
            name: name.to_string(),
            ip: Some(ip.to_string()),
        });
    }
}

#[async_trait]
impl PodLister for MockPodLister {
    async fn list_pods(
        &self,
        _namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodInfo>, DiscoveryError> {
        let state = self.state.lock().unwrap();
        if state.fail {
            return Err(DiscoveryError::Other("api server unavailable".to_string()));
        }
        if label_selector.contains("role=master") {
            Ok(state
                .primary
                .iter()
                .map(|name| PodInfo {
                    name: name.clone(),
                    ip: Some("10.0.0.1".to_string()),
                })
                .collect())
        } else if label_selector.contains("role=replica") {
            Ok(state.replicas.clone())
        } else {
            Ok(Vec::new())
        }
    }
}
