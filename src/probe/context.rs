//! Shared probe context.
//!
//! One explicit session object, built at process start and alive until
//! shutdown, instead of ambient globals: configuration, the capability
//! implementations, and the process-lifetime test credential.

use std::sync::Arc;

use crate::client::DbDriver;
use crate::config::ProbeConfig;
use crate::credentials::TestCredential;
use crate::probe::pods::PodLister;
use crate::sync::SyncTrigger;

/// Process-wide state passed to each cycle.
pub struct ProbeContext {
    /// Probe configuration.
    pub config: ProbeConfig,
    /// Database driver capability.
    pub driver: Arc<dyn DbDriver>,
    /// Pod-listing capability.
    pub pods: Arc<dyn PodLister>,
    /// Deployment-sync capability, when configured.
    pub sync: Option<Arc<dyn SyncTrigger>>,
    /// Test credential, generated once and reused across cycles.
    pub credential: TestCredential,
}

impl ProbeContext {
    /// Build the context, generating the process-lifetime test credential.
    pub fn new(
        config: ProbeConfig,
        driver: Arc<dyn DbDriver>,
        pods: Arc<dyn PodLister>,
        sync: Option<Arc<dyn SyncTrigger>>,
    ) -> Self {
        Self {
            config,
            driver,
            pods,
            sync,
            credential: TestCredential::generate(),
        }
    }
}
