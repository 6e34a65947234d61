//! Deployment-sync call-out.
//!
//! After a fully successful test run the probe can notify ArgoCD to sync
//! the application that owns this cluster, promoting the deployment. The
//! call-out is an opaque capability to the orchestrator; its failure is
//! logged and never fatal to a cycle's outcome.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SyncConfig;

/// Timeout for the sync request.
const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the sync call-out.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sync rejected with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Capability to trigger an external deployment sync.
#[async_trait]
pub trait SyncTrigger: Send + Sync {
    async fn trigger_sync(&self) -> Result<(), SyncError>;
}

/// ArgoCD-backed sync trigger.
pub struct ArgoCdSync {
    config: SyncConfig,
    client: reqwest::Client,
}

impl ArgoCdSync {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let mut builder = reqwest::Client::builder().timeout(SYNC_TIMEOUT);
        if !config.verify_tls {
            // ArgoCD deployments frequently serve self-signed certificates.
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }
}

/// URL of the application-sync endpoint.
fn sync_url(service_address: &str, app_name: &str) -> String {
    format!("https://{service_address}/api/v1/applications/{app_name}/sync")
}

#[async_trait]
impl SyncTrigger for ArgoCdSync {
    async fn trigger_sync(&self) -> Result<(), SyncError> {
        let url = sync_url(&self.config.service_address, &self.config.app_name);
        debug!(%url, "Posting application sync request");

        let response = self
            .client
            .post(&url)
            .header(
                reqwest::header::COOKIE,
                format!("argocd.token={}", self.config.token),
            )
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(app = %self.config.app_name, "Application sync requested");
            debug!(%status, "Sync response");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SyncError::Rejected { status, body })
        }
    }
}
