//! pg-self-test - a self-test sidecar for replicated PostgreSQL clusters.
//!
//! This is the main entry point that:
//! - Loads configuration from the environment
//! - Initializes structured logging
//! - Creates the Kubernetes client
//! - Runs the probe loop until the process is terminated

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::info;

use pg_self_test::client::PostgresDriver;
use pg_self_test::config::ProbeConfig;
use pg_self_test::probe::pods::KubePodLister;
use pg_self_test::probe::ProbeContext;
use pg_self_test::run_probe;
use pg_self_test::sync::{ArgoCdSync, SyncTrigger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ProbeConfig::from_env()?;

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("pg_self_test={}", config.tracing_level()).parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!(
        cluster = %config.cluster_name,
        namespace = %config.namespace,
        pod = %config.pod_name,
        "Starting pg-self-test probe"
    );

    // Create Kubernetes client (process-wide, reused read-only across all
    // cycles, dropped at shutdown)
    let kube_client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let pods = Arc::new(KubePodLister::new(kube_client));
    let driver = Arc::new(PostgresDriver);
    let sync: Option<Arc<dyn SyncTrigger>> = match &config.sync {
        Some(sync_config) => {
            info!(app = %sync_config.app_name, "Deployment sync enabled");
            Some(Arc::new(ArgoCdSync::new(sync_config.clone())?))
        }
        None => None,
    };

    let ctx = ProbeContext::new(config, driver, pods, sync);

    tokio::select! {
        _ = run_probe(ctx) => {
            // run_probe loops forever; reaching here means it ended
            info!("Probe loop ended unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping probe");
        }
    }

    info!("Probe stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the probe cannot shut
/// down gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
