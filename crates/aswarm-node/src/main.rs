//! # A-SWARM Federation Node
//!
//! Serves the federation stream for one cluster. See the library docs for
//! the startup sequence and `config` for the environment variables.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use aswarm_federation::adapters::tcp;
use aswarm_federation::{FederationService, InMemorySketchStore, SystemTimeSource};
use aswarm_node::config::log_settings;
use aswarm_node::logging::LogSettings;
use aswarm_node::{init_logging, load_keyring, NodeSettings};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&LogSettings::from_env())?;

    let settings = NodeSettings::from_env()?;
    log_settings(&settings);
    let keyring = load_keyring(settings.keyring_path.as_deref())?;

    let port = settings.federation.listen_port;
    let service = Arc::new(
        FederationService::new(
            settings.federation,
            Arc::new(InMemorySketchStore::new()),
            Arc::new(keyring),
            Arc::new(SystemTimeSource),
        )
        .context("failed to construct federation service")?,
    );

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind federation listener on {}", addr))?;
    info!(%addr, cluster_id = service.cluster_id(), "Federation node listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = tokio::spawn(tcp::serve(listener, Arc::clone(&service), shutdown_rx.clone()));

    let metrics = service.metrics();
    let interval = settings.metrics_interval;
    let mut metrics_shutdown = shutdown_rx;
    let reporter = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = metrics.snapshot();
                    info!(
                        total = snapshot.total_requests(),
                        success = snapshot.success,
                        rejected = snapshot.rejected(),
                        replay_detected = snapshot.replay_detected,
                        invalid_signature = snapshot.invalid_signature,
                        rate_limited = snapshot.rate_limited,
                        sketches_stored = snapshot.sketches_stored,
                        sketches_exported = snapshot.sketches_exported,
                        "Federation metrics"
                    );
                }
                _ = metrics_shutdown.changed() => break,
            }
        }
    });

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("Initiating graceful shutdown...");
    if let Err(e) = shutdown_tx.send(true) {
        error!("Failed to send shutdown signal: {}", e);
    }

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Federation server exited with error"),
        Err(e) => error!(error = %e, "Federation server task panicked"),
    }
    if let Err(e) = reporter.await {
        error!(error = %e, "Metrics reporter task panicked");
    }

    info!("Shutdown complete");
    Ok(())
}
