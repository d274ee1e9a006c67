//! Worker process: one monitoring engine bound to one domain.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::monitoring::{Collaborators, EngineSettings, HttpProber, Lookup, MonitoringEngine, NetworkLookup, WhoisLookup};
use crate::notify::DiscordNotifier;
use crate::storage::{LogStore, MonitorStore};
use crate::supervisor::WorkerRegistry;

/// Build the production collaborators from settings
pub fn collaborators(config: &Config) -> Result<Collaborators> {
    let network: Option<Arc<dyn Lookup>> = if config.lookup.network_details {
        Some(Arc::new(NetworkLookup::new(&config.lookup.network_endpoint, config.lookup.timeout_seconds)?))
    } else {
        None
    };

    Ok(Collaborators {
        prober: Arc::new(HttpProber::new(config.monitoring.timeout_seconds)?),
        registration: Arc::new(WhoisLookup::new(
            &config.lookup.whois_server,
            config.lookup.timeout_seconds,
            &config.lookup.excluded_fields,
        )),
        network,
        notifier: Arc::new(DiscordNotifier::new(&config.notifications.username, &config.notifications.footer)),
    })
}

/// Run the engine for `domain` until SIGTERM or Ctrl-C
pub async fn run(config: &Config, domain: &str) -> Result<()> {
    let root = config.monitors_root();
    let monitor = MonitorStore::new(&root)
        .load(domain)
        .with_context(|| format!("Cannot run worker for {domain}"))?;

    let engine = MonitoringEngine::new(
        monitor,
        EngineSettings::from(&config.monitoring),
        collaborators(config)?,
        Arc::new(LogStore::new(&root)),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("Termination requested, finishing current cycle");
        let _ = shutdown_tx.send(true);
    });

    engine.run(shutdown_rx).await;

    if let Err(e) = WorkerRegistry::new(&root).mark_stopped(domain, std::process::id()) {
        warn!("Failed to record worker exit for {}: {}", domain, e);
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = terminate.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            warn!("Cannot listen for SIGTERM, only Ctrl-C will stop this worker: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}
