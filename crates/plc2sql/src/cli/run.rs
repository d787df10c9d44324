//! `plc2sql run`: acquisition under the recovery supervisor until Ctrl-C.

use super::{load_config, open_database};
use anyhow::{Context, Result};
use plc2sql::supervisor::{RecoverySupervisor, RestartPolicy};
use plc2sql::{alert, source, SessionSettings, TagRegistry};
use std::path::Path;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run(config_path: &Path, verbose: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config).await?;

    // Startup validation: bad tag rows stop the process here instead of
    // looping in the supervisor.
    let registry = TagRegistry::load(&db, Instant::now())
        .await
        .context("Failed to load tag registry")?;
    if registry.is_empty() {
        warn!("No tags configured; cycles will read nothing");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping after the current cycle");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                warn!("Ctrl-C handler unavailable: {}", err);
                // keep the sender alive; a dropped sender reads as shutdown
                std::future::pending::<()>().await;
            }
        }
    });

    let supervisor = RecoverySupervisor::new(
        db.clone(),
        source::from_config(&config.source),
        alert::from_config(&config.alert),
        SessionSettings::from_config(&config, verbose),
        RestartPolicy::from(&config.recovery),
    );

    let report = supervisor.run(registry, shutdown_rx).await;
    info!(
        sessions = report.sessions,
        restarts = report.restarts,
        alerts = report.alerts,
        "PLC2SQL stopped"
    );
    match db.acquisition_stats().await {
        Ok(stats) => info!(
            history_rows = stats.history_rows,
            live_rows = stats.live_rows,
            event_rows = stats.event_rows,
            "Store totals"
        ),
        Err(err) => warn!("Could not read store totals: {}", err),
    }

    db.close().await;
    Ok(())
}
