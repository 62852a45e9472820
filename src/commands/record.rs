//! `record`: the long-running capture process.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::capture::decode::EthernetDecoder;
use crate::capture::CaptureEngine;
use crate::config::AppConfig;
use crate::core::{PeriodSink, Recorder};
use crate::db::Database;
use crate::services::{BackgroundServices, GroupSummarySink};

/// Start capture and the commit timer, then block until Ctrl-C.
///
/// Start order: database, recorder, capture engine, timers. On shutdown the
/// capture thread is joined first and the open period is committed so the
/// last partial interval is not lost.
pub async fn run_record(config: AppConfig) -> Result<()> {
    let db_path = &config.database.path;
    let database = Arc::new(
        Database::open(db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!("Database opened at {}", db_path.display());

    let sink: Arc<dyn PeriodSink> = Arc::new(GroupSummarySink::new(
        Arc::clone(&database) as Arc<dyn PeriodSink>,
        config.classifier(),
    ));
    let recorder = Arc::new(Recorder::new(
        config.capture.networks.clone(),
        Box::new(EthernetDecoder),
        sink,
    ));
    if config.capture.networks.is_empty() {
        tracing::info!("No monitored networks configured; counting all IPv4 traffic");
    } else {
        tracing::info!(
            "Monitoring {} network(s): {}",
            config.capture.networks.len(),
            config
                .capture
                .networks
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let engine = CaptureEngine::start(&config.capture, Arc::clone(&recorder))?;
    let services = BackgroundServices::start(&recorder, &database, &config);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    tracing::info!("Shutdown requested");

    services.shutdown();
    tokio::task::spawn_blocking(move || {
        engine.join();
        recorder.commit();
    })
    .await
    .context("final commit task failed")?;

    tracing::info!("Recorder stopped");
    Ok(())
}
