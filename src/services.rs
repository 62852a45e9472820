//! Background service lifecycle management.
//!
//! `BackgroundServices` owns the tasks spawned at startup:
//! 1. Commit timer (period rollover every `capture.interval` seconds)
//! 2. Retention pruner (hourly, only when `database.retentionDays > 0`)

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{self, AppConfig};
use crate::core::{GroupClassifier, PeriodSink, PeriodStats, Recorder};
use crate::db::Database;

/// Handles to the background tasks spawned during startup.
pub struct BackgroundServices {
    committer: JoinHandle<()>,
    pruner: Option<JoinHandle<()>>,
}

impl BackgroundServices {
    /// Start all background services. Must be called inside a tokio runtime.
    pub fn start(recorder: &Arc<Recorder>, database: &Arc<Database>, config: &AppConfig) -> Self {
        let committer = recorder.start_committer(config.capture.commit_interval);
        tracing::info!(
            "Committing period stats every {}s",
            config.capture.commit_interval.as_secs()
        );

        let pruner = (config.database.retention_days > 0).then(|| {
            Self::start_retention_pruner(Arc::clone(database), config.database.retention_days)
        });

        Self { committer, pruner }
    }

    fn start_retention_pruner(db: Arc<Database>, retention_days: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(
                config::RETENTION_CHECK_INTERVAL_SECS,
            ));
            loop {
                ticker.tick().await;
                let db = Arc::clone(&db);
                match tokio::task::spawn_blocking(move || db.prune_old_records(retention_days)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!("Failed to prune old periods: {e:#}"),
                    Err(e) => tracing::error!("Retention task panicked: {e}"),
                }
            }
        })
    }

    /// Stop the timers. Periods still open stay in the recorder.
    pub fn shutdown(self) {
        self.committer.abort();
        if let Some(pruner) = self.pruner {
            pruner.abort();
        }
    }
}

// ===========================================================================
// Sink adapters
// ===========================================================================

/// Logs a per-group breakdown of each finished period at debug level, then
/// forwards it unchanged. Grouping never reaches storage.
pub struct GroupSummarySink {
    inner: Arc<dyn PeriodSink>,
    classifier: GroupClassifier,
}

impl GroupSummarySink {
    pub fn new(inner: Arc<dyn PeriodSink>, classifier: GroupClassifier) -> Self {
        Self { inner, classifier }
    }
}

impl PeriodSink for GroupSummarySink {
    fn save(&self, stats: PeriodStats) -> anyhow::Result<()> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            for group in self.classifier.fold(&stats) {
                if group.devices == 0 {
                    continue;
                }
                tracing::debug!(
                    "  {}: \u{2193}{} \u{2191}{} ({} devices, {} packets)",
                    group.name,
                    format_bytes_compact(group.bytes_in),
                    format_bytes_compact(group.bytes_out),
                    group.devices,
                    group.packets
                );
            }
        }
        self.inner.save(stats)
    }
}

/// Format a byte count in a compact human-readable form.
pub fn format_bytes_compact(bytes: u64) -> String {
    let b = bytes as f64;
    if b < 1024.0 {
        format!("{bytes} B")
    } else if b < 1024.0 * 1024.0 {
        format!("{:.1} KB", b / 1024.0)
    } else if b < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", b / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", b / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recorder::tests::MemorySink;
    use crate::core::DeviceGroup;
    use chrono::Utc;
    use std::net::Ipv4Addr;

    #[test]
    fn test_format_bytes_compact_bytes() {
        assert_eq!(format_bytes_compact(0), "0 B");
        assert_eq!(format_bytes_compact(512), "512 B");
        assert_eq!(format_bytes_compact(1023), "1023 B");
    }

    #[test]
    fn test_format_bytes_compact_kilobytes() {
        assert_eq!(format_bytes_compact(1024), "1.0 KB");
        assert_eq!(format_bytes_compact(1536), "1.5 KB");
    }

    #[test]
    fn test_format_bytes_compact_megabytes_and_gigabytes() {
        assert_eq!(format_bytes_compact(1_048_576), "1.00 MB");
        assert_eq!(format_bytes_compact(2_621_440), "2.50 MB");
        assert_eq!(format_bytes_compact(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_group_summary_sink_forwards_snapshot_unchanged() {
        let memory = Arc::new(MemorySink::default());
        let classifier = GroupClassifier::new(
            vec![DeviceGroup::new("LAN", vec!["10.0.0.0/8".parse().unwrap()])],
            "Other",
        );
        let sink = GroupSummarySink::new(memory.clone(), classifier);

        let mut stats = PeriodStats::new(Utc::now());
        stats.device_mut(Ipv4Addr::new(10, 0, 0, 1)).bytes_out = 99;
        stats.total_bytes = 99;
        stats.total_packets = 1;

        sink.save(stats.clone()).unwrap();
        assert_eq!(*memory.saved.lock().unwrap(), vec![stats]);
    }

    #[tokio::test]
    async fn test_services_start_and_shutdown() {
        let config = AppConfig::from_json(
            r#"{ "capture": { "device": "lo", "interval": 3600 },
                 "database": { "retentionDays": 30 },
                 "defaultGroup": "All" }"#,
        )
        .unwrap();
        let database = Arc::new(Database::open_in_memory().unwrap());
        let recorder = Arc::new(Recorder::new(
            Vec::new(),
            Box::new(crate::capture::decode::EthernetDecoder),
            database.clone(),
        ));

        let services = BackgroundServices::start(&recorder, &database, &config);
        assert!(services.pruner.is_some());
        tokio::task::yield_now().await;
        services.shutdown();
    }
}
