//! `report`: daily per-group totals read back from storage.
//!
//! Pure helpers (`report_window`, `build_report`) take plain values so they
//! can be unit-tested without a database.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::cli::ReportArgs;
use crate::config::AppConfig;
use crate::core::{GroupClassifier, GroupStats, PeriodStats};
use crate::db::{local_midnight_utc, Database};

/// One local day of traffic, folded into device groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    /// Local midnight, as a UTC instant.
    pub day: DateTime<Utc>,
    /// Seconds of recorded periods that started on this day.
    pub recorded_secs: u64,
    pub total_bytes: u64,
    pub total_packets: u64,
    pub groups: Vec<GroupStats>,
}

/// `[from, to)` covering the last `days` local days up to `now`.
pub fn report_window(
    now: DateTime<Utc>,
    days: u32,
    offset: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(&offset).date_naive();
    let first = today - chrono::Duration::days(i64::from(days.saturating_sub(1)));
    (local_midnight_utc(first, offset), now)
}

/// Fold each day's devices into groups.
pub fn build_report(days: &[PeriodStats], classifier: &GroupClassifier) -> Vec<DailyReport> {
    days.iter()
        .map(|day| DailyReport {
            day: day.period_start,
            recorded_secs: day.period_len.as_secs(),
            total_bytes: day.total_bytes,
            total_packets: day.total_packets,
            groups: classifier.fold(day),
        })
        .collect()
}

/// Print the report for `args` to stdout as pretty JSON.
pub fn run_report(config: &AppConfig, args: &ReportArgs) -> Result<()> {
    let offset = FixedOffset::east_opt(args.utc_offset)
        .ok_or_else(|| anyhow!("invalid UTC offset {}", args.utc_offset))?;

    let db_path = &config.database.path;
    let database = Database::open(db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    let (from, to) = report_window(Utc::now(), args.days, offset);
    tracing::debug!("Reporting periods from {from} to {to}");
    let days = database.daily_period_stats(from, to, offset)?;
    tracing::debug!("Read {} days of history", days.len());

    let report = build_report(&days, &config.classifier());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
