//! Period history: inserting finished periods and reading them back.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use rusqlite::params;

use super::Database;
use crate::core::{DeviceStats, PeriodSink, PeriodStats};

impl Database {
    /// Insert one finished period and its device rows in a single
    /// transaction. Returns the number of device rows written; a period with
    /// no devices writes nothing.
    pub fn save_period_stats(&self, stats: &PeriodStats) -> Result<usize> {
        if stats.devices.is_empty() {
            tracing::info!(
                "No rows to commit for period starting {}",
                stats.period_start
            );
            return Ok(0);
        }

        let mut devices: Vec<_> = stats.devices.iter().collect();
        devices.sort_by_key(|(addr, _)| **addr);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO period (period_start, period_len, total_bytes, total_packets)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                stats.period_start.timestamp_millis(),
                duration_millis(stats.period_len),
                stats.total_bytes,
                stats.total_packets,
            ],
        )?;
        let period_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO period_stat (period_id, ip_addr, bytes_in, bytes_out, packets)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (addr, device) in &devices {
                stmt.execute(params![
                    period_id,
                    u32::from(**addr),
                    device.bytes_in,
                    device.bytes_out,
                    device.packets,
                ])?;
            }
        }
        tx.commit()?;

        Ok(devices.len())
    }

    /// Periods whose start lies in `[from, to)`, oldest first.
    pub fn query_period_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PeriodStats>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT p.id, p.period_start, p.period_len, p.total_bytes, p.total_packets,
                    s.ip_addr, s.bytes_in, s.bytes_out, s.packets
             FROM period p
             LEFT JOIN period_stat s ON s.period_id = p.id
             WHERE p.period_start >= ?1 AND p.period_start < ?2
             ORDER BY p.period_start ASC, p.id ASC",
        )?;

        let rows = stmt.query_map(
            params![from.timestamp_millis(), to.timestamp_millis()],
            map_period_row,
        )?;

        let mut periods: Vec<PeriodStats> = Vec::new();
        let mut current_id = None;
        for row in rows {
            let row = row?;
            if current_id != Some(row.period_id) {
                current_id = Some(row.period_id);
                let period_start = DateTime::<Utc>::from_timestamp_millis(row.period_start)
                    .ok_or_else(|| anyhow!("invalid period_start {}", row.period_start))?;
                let mut period = PeriodStats::new(period_start);
                period.period_len = Duration::from_millis(row.period_len.max(0) as u64);
                period.total_bytes = row.total_bytes;
                period.total_packets = row.total_packets;
                periods.push(period);
            }
            if let (Some((addr, device)), Some(period)) = (row.device, periods.last_mut()) {
                period.devices.insert(addr, device);
            }
        }
        Ok(periods)
    }

    /// Periods in `[from, to)` summed per local calendar day.
    pub fn daily_period_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<Vec<PeriodStats>> {
        Ok(roll_up_daily(self.query_period_stats(from, to)?, offset))
    }

    /// Prune periods older than the specified number of days.
    pub fn prune_old_records(&self, max_age_days: u64) -> Result<usize> {
        let cutoff = i64::try_from(max_age_days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| anyhow!("retention of {max_age_days} days is out of range"))?;
        let cutoff_ms = cutoff.timestamp_millis();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM period_stat
             WHERE period_id IN (SELECT id FROM period WHERE period_start < ?1)",
            params![cutoff_ms],
        )?;
        let deleted = tx.execute(
            "DELETE FROM period WHERE period_start < ?1",
            params![cutoff_ms],
        )?;
        tx.commit()?;

        if deleted > 0 {
            tracing::info!("Pruned {deleted} periods older than {max_age_days} days");
        }
        Ok(deleted)
    }
}

impl PeriodSink for Database {
    fn save(&self, stats: PeriodStats) -> Result<()> {
        let rows = self.save_period_stats(&stats)?;
        if rows > 0 {
            tracing::debug!("Committed {rows} rows to the database");
        }
        Ok(())
    }
}

/// Sum periods into one entry per calendar day in `offset`.
///
/// Each day starts at local midnight; its `period_len` is the total recorded
/// time that day and its devices are summed across periods.
pub fn roll_up_daily(periods: Vec<PeriodStats>, offset: FixedOffset) -> Vec<PeriodStats> {
    let mut days: BTreeMap<NaiveDate, PeriodStats> = BTreeMap::new();

    for period in periods {
        let date = period.period_start.with_timezone(&offset).date_naive();
        let day = days
            .entry(date)
            .or_insert_with(|| PeriodStats::new(local_midnight_utc(date, offset)));

        day.period_len += period.period_len;
        day.total_bytes += period.total_bytes;
        day.total_packets += period.total_packets;
        for (addr, device) in period.devices {
            let total = day.device_mut(addr);
            total.bytes_in += device.bytes_in;
            total.bytes_out += device.bytes_out;
            total.packets += device.packets;
        }
    }

    days.into_values().collect()
}

/// UTC instant of midnight on `date` in `offset`.
pub fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local_midnight = date.and_time(NaiveTime::MIN);
    (local_midnight - chrono::Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

struct PeriodRow {
    period_id: i64,
    period_start: i64,
    period_len: i64,
    total_bytes: u64,
    total_packets: u64,
    device: Option<(Ipv4Addr, DeviceStats)>,
}

fn map_period_row(row: &rusqlite::Row) -> rusqlite::Result<PeriodRow> {
    let ip_addr: Option<u32> = row.get(5)?;
    let device = match ip_addr {
        Some(ip) => Some((
            Ipv4Addr::from(ip),
            DeviceStats {
                bytes_in: row.get(6)?,
                bytes_out: row.get(7)?,
                packets: row.get(8)?,
            },
        )),
        None => None,
    };
    Ok(PeriodRow {
        period_id: row.get(0)?,
        period_start: row.get(1)?,
        period_len: row.get(2)?,
        total_bytes: row.get(3)?,
        total_packets: row.get(4)?,
        device,
    })
}
