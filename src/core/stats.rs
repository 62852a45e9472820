//! Per-period traffic statistics.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Running counters for a single host address within one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets: u64,
}

/// Statistics for a single accounting period.
///
/// Every counted packet adds its length to `total_bytes` exactly once and
/// to one `bytes_out` (source side) and one `bytes_in` (destination side).
/// Without subnet filtering this gives `total_bytes == Σ bytes_out ==
/// Σ bytes_in` and `Σ packets == 2 * total_packets`. With filtering only the
/// monitored side(s) of a packet are attributed, while the totals still count
/// the packet once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub period_start: DateTime<Utc>,
    /// Zero while the period is open; set at rollover.
    pub period_len: Duration,
    pub total_bytes: u64,
    pub total_packets: u64,
    pub devices: HashMap<Ipv4Addr, DeviceStats>,
}

impl PeriodStats {
    /// Blank statistics for a period opened at `period_start`.
    pub fn new(period_start: DateTime<Utc>) -> Self {
        Self {
            period_start,
            period_len: Duration::ZERO,
            total_bytes: 0,
            total_packets: 0,
            devices: HashMap::new(),
        }
    }

    /// Counters for `address`, created zeroed on first access.
    pub fn device_mut(&mut self, address: Ipv4Addr) -> &mut DeviceStats {
        self.devices.entry(address).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.total_packets == 0
    }

    pub fn sum_bytes_in(&self) -> u64 {
        self.devices.values().map(|d| d.bytes_in).sum()
    }

    pub fn sum_bytes_out(&self) -> u64 {
        self.devices.values().map(|d| d.bytes_out).sum()
    }

    /// Sum of per-device `packets`. Each packet counts once per attributed
    /// endpoint.
    pub fn sum_packets(&self) -> u64 {
        self.devices.values().map(|d| d.packets).sum()
    }
}
