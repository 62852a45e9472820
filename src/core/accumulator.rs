//! Mutable aggregation state for the open period.
//!
//! The accumulator is not synchronised on its own; the [`Recorder`] holds
//! it behind a mutex so that `record` and `reset` never interleave.
//!
//! [`Recorder`]: crate::core::recorder::Recorder

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};

use crate::core::address::{matches_any, NetworkBinding};
use crate::core::stats::PeriodStats;

/// Counters for the currently open period plus the subnet filter applied to
/// every recorded packet.
#[derive(Debug)]
pub struct PeriodAccumulator {
    stats: PeriodStats,
    monitored: Vec<NetworkBinding>,
}

impl PeriodAccumulator {
    /// Open a blank period at `period_start`. An empty `monitored` list
    /// disables subnet filtering.
    pub fn new(period_start: DateTime<Utc>, monitored: Vec<NetworkBinding>) -> Self {
        Self {
            stats: PeriodStats::new(period_start),
            monitored,
        }
    }

    pub fn period_start(&self) -> DateTime<Utc> {
        self.stats.period_start
    }

    /// Read-only view of the open period.
    pub fn stats(&self) -> &PeriodStats {
        &self.stats
    }

    /// Attribute one packet of `payload_bytes` to its endpoints.
    ///
    /// Returns `false` when subnet filtering is on and neither endpoint is in
    /// a monitored network; nothing is touched in that case.
    pub fn record(&mut self, src: Ipv4Addr, dst: Ipv4Addr, payload_bytes: u64) -> bool {
        let (count_src, count_dst) = if self.monitored.is_empty() {
            (true, true)
        } else {
            (
                matches_any(src, &self.monitored),
                matches_any(dst, &self.monitored),
            )
        };

        if !count_src && !count_dst {
            return false;
        }

        if count_src {
            let device = self.stats.device_mut(src);
            device.bytes_out += payload_bytes;
            device.packets += 1;
        }
        if count_dst {
            let device = self.stats.device_mut(dst);
            device.bytes_in += payload_bytes;
            device.packets += 1;
        }

        self.stats.total_bytes += payload_bytes;
        self.stats.total_packets += 1;
        true
    }

    /// Close the open period and start a blank one at `new_start`.
    ///
    /// The returned value is owned outright; nothing recorded afterwards can
    /// reach it.
    pub fn reset(&mut self, new_start: DateTime<Utc>) -> PeriodStats {
        std::mem::replace(&mut self.stats, PeriodStats::new(new_start))
    }
}
