//! Period recorder: wires captured frames into the open period and rolls
//! periods over on a timer.
//!
//! The accumulator sits behind a single mutex. `handle_frame` and the
//! rollover in `commit` each hold it only for their counter work; the
//! finished snapshot is handed to the [`PeriodSink`] after the lock is
//! released, so storage latency never stalls capture.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::capture::decode::FrameDecoder;
use crate::core::accumulator::PeriodAccumulator;
use crate::core::address::NetworkBinding;
use crate::core::stats::PeriodStats;

/// Destination for finished periods.
///
/// Implementations own the snapshot once `save` is called. Errors are
/// reported back only so the recorder can log them; the recorder never
/// retries.
pub trait PeriodSink: Send + Sync {
    fn save(&self, stats: PeriodStats) -> anyhow::Result<()>;
}

/// Thread-safe recorder for the open period.
pub struct Recorder {
    accumulator: Mutex<PeriodAccumulator>,
    decoder: Box<dyn FrameDecoder>,
    sink: Arc<dyn PeriodSink>,
}

impl Recorder {
    /// Open the first period at `Utc::now()`.
    pub fn new(
        monitored: Vec<NetworkBinding>,
        decoder: Box<dyn FrameDecoder>,
        sink: Arc<dyn PeriodSink>,
    ) -> Self {
        Self::starting_at(Utc::now(), monitored, decoder, sink)
    }

    pub fn starting_at(
        period_start: DateTime<Utc>,
        monitored: Vec<NetworkBinding>,
        decoder: Box<dyn FrameDecoder>,
        sink: Arc<dyn PeriodSink>,
    ) -> Self {
        Self {
            accumulator: Mutex::new(PeriodAccumulator::new(period_start, monitored)),
            decoder,
            sink,
        }
    }

    /// A poisoned lock still guards consistent counters: every mutation
    /// under it is a handful of additions that cannot panic midway.
    fn lock(&self) -> MutexGuard<'_, PeriodAccumulator> {
        self.accumulator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one captured frame. Called from the capture loop.
    ///
    /// Frames that do not decode to an IPv4 packet are dropped silently.
    /// Returns whether any counter changed.
    pub fn handle_frame(&self, frame: &[u8], truncated: bool) -> bool {
        let Some(packet) = self.decoder.decode(frame) else {
            return false;
        };
        if truncated {
            tracing::trace!(
                "Truncated frame ({} captured bytes) from {}",
                frame.len(),
                packet.source
            );
        }
        self.lock()
            .record(packet.source, packet.destination, packet.payload_len)
    }

    /// Copy of the open period.
    pub fn current(&self) -> PeriodStats {
        self.lock().stats().clone()
    }

    /// Close the open period now and hand it to the sink.
    pub fn commit(&self) {
        self.commit_with(Utc::now);
    }

    /// Close the open period at `now`, open the next one at the same instant,
    /// and hand the finished snapshot to the sink.
    ///
    /// A sink failure is logged and the snapshot is dropped. The new period
    /// is open either way.
    pub fn commit_at(&self, now: DateTime<Utc>) {
        self.commit_with(|| now);
    }

    /// `clock` is read while the accumulator is locked, so concurrent
    /// commits close periods in the order their timestamps were taken.
    fn commit_with(&self, clock: impl FnOnce() -> DateTime<Utc>) {
        let (now, mut finished) = {
            let mut accumulator = self.lock();
            let now = clock();
            (now, accumulator.reset(now))
        };

        finished.period_len = (now - finished.period_start)
            .to_std()
            .unwrap_or(Duration::ZERO);

        tracing::debug!(
            "Closing period {} (+{:?}): {} devices, {} bytes, {} packets",
            finished.period_start,
            finished.period_len,
            finished.devices.len(),
            finished.total_bytes,
            finished.total_packets
        );

        let devices = finished.devices.len();
        if let Err(e) = self.sink.save(finished) {
            tracing::warn!("Failed to persist period stats ({devices} devices dropped): {e:#}");
        }
    }

    /// Spawn the commit timer. The first commit happens one full `interval`
    /// after the call. Each commit runs on the blocking pool.
    pub fn start_committer(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let recorder = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval() yields immediately on the first tick.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let recorder = Arc::clone(&recorder);
                if let Err(e) = tokio::task::spawn_blocking(move || recorder.commit()).await {
                    tracing::error!("Commit task panicked: {e}");
                }
            }
        })
    }
}
