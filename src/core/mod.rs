//! Core logic: subnet matching, device groups, period accounting.
//!
//! - [`address`]: `NetworkBinding` and subnet membership
//! - [`GroupClassifier`]: address → device group, plus read-time folding
//! - [`PeriodAccumulator`]: counters for the open period
//! - [`Recorder`]: frame intake, rollover, hand-off to a [`PeriodSink`]

pub mod accumulator;
pub mod address;
pub mod groups;
pub mod recorder;
pub mod stats;

pub use accumulator::PeriodAccumulator;
pub use address::NetworkBinding;
pub use groups::{DeviceGroup, GroupClassifier, GroupStats};
pub use recorder::{PeriodSink, Recorder};
pub use stats::{DeviceStats, PeriodStats};
