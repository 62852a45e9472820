//! Command handlers, one per CLI subcommand.
//!
//! - `record`: capture, period rollover, persistence until Ctrl-C
//! - `report`: daily per-group roll-up read back from the database

pub(crate) mod record;
pub(crate) mod report;
