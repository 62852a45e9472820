use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config;

#[derive(Parser, Debug)]
#[command(
    name = "netrecorder",
    version,
    about = "Records per-host network traffic into periodic snapshots"
)]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(
        long,
        short,
        global = true,
        env = "CONFIG_FILE",
        default_value = config::DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Capture traffic and commit period stats (default when no subcommand given)
    Record,
    /// Print daily per-group totals from the database as JSON
    Report(ReportArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ReportArgs {
    /// Number of local days to include, counting today
    #[arg(
        long,
        default_value_t = config::DEFAULT_REPORT_DAYS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub days: u32,

    /// Local timezone as seconds east of UTC (e.g. 43200 for UTC+12)
    #[arg(
        long,
        default_value_t = 0,
        allow_hyphen_values = true,
        value_parser = validate_utc_offset
    )]
    pub utc_offset: i32,
}

fn validate_utc_offset(s: &str) -> Result<i32, String> {
    let secs: i32 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a number of seconds"))?;
    if secs.unsigned_abs() >= 86_400 {
        return Err(format!("offset must be within ±86399 seconds, got {secs}"));
    }
    Ok(secs)
}
