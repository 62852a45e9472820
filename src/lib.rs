mod capture;
mod cli;
mod commands;
mod config;
mod core;
mod db;
mod error;
mod services;

use clap::Parser;

use cli::{Cli, Command};

pub use crate::core::{
    DeviceGroup, DeviceStats, GroupClassifier, GroupStats, NetworkBinding, PeriodAccumulator,
    PeriodSink, PeriodStats, Recorder,
};
pub use capture::decode::{EthernetDecoder, FrameDecoder, Packet};
pub use config::{AppConfig, CaptureOptions, DatabaseOptions};
pub use db::Database;
pub use error::RecorderError;

/// Parse the command line, load the config, and run the chosen subcommand.
pub async fn run() -> anyhow::Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in netrecorder: {info}");
        default_hook(info);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netrecorder=info,netrecorder_lib=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    tracing::debug!("Loaded config from {}", cli.config.display());

    match cli.command.unwrap_or(Command::Record) {
        Command::Record => commands::record::run_record(config).await,
        Command::Report(args) => commands::report::run_report(&config, &args),
    }
}
