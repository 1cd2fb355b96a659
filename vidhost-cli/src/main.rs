//! Vidhost CLI - Command-line interface
//!
//! Runs the streaming server and inspects how files would be served.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use vidhost_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "vidhost")]
#[command(about = "A video hosting server with ranged streaming")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level (RUST_LOG overrides)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    /// Directory for the full debug log of the last run
    #[arg(long, default_value = "logs", global = true)]
    logs_dir: PathBuf,

    /// Log to the console only
    #[arg(long, global = true)]
    no_run_log: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logs_dir = (!cli.no_run_log).then_some(cli.logs_dir.as_path());
    init_tracing(cli.log_level.as_tracing_level(), logs_dir)?;

    commands::handle_command(cli.command).await
}
