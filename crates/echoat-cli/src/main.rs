//! echoat entry point.
//!
//! Initializes logging and delegates to the selected subcommand.

mod cli;
mod commands;
mod server;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // RUST_LOG > --log-level
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    commands::run(cli.command).await
}
