//! # hines CLI
//!
//! Discretizes cable cells into control volumes and integrates passive
//! membrane voltage with the Hines tree solver.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hines_cli::HinesCli;

fn main() {
    let cli = HinesCli::parse();

    // Logging honours RUST_LOG; --verbose raises the default to debug
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(err) = cli.execute() {
        error!("Command failed: {}", err);
        std::process::exit(1);
    }
}
