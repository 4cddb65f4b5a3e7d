//! # azsqldiag
//!
//! Terminal diagnostics for Azure SQL databases, backed by Log Analytics.
//!
//! ## Usage
//!
//! ```bash
//! # Failed SQL statements in the last 30 minutes
//! azsqldiag errors 30
//!
//! # Queries slower than 2000ms in the default window
//! azsqldiag slow-queries 10 2000
//! ```

mod api;
mod client;
mod commands;
mod config;
mod credentials;
mod display;
mod error;
mod kql;
mod logger;
mod rows;
mod runner;

use crate::commands::Commands;
use crate::runner::{Runnable, Runner};
use clap::Parser;

#[derive(Parser)]
#[command(
    arg_required_else_help = true,
    name = "azsqldiag",
    version,
    about = "Azure SQL diagnostics from Log Analytics, rendered in the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Derive a runner from the command and run it
///
/// Any handled failure prints a one-line explanation to stderr and exits 1;
/// an empty result set is success.
async fn run(command: impl Runnable) {
    if let Err(error) = command.runner().run().await {
        eprintln!("\n{} {error}", console::style("Error").red().bold());
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() {
    // Match all commands here, in one place
    match Cli::parse().command {
        Commands::Errors(cmd) => run(cmd).await,
        Commands::SlowQueries(cmd) => run(cmd).await,
    }
}
