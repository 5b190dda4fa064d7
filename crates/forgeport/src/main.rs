//! Forgeport CLI - build and publish installer packages
//!
//! This is the main entry point for the forgeport command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let globals = cli.globals();
    match cli.command {
        Commands::Import(args) => commands::import::run(args, &globals).await,
        Commands::Build(args) => commands::build::run(args, &globals).await,
        Commands::Describe(args) => commands::describe::run(args, &globals).await,
        Commands::Templates(args) => commands::templates::run(args, &globals).await,
        Commands::Signature(cmd) => commands::signature::run(cmd, &globals).await,
        Commands::Config(cmd) => commands::config::run(cmd, &globals),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
