//! Moldstore CLI Binary
//!
//! Command-line interface for the moldstore table service.

use anyhow::Context;
use clap::Parser;
use moldstore::logging::init_logging;
use moldstore::tooling::cli::{load_config, Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = load_config(cli.config.as_deref()).context("Error loading configuration")?;
    init_logging(Some(&cli.logging_config(&config.logging)))
        .context("Error initializing logging")?;

    let context = CliContext::from_config(config).context("Error initializing store")?;
    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
