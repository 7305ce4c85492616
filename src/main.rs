// ABOUTME: Entry point for the tether CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use std::path::Path;
use tether::config::{self, Config};
use tether::error::Result;
use tether::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    if let Err(e) = run(cli.command, output.clone()).await {
        output.error(None, &e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;

    match command {
        Commands::Init { host, user, force } => {
            config::init_config(&cwd, host.as_deref(), user.as_deref(), force)?;
            output.progress(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Hosts { destination } => {
            let config = load_config(&cwd, destination.as_deref())?;
            commands::list_hosts(&config, &output)
        }
        Commands::Exec {
            destination,
            parallel,
            command,
        } => {
            let config = load_config(&cwd, destination.as_deref())?;
            commands::exec_command(config, command, parallel, output).await
        }
    }
}

fn load_config(dir: &Path, destination: Option<&str>) -> Result<Config> {
    let config = Config::discover(dir)?;

    // Apply destination overrides if specified
    match destination {
        Some(dest) => config.for_destination(dest),
        None => Ok(config),
    }
}
