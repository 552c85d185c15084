// ABOUTME: Entry point for the hoist CLI application.
// ABOUTME: Parses arguments, sets up tracing, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use hoist::config::{self, Config};
use hoist::error::Result;
use hoist::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
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
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;
    match command {
        Commands::Init {
            project,
            host,
            force,
        } => {
            config::init_config(&cwd, project.as_deref(), host.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Deploy { bundle } => {
            let config = Config::discover(&cwd)?;
            commands::deploy(&cwd, config, bundle, output).await
        }
        Commands::Rollback { release } => {
            let config = Config::discover(&cwd)?;
            commands::rollback(&cwd, config, &release, output).await
        }
        Commands::Setup => {
            let config = Config::discover(&cwd)?;
            commands::setup(config, output).await
        }
        Commands::Pulse => {
            let config = Config::discover(&cwd)?;
            commands::pulse(config, output).await
        }
        Commands::Releases => {
            let config = Config::discover(&cwd)?;
            commands::releases(config, output).await
        }
    }
}
