// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hoist")]
#[command(about = "Release-based deployments and server provisioning over SSH")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output, for CI
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a hoist.yml configuration file
    Init {
        /// Project name
        #[arg(short, long)]
        project: Option<String>,

        /// Server hostname
        #[arg(long)]
        host: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Build and activate a new release
    Deploy {
        /// Local .tar.gz to upload and deploy instead of cloning the repository
        #[arg(short, long)]
        bundle: Option<PathBuf>,
    },

    /// Re-activate an earlier release
    Rollback {
        /// Release id (YYYYMMDDHHMMSS)
        release: String,
    },

    /// Install a container engine, git, and a firewall baseline on the server
    Setup,

    /// Sample CPU, memory, disk, and uptime on the server
    Pulse,

    /// List releases on the server and the one that is live
    Releases,
}
