pub mod bridge;
pub mod config;
pub mod materialize;
pub mod paths;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sandbox-bootstrap")]
#[command(
    author,
    version,
    about = "Mirror a source tree into an interpreter sandbox and bridge its terminal"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "SANDBOX_BOOTSTRAP_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy the source tree (and configured assets) into the sandbox
    Materialize(materialize::MaterializeArgs),

    /// Bootstrap the sandbox, then start its entry point with the terminal bridge
    Run(run::RunArgs),

    /// Terminal bridge diagnostics
    Bridge(bridge::BridgeArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Show resolved directory paths
    Paths,
}
