use anyhow::Result;
use clap::Parser;

use sandbox_bootstrap::cli::{self, Cli, Commands};
use sandbox_bootstrap::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Single-threaded: one materialization pass, one input session at a time.
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    // Logs go to stderr; stdout carries relayed sandbox output.
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Materialize(args) => cli::materialize::run(args, &config),
        Commands::Run(args) => cli::run::run(args, &config).await,
        Commands::Bridge(args) => cli::bridge::run(args).await,
        Commands::Config(args) => cli::config::run(args, config),
        Commands::Paths => cli::paths::run(&config),
    }
}
