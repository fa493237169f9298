//! Depot - caching update proxy
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use depot::cli::{Cli, Commands};
use depot::config::ConfigManager;
use depot::error::DepotResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> DepotResult<()> {
    let cli = Cli::parse();

    // Completions need neither logging nor config
    if let Commands::Completions { shell } = cli.command {
        return depot::cli::commands::completions(shell);
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // The log format lives in the config; log while loading it as text
    let config = {
        let loading = tracing_subscriber::fmt()
            .with_env_filter(env_filter(cli.verbose))
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();
        let _guard = tracing::subscriber::set_default(loading);
        config_manager.load().await?
    };

    let filter = env_filter(cli.verbose);
    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
    debug!("Loaded configuration from {}", config_manager.path().display());

    match cli.command {
        Commands::Completions { .. } => unreachable!("Completions handled above"),
        Commands::Serve(args) => depot::cli::commands::serve(args, &config).await,
        Commands::Resolve(args) => depot::cli::commands::resolve(args, &config).await,
        Commands::Check(args) => depot::cli::commands::check(args, &config).await,
        Commands::Cache(args) => depot::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            depot::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// Logging filter: 0 = warn, 1 = info, 2+ = debug
fn env_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("depot=warn"),
        1 => EnvFilter::new("depot=info"),
        _ => EnvFilter::new("depot=debug"),
    }
}
