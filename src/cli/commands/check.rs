//! Check command - poll a depot for a newer release

use crate::cli::args::CheckArgs;
use crate::config::Config;
use crate::error::{DepotError, DepotResult};
use crate::poll::UpdateChecker;
use console::style;
use std::time::Duration;

/// Execute the check command
pub async fn execute(args: CheckArgs, config: &Config) -> DepotResult<()> {
    let base_url = args
        .base_url
        .or_else(|| config.poll.base_url.clone())
        .ok_or(DepotError::MissingParameter("poll.base_url"))?;
    let slug = args
        .slug
        .or_else(|| config.poll.slug.clone())
        .ok_or(DepotError::MissingParameter("poll.slug"))?;

    let checker = UpdateChecker::new(
        base_url,
        slug.clone(),
        Duration::from_secs(config.upstream.timeout_secs),
    );

    match checker.on_update_check(&args.current).await? {
        Some(update) => {
            println!(
                "{} {} {} -> {}",
                style("↑").green(),
                style(&slug).cyan(),
                args.current,
                style(&update.version).green().bold()
            );
            println!("  download: {}", update.download_url);
            println!("  tested:   {}", update.tested);
            println!("  requires: {}", update.requires);
        }
        None => {
            println!(
                "{} {} {} is up to date",
                style("✓").green(),
                style(&slug).cyan(),
                args.current
            );
        }
    }

    Ok(())
}
