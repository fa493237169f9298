//! Resolve command - run one resolution without the HTTP layer

use crate::cli::args::ResolveArgs;
use crate::config::Config;
use crate::error::DepotResult;
use crate::service::Depot;

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, config: &Config) -> DepotResult<()> {
    let depot = Depot::from_config(config)?;
    let info = depot.resolver().resolve_update(&args.slug).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
