//! Cache command - inspect published artifacts

use crate::cache::{format_bytes, ArtifactStore, CachedArtifact};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{DepotError, DepotResult};
use console::style;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> DepotResult<()> {
    let store = ArtifactStore::new(config.storage.artifacts_dir());
    debug!("Artifact store at {}", store.root().display());

    match args.action {
        CacheAction::List { format } => list_artifacts(&store, format),
        CacheAction::Path { slug, version } => show_path(&store, &slug, &version).await,
    }
}

/// List all published artifacts
fn list_artifacts(store: &ArtifactStore, format: OutputFormat) -> DepotResult<()> {
    let artifacts = store.list()?;

    if artifacts.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!("No cached artifacts found."),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&artifacts),
        OutputFormat::Json => print_json(&artifacts)?,
        OutputFormat::Plain => print_plain(&artifacts),
    }

    Ok(())
}

fn print_table(artifacts: &[CachedArtifact]) {
    println!(
        "{:<30} {:<14} {:<10} {:<14} {:<20}",
        style("PACKAGE").bold(),
        style("VERSION").bold(),
        style("SIZE").bold(),
        style("DIGEST").bold(),
        style("BUILT").bold()
    );
    println!("{}", "-".repeat(90));

    let mut total = 0;
    for artifact in artifacts {
        total += artifact.size_bytes;
        let digest = artifact
            .digest()
            .map(|d| style(d).dim().to_string())
            .unwrap_or_else(|_| style("unreadable").red().to_string());

        println!(
            "{:<30} {:<14} {:<10} {:<14} {:<20}",
            artifact.slug,
            artifact.version,
            format_bytes(artifact.size_bytes),
            digest,
            artifact.built_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!(
        "Total: {} artifact(s), {}",
        artifacts.len(),
        format_bytes(total)
    );
}

fn print_json(artifacts: &[CachedArtifact]) -> DepotResult<()> {
    #[derive(serde::Serialize)]
    struct ArtifactJson {
        slug: String,
        version: String,
        path: String,
        size_bytes: u64,
        digest: String,
        built_at: String,
    }

    let json_artifacts = artifacts
        .iter()
        .map(|a| {
            Ok(ArtifactJson {
                slug: a.slug.clone(),
                version: a.version.clone(),
                path: a.path.display().to_string(),
                size_bytes: a.size_bytes,
                digest: a.digest()?,
                built_at: a.built_at.to_rfc3339(),
            })
        })
        .collect::<DepotResult<Vec<_>>>()?;

    println!("{}", serde_json::to_string_pretty(&json_artifacts)?);
    Ok(())
}

fn print_plain(artifacts: &[CachedArtifact]) {
    for artifact in artifacts {
        println!("{} {}", artifact.slug, artifact.version);
    }
}

/// Print where a published artifact lives
async fn show_path(store: &ArtifactStore, slug: &str, version: &str) -> DepotResult<()> {
    if !store.contains(slug, version).await? {
        return Err(DepotError::ArtifactNotFound {
            slug: slug.to_string(),
            version: version.to_string(),
        });
    }
    println!("{}", store.artifact_path(slug, version)?.display());
    Ok(())
}
