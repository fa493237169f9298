//! Cached artifact inventory
//!
//! Walks the store and describes each published archive. Staging directories
//! and partial files (dot-prefixed) are never reported.

use crate::cache::store::ArtifactStore;
use crate::error::{DepotError, DepotResult};
use crate::version::DottedVersion;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Hash a file's contents using SHA256, returning the first 12 hex chars
pub fn short_digest(path: &Path) -> DepotResult<String> {
    let mut file = fs::File::open(path)
        .map_err(|e| DepotError::io(format!("reading artifact {}", path.display()), e))?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| DepotError::io(format!("hashing artifact {}", path.display()), e))?;
    let result = hasher.finalize();

    Ok(hex::encode(&result[..6]))
}

/// One published archive
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    /// Package identifier
    pub slug: String,
    /// Release version
    pub version: String,
    /// Canonical archive path
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// When the archive was published
    pub built_at: DateTime<Utc>,
}

impl CachedArtifact {
    /// Short content digest of the archive
    pub fn digest(&self) -> DepotResult<String> {
        short_digest(&self.path)
    }
}

impl ArtifactStore {
    /// List every published artifact, sorted by slug then version
    pub fn list(&self) -> DepotResult<Vec<CachedArtifact>> {
        let mut artifacts = Vec::new();

        for slug_dir in visible_dirs(self.root())? {
            let slug = file_name(&slug_dir);
            for version_dir in visible_dirs(&slug_dir)? {
                let path = version_dir.join(format!("{}.zip", slug));
                let Ok(metadata) = fs::metadata(&path) else {
                    continue;
                };
                if !metadata.is_file() {
                    continue;
                }

                let built_at = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());

                artifacts.push(CachedArtifact {
                    slug: slug.clone(),
                    version: file_name(&version_dir),
                    path,
                    size_bytes: metadata.len(),
                    built_at,
                });
            }
        }

        artifacts.sort_by(|a, b| {
            a.slug.cmp(&b.slug).then_with(|| {
                DottedVersion::parse(&a.version).cmp(&DottedVersion::parse(&b.version))
            })
        });
        Ok(artifacts)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Non-hidden subdirectories; a missing directory is empty
fn visible_dirs(dir: &Path) -> DepotResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DepotError::io(format!("listing {}", dir.display()), e)),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DepotError::io(format!("listing {}", dir.display()), e))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && !hidden {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}
