//! Versioned artifact store on the local filesystem
//!
//! Layout: `{root}/{slug}/{version}/{slug}.zip`. The path is the cache entry;
//! nothing about an artifact is held in memory between requests.

use crate::error::{DepotError, DepotResult};
use crate::version::is_path_safe;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Outcome of publishing a staged archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    /// The staged file was moved into place
    Created,
    /// Another writer published first; the staged file was discarded
    AlreadyPresent,
}

/// Filesystem-backed artifact store
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root` (created lazily on first publish)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every file of one (slug, version)
    pub fn version_dir(&self, slug: &str, version: &str) -> DepotResult<PathBuf> {
        if !is_path_safe(slug) {
            return Err(DepotError::InvalidPackage(slug.to_string()));
        }
        if !is_path_safe(version) {
            return Err(DepotError::InvalidVersion(version.to_string()));
        }
        Ok(self.root.join(slug).join(version))
    }

    /// Canonical artifact path for (slug, version)
    pub fn artifact_path(&self, slug: &str, version: &str) -> DepotResult<PathBuf> {
        Ok(self
            .version_dir(slug, version)?
            .join(format!("{}.zip", slug)))
    }

    /// Cheap existence check used by the cache-hit fast path
    pub async fn contains(&self, slug: &str, version: &str) -> DepotResult<bool> {
        let path = self.artifact_path(slug, version)?;
        Ok(tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false))
    }

    /// Create the version directory if needed
    pub async fn ensure_version_dir(&self, slug: &str, version: &str) -> DepotResult<PathBuf> {
        let dir = self.version_dir(slug, version)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DepotError::io(format!("creating {}", dir.display()), e))?;
        Ok(dir)
    }

    /// Atomically move a fully written archive to its canonical path.
    ///
    /// The staged file must live on the same filesystem as `dest`. An existing
    /// artifact is never overwritten.
    pub fn publish(staged: NamedTempFile, dest: &Path) -> DepotResult<Published> {
        staged
            .as_file()
            .sync_all()
            .map_err(|e| DepotError::io(format!("syncing archive for {}", dest.display()), e))?;

        match staged.persist_noclobber(dest) {
            Ok(_) => {
                info!("Published {}", dest.display());
                Ok(Published::Created)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} already published, discarding duplicate", dest.display());
                Ok(Published::AlreadyPresent)
            }
            Err(e) => Err(DepotError::io(
                format!("publishing {}", dest.display()),
                e.error,
            )),
        }
    }

    /// Open an artifact for streaming, returning the file and its length
    pub async fn open(&self, slug: &str, version: &str) -> DepotResult<(tokio::fs::File, u64)> {
        let path = self.artifact_path(slug, version)?;
        let not_found = || DepotError::ArtifactNotFound {
            slug: slug.to_string(),
            version: version.to_string(),
        };

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(DepotError::io(format!("opening {}", path.display()), e)),
        };

        let metadata = file
            .metadata()
            .await
            .map_err(|e| DepotError::io(format!("inspecting {}", path.display()), e))?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        Ok((file, metadata.len()))
    }
}
