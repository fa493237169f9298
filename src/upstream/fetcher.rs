//! Upstream metadata fetcher
//!
//! Retrieves the package's main source file and extracts its header block.
//! The body is staged in a scoped temporary file that is removed on every
//! exit path, including parse failures.

use crate::error::{DepotError, DepotResult};
use crate::registry::PackageDescriptor;
use crate::upstream::client::Upstream;
use crate::upstream::header::{parse_header, ReleaseMetadata, HEADER_SCAN_BYTES};
use crate::version::is_path_safe;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves the latest release metadata of a package
pub struct MetadataFetcher {
    upstream: Arc<dyn Upstream>,
    file_extension: String,
}

impl MetadataFetcher {
    pub fn new(upstream: Arc<dyn Upstream>, file_extension: impl Into<String>) -> Self {
        Self {
            upstream,
            file_extension: file_extension.into(),
        }
    }

    /// Fetch `{slug}.{ext}` and parse its header block.
    ///
    /// Errors:
    /// - `UpstreamUnreachable` on transport failure
    /// - `UpstreamNotFound` on a non-success status or empty body
    /// - `MalformedMetadata` when no usable version is declared
    pub async fn fetch_metadata(&self, package: &PackageDescriptor) -> DepotResult<ReleaseMetadata> {
        let file = package.source_file(&self.file_extension);
        let response = self.upstream.fetch_raw_file(package, &file).await?;

        if !response.is_present() {
            warn!(
                "{} returned HTTP {} ({} bytes) for {}",
                self.upstream.host_name(),
                response.status,
                response.body.len(),
                file
            );
            return Err(DepotError::UpstreamNotFound { file });
        }

        let body = response.body;
        let file_name = file.clone();
        let meta = tokio::task::spawn_blocking(move || {
            parse_staged(&std::env::temp_dir(), &file_name, &body)
        })
        .await
        .map_err(|e| DepotError::Internal(format!("metadata parse task failed: {}", e)))??;

        debug!("{} declares version {}", file, meta.version);
        Ok(meta)
    }
}

/// Stage the body in a temporary file and parse the header from it.
///
/// The `NamedTempFile` guard deletes the file when it goes out of scope.
fn parse_staged(dir: &Path, file: &str, body: &[u8]) -> DepotResult<ReleaseMetadata> {
    let mut staged = tempfile::Builder::new()
        .prefix("depot-meta-")
        .tempfile_in(dir)
        .map_err(|e| DepotError::io("creating metadata staging file", e))?;

    staged
        .write_all(body)
        .and_then(|_| staged.flush())
        .map_err(|e| DepotError::io(format!("staging {}", file), e))?;

    let mut head = Vec::with_capacity(HEADER_SCAN_BYTES);
    let handle = staged.as_file_mut();
    handle
        .seek(SeekFrom::Start(0))
        .map_err(|e| DepotError::io(format!("rewinding staged {}", file), e))?;
    handle
        .take(HEADER_SCAN_BYTES as u64)
        .read_to_end(&mut head)
        .map_err(|e| DepotError::io(format!("reading staged {}", file), e))?;

    let meta = parse_header(&head)
        .into_metadata()
        .ok_or_else(|| DepotError::MalformedMetadata {
            file: file.to_string(),
            reason: "no Version header".to_string(),
        })?;

    // The version names a cache directory
    if !is_path_safe(&meta.version) {
        return Err(DepotError::MalformedMetadata {
            file: file.to_string(),
            reason: format!(
                "version '{}' is not a valid path component",
                meta.version
            ),
        });
    }
    Ok(meta)
}
