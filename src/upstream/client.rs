//! Upstream host abstraction
//!
//! The resolver and materializer only need two calls from the source host:
//! the raw contents of one file on a branch, and the whole branch as a zip
//! archive. Keeping them behind a trait lets tests substitute an in-process
//! host and count network calls.

use crate::error::DepotResult;
use crate::registry::PackageDescriptor;
use async_trait::async_trait;

/// Outcome of an authenticated raw-file request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    /// HTTP status returned by the host
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl RawFile {
    /// Whether the host returned usable content
    pub fn is_present(&self) -> bool {
        (200..300).contains(&self.status) && !self.body.is_empty()
    }
}

/// Source host operations used by the pipeline
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Fetch `{slug}.{ext}` from the package's branch.
    ///
    /// Transport failures are errors; HTTP failures are reported in
    /// [`RawFile::status`].
    async fn fetch_raw_file(&self, package: &PackageDescriptor, file: &str)
        -> DepotResult<RawFile>;

    /// Download the package's branch as a zip archive
    async fn fetch_archive(&self, package: &PackageDescriptor) -> DepotResult<Vec<u8>>;

    /// Public archive URL for the branch (used for self-updates)
    fn public_archive_url(&self, package: &PackageDescriptor) -> String;

    /// Human-readable host name for logs
    fn host_name(&self) -> &str;
}
