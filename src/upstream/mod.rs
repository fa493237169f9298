//! Upstream source host access
//!
//! Resolves release metadata from a package's main source file and downloads
//! branch archives, always with the configured credential.

pub mod client;
pub mod fetcher;
pub mod github;
pub mod header;

pub use client::{RawFile, Upstream};
pub use fetcher::MetadataFetcher;
pub use github::GithubUpstream;
pub use header::{parse_header, ReleaseMetadata, DEFAULT_MIN_HOST, DEFAULT_MIN_RUNTIME};
