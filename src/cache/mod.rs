//! Versioned artifact cache
//!
//! One immutable zip archive per (package, version), addressed by path.
//! Archives are never rewritten once published.
//!
//! # Artifact States
//!
//! | State | On disk | Description |
//! |-------|---------|-------------|
//! | Miss | nothing at `{slug}/{version}/{slug}.zip` | Resolution will materialize it |
//! | Building | dot-prefixed staging dir / partial file | Private to one request, never served |
//! | Published | `{slug}/{version}/{slug}.zip` | Immutable, served by the download proxy |

pub mod artifact;
pub mod store;

pub use artifact::{format_bytes, short_digest, CachedArtifact};
pub use store::{ArtifactStore, Published};
