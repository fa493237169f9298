//! Depot - caching update proxy for privately hosted packages
//!
//! Resolves the latest release of a package from a private source host,
//! repackages the branch archive into a stable, versioned zip and serves it
//! to update clients that cannot authenticate against the host themselves.

pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod materialize;
pub mod poll;
pub mod registry;
pub mod resolve;
pub mod server;
pub mod service;
pub mod upstream;
pub mod version;

pub use error::{DepotError, DepotResult};
