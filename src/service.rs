//! Service wiring
//!
//! Builds every pipeline component once from the immutable configuration.
//! The resulting `Depot` is shared by all requests; the filesystem is the
//! only mutable state.

use crate::cache::ArtifactStore;
use crate::config::Config;
use crate::error::DepotResult;
use crate::materialize::Materializer;
use crate::registry::Registry;
use crate::resolve::{normalize_prefix, UpdateResolver};
use crate::upstream::{GithubUpstream, Upstream};
use std::sync::Arc;
use tracing::debug;

/// Fully wired update proxy
pub struct Depot {
    resolver: UpdateResolver,
    store: ArtifactStore,
    route_prefix: String,
}

impl Depot {
    /// Wire the proxy against the configured upstream host
    pub fn from_config(config: &Config) -> DepotResult<Self> {
        Self::with_upstream(config, Arc::new(GithubUpstream::new(&config.upstream)))
    }

    /// Wire the proxy against an arbitrary upstream implementation
    pub fn with_upstream(config: &Config, upstream: Arc<dyn Upstream>) -> DepotResult<Self> {
        let registry = Registry::from_config(config)?;
        let store = ArtifactStore::new(config.storage.artifacts_dir());
        let materializer = Arc::new(Materializer::new(store.clone(), upstream.clone()));

        debug!(
            "Serving {} package(s) from {}",
            registry.len(),
            store.root().display()
        );

        Ok(Self {
            resolver: UpdateResolver::new(config, registry, upstream, materializer),
            store,
            route_prefix: normalize_prefix(&config.server.route_prefix),
        })
    }

    pub fn resolver(&self) -> &UpdateResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &Registry {
        self.resolver.registry()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Normalized route prefix (`""` or `/segment/...`)
    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }
}
