//! Update resolution
//!
//! Answers "what is the latest version of this package and where do I get
//! it": validate the request, read the version from upstream metadata,
//! materialize the archive, and point the caller at this server's download
//! endpoint instead of the upstream host.

use crate::config::Config;
use crate::error::{DepotError, DepotResult};
use crate::materialize::Materializer;
use crate::registry::{PackageDescriptor, Registry};
use crate::upstream::{MetadataFetcher, Upstream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Path of the download endpoint, relative to the route prefix
pub const DOWNLOAD_PATH: &str = "/download-zip";

/// Path of the resolution endpoint, relative to the route prefix
pub const UPDATE_PATH: &str = "/update";

/// Successful resolution response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    /// Latest version
    pub version: String,
    /// Where to fetch the archive
    pub download_url: String,
    /// Package identifier
    pub slug: String,
    /// Minimum host version
    pub tested: String,
    /// Minimum runtime version
    pub requires: String,
}

/// Orchestrates metadata fetch, materialization and link building
pub struct UpdateResolver {
    registry: Registry,
    fetcher: MetadataFetcher,
    materializer: Arc<Materializer>,
    upstream: Arc<dyn Upstream>,
    credential_configured: bool,
    self_slug: Option<String>,
    download_base: String,
}

impl UpdateResolver {
    /// Wire the resolver from configuration and shared collaborators
    pub fn new(
        config: &Config,
        registry: Registry,
        upstream: Arc<dyn Upstream>,
        materializer: Arc<Materializer>,
    ) -> Self {
        let download_base = format!(
            "{}{}{}",
            config.server.public_url.trim_end_matches('/'),
            normalize_prefix(&config.server.route_prefix),
            DOWNLOAD_PATH
        );

        Self {
            registry,
            fetcher: MetadataFetcher::new(upstream.clone(), config.upstream.file_extension.clone()),
            materializer,
            upstream,
            credential_configured: config.upstream.token().is_some(),
            self_slug: config.self_slug.clone(),
            download_base,
        }
    }

    /// The package registry this resolver serves
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve the latest release of `slug`.
    ///
    /// Validation failures are returned before any network call.
    pub async fn resolve_update(&self, slug: &str) -> DepotResult<UpdateInfo> {
        let package = self.registry.get(slug)?;
        if !self.credential_configured {
            return Err(DepotError::CredentialMissing);
        }

        let meta = self.fetcher.fetch_metadata(package).await?;
        self.materializer.materialize(package, &meta.version).await?;

        let download_url = self.download_url(package, &meta.version)?;
        info!("Resolved {} -> {}", slug, meta.version);

        Ok(UpdateInfo {
            tested: meta.min_host_or_default().to_string(),
            requires: meta.min_runtime_or_default().to_string(),
            version: meta.version,
            download_url,
            slug: package.slug.clone(),
        })
    }

    /// Link handed to clients for a resolved version.
    ///
    /// This updater's own package is pointed at the upstream archive so it
    /// never has to serve its own replacement mid-update.
    pub fn download_url(&self, package: &PackageDescriptor, version: &str) -> DepotResult<String> {
        if self.self_slug.as_deref() == Some(package.slug.as_str()) {
            return Ok(self.upstream.public_archive_url(package));
        }

        let url = Url::parse_with_params(
            &self.download_base,
            &[("plugin_slug", package.slug.as_str()), ("version", version)],
        )
        .map_err(|e| DepotError::ConfigInvalid {
            path: "server.public_url".into(),
            reason: e.to_string(),
        })?;
        Ok(url.into())
    }
}

/// `"wp-json/x/"` -> `"/wp-json/x"`, `""` -> `""`
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArtifactStore;
    use crate::config::schema::PackageConfig;
    use crate::upstream::RawFile;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeUpstream {
        header: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn fetch_raw_file(
            &self,
            _package: &PackageDescriptor,
            _file: &str,
        ) -> DepotResult<RawFile> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawFile {
                status: 200,
                body: self.header.as_bytes().to_vec(),
            })
        }

        async fn fetch_archive(&self, package: &PackageDescriptor) -> DepotResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file(format!("{}-abc/{}.php", package.repo, package.slug), options)
                .unwrap();
            zip.write_all(self.header.as_bytes()).unwrap();
            Ok(zip.finish().unwrap().into_inner())
        }

        fn public_archive_url(&self, package: &PackageDescriptor) -> String {
            format!("https://github.com/{}/{}/archive/{}.zip", package.owner, package.repo, package.branch)
        }

        fn host_name(&self) -> &str {
            "fake"
        }
    }

    fn setup(token: Option<&str>, header: &'static str) -> (TempDir, Arc<FakeUpstream>, UpdateResolver) {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.upstream.token = token.map(str::to_string);
        config.server.public_url = "https://updates.example.com/".to_string();
        config.server.route_prefix = "wp-json/dkm-plugins/v1".to_string();
        config.self_slug = Some("updater".to_string());
        for slug in ["p", "updater"] {
            config.packages.insert(
                slug.to_string(),
                PackageConfig {
                    owner: "o".to_string(),
                    repo: "r".to_string(),
                    branch: "main".to_string(),
                },
            );
        }

        let upstream = Arc::new(FakeUpstream {
            header,
            calls: AtomicUsize::new(0),
        });
        let materializer = Arc::new(Materializer::new(
            ArtifactStore::new(temp.path()),
            upstream.clone(),
        ));
        let resolver = UpdateResolver::new(
            &config,
            Registry::from_config(&config).unwrap(),
            upstream.clone(),
            materializer,
        );
        (temp, upstream, resolver)
    }

    #[tokio::test]
    async fn resolves_and_materializes() {
        let (temp, upstream, resolver) = setup(Some("t"), "<?php\n/* Version: 2.3.0 */");

        let info = resolver.resolve_update("p").await.unwrap();

        assert_eq!(
            info,
            UpdateInfo {
                version: "2.3.0".to_string(),
                download_url: "https://updates.example.com/wp-json/dkm-plugins/v1/download-zip?plugin_slug=p&version=2.3.0".to_string(),
                slug: "p".to_string(),
                tested: "6.4".to_string(),
                requires: "7.0".to_string(),
            }
        );
        assert!(temp.path().join("p/2.3.0/p.zip").is_file());
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);

        // Cached: only the metadata is fetched again
        resolver.resolve_update("p").await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unknown_package_makes_no_network_call() {
        let (_temp, upstream, resolver) = setup(Some("t"), "Version: 1.0");
        let err = resolver.resolve_update("nope").await.unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "Invalid package identifier");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_credential_makes_no_network_call() {
        let (_temp, upstream, resolver) = setup(None, "Version: 1.0");
        let err = resolver.resolve_update("p").await.unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "Credential not configured");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn self_slug_points_at_upstream_archive() {
        let (temp, _upstream, resolver) = setup(Some("t"), "Version: 0.2\nRequires PHP: 8.0");
        let info = resolver.resolve_update("updater").await.unwrap();
        assert_eq!(info.download_url, "https://github.com/o/r/archive/main.zip");
        assert_eq!(info.requires, "8.0");
        assert!(temp.path().join("updater/0.2/updater.zip").is_file());
    }

    #[tokio::test]
    async fn malformed_metadata_is_server_error() {
        let (temp, _upstream, resolver) = setup(Some("t"), "<?php // no header");
        let err = resolver.resolve_update("p").await.unwrap_err();
        assert_eq!(err.status(), 500);
        assert!(!temp.path().join("p").exists());
    }

    #[tokio::test]
    async fn unusable_upstream_version_is_server_error() {
        let (temp, upstream, resolver) = setup(Some("t"), "<?php\n/* Version: 2.3.0 RC1 */");
        let err = resolver.resolve_update("p").await.unwrap_err();
        assert_eq!(err.status(), 500);
        assert!(matches!(err, DepotError::MalformedMetadata { .. }));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert!(!temp.path().join("p").exists());
    }

    #[test]
    fn prefix_normalization() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("api/v1/"), "/api/v1");
        assert_eq!(normalize_prefix("/api"), "/api");
    }
}
