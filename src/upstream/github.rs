//! GitHub-style upstream host over authenticated HTTPS
//!
//! Raw files come from `{raw_host}/{owner}/{repo}/{branch}/{file}` and branch
//! archives from `{api_host}/repos/{owner}/{repo}/zipball/{branch}`. Both send
//! `Authorization: token {secret}` and an explicit User-Agent.

use crate::config::schema::UpstreamConfig;
use crate::error::{DepotError, DepotResult};
use crate::registry::PackageDescriptor;
use crate::upstream::client::{RawFile, Upstream};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Largest raw source file accepted
const MAX_RAW_FILE_BYTES: u64 = 4 * 1024 * 1024;

/// Upstream client backed by a shared ureq agent
#[derive(Clone)]
pub struct GithubUpstream {
    agent: Agent,
    config: UpstreamConfig,
}

impl GithubUpstream {
    /// Create a client from the upstream configuration
    pub fn new(config: &UpstreamConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            config: config.clone(),
        }
    }

    /// URL of a raw file on the package's branch
    pub fn raw_file_url(&self, package: &PackageDescriptor, file: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.config.raw_host.trim_end_matches('/'),
            package.owner,
            package.repo,
            package.branch,
            file
        )
    }

    /// API URL of the branch archive
    pub fn archive_url(&self, package: &PackageDescriptor) -> String {
        format!(
            "{}/repos/{}/{}/zipball/{}",
            self.config.api_host.trim_end_matches('/'),
            package.owner,
            package.repo,
            package.branch
        )
    }

    fn authorization(&self) -> DepotResult<String> {
        let token = self.config.token().ok_or(DepotError::CredentialMissing)?;
        Ok(format!("token {}", token))
    }

    /// Issue an authenticated GET on a blocking thread
    async fn get(&self, url: String, limit: u64) -> DepotResult<Result<RawFile, ureq::Error>> {
        let agent = self.agent.clone();
        let authorization = self.authorization()?;
        let user_agent = self.config.user_agent.clone();

        debug!("GET {}", url);
        tokio::task::spawn_blocking(move || -> Result<RawFile, ureq::Error> {
            let mut response = agent
                .get(&url)
                .header("Authorization", authorization.as_str())
                .header("User-Agent", user_agent.as_str())
                .call()?;
            let status = response.status().as_u16();
            let body = response.body_mut().with_config().limit(limit).read_to_vec()?;
            Ok(RawFile { status, body })
        })
        .await
        .map_err(|e| DepotError::Internal(format!("upstream request task failed: {}", e)))
    }
}

#[async_trait]
impl Upstream for GithubUpstream {
    async fn fetch_raw_file(
        &self,
        package: &PackageDescriptor,
        file: &str,
    ) -> DepotResult<RawFile> {
        let url = self.raw_file_url(package, file);
        self.get(url, MAX_RAW_FILE_BYTES)
            .await?
            .map_err(|e| DepotError::UpstreamUnreachable(e.to_string()))
    }

    async fn fetch_archive(&self, package: &PackageDescriptor) -> DepotResult<Vec<u8>> {
        let url = self.archive_url(package);
        let download_error = |reason: String| DepotError::DownloadError {
            slug: package.slug.clone(),
            reason,
        };

        let response = self
            .get(url, self.config.max_archive_bytes)
            .await?
            .map_err(|e| download_error(e.to_string()))?;

        if !(200..300).contains(&response.status) {
            return Err(download_error(format!(
                "upstream returned HTTP {}",
                response.status
            )));
        }
        if response.body.is_empty() {
            return Err(download_error("upstream returned an empty archive".to_string()));
        }

        Ok(response.body)
    }

    fn public_archive_url(&self, package: &PackageDescriptor) -> String {
        format!(
            "{}/{}/{}/archive/{}.zip",
            self.config.web_host.trim_end_matches('/'),
            package.owner,
            package.repo,
            package.branch
        )
    }

    fn host_name(&self) -> &str {
        &self.config.raw_host
    }
}
