//! Host-side update polling
//!
//! Installed clients ask a depot for the latest release and compare it with
//! their own version. The host's own scheduling decides when to call
//! [`UpdateChecker::on_update_check`].

use crate::error::{DepotError, DepotResult};
use crate::resolve::{UpdateInfo, UPDATE_PATH};
use crate::version::is_newer;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;
use url::Url;

/// Polls a depot's resolution endpoint for one package
#[derive(Clone)]
pub struct UpdateChecker {
    agent: Agent,
    base_url: String,
    slug: String,
}

impl UpdateChecker {
    /// `base_url` includes any route prefix, e.g. `https://host/wp-json/x/v1`
    pub fn new(base_url: impl Into<String>, slug: impl Into<String>, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.into(),
            slug: slug.into(),
        }
    }

    /// Resolution endpoint URL for this package
    pub fn update_url(&self) -> DepotResult<String> {
        let endpoint = format!("{}{}", self.base_url.trim_end_matches('/'), UPDATE_PATH);
        let url = Url::parse_with_params(&endpoint, &[("plugin_slug", self.slug.as_str())])
            .map_err(|e| DepotError::ConfigInvalid {
                path: "poll.base_url".into(),
                reason: e.to_string(),
            })?;
        Ok(url.into())
    }

    /// Ask the depot for the latest release
    pub async fn fetch(&self) -> DepotResult<UpdateInfo> {
        let url = self.update_url()?;
        let agent = self.agent.clone();

        debug!("Polling {}", url);
        let (status, body) = tokio::task::spawn_blocking(move || get_text(&agent, &url))
            .await
            .map_err(|e| DepotError::Internal(format!("poll task failed: {}", e)))?
            .map_err(|e| DepotError::UpstreamUnreachable(e.to_string()))?;

        if status != 200 {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(body);
            return Err(DepotError::PollFailed { status, message });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// The update to offer, or `None` when `current` is up to date
    pub async fn on_update_check(&self, current: &str) -> DepotResult<Option<UpdateInfo>> {
        let info = self.fetch().await?;
        Ok(offer(info, current))
    }
}

fn get_text(agent: &Agent, url: &str) -> Result<(u16, String), ureq::Error> {
    let mut response = agent.get(url).call()?;
    let status = response.status().as_u16();
    Ok((status, response.body_mut().read_to_string()?))
}

/// Keep `info` only when it is strictly newer than `current`
pub fn offer(info: UpdateInfo, current: &str) -> Option<UpdateInfo> {
    if is_newer(&info.version, current) {
        Some(info)
    } else {
        debug!("{} {} is up to date", info.slug, current);
        None
    }
}
