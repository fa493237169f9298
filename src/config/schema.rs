//! Configuration schema for depot
//!
//! Configuration is stored at `~/.config/depot/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package id of this updater itself (self-updates bypass the proxy)
    pub self_slug: Option<String>,

    /// General settings
    pub general: GeneralConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Upstream source host settings
    pub upstream: UpstreamConfig,

    /// Artifact storage settings
    pub storage: StorageConfig,

    /// Host-side polling settings
    pub poll: PollConfig,

    /// Package registry: slug -> upstream coordinates
    pub packages: BTreeMap<String, PackageConfig>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: String,

    /// Externally visible base URL used to build download links
    pub public_url: String,

    /// Path prefix in front of `/update` and `/download-zip`
    pub route_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8470".to_string(),
            public_url: "http://127.0.0.1:8470".to_string(),
            route_prefix: String::new(),
        }
    }
}

/// Upstream source host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Access token sent as `Authorization: token {token}`
    pub token: Option<String>,

    /// Host serving raw file contents
    pub raw_host: String,

    /// API host serving branch archives
    pub api_host: String,

    /// Public web host (self-update links)
    pub web_host: String,

    /// User-Agent header for every upstream request
    pub user_agent: String,

    /// Timeout for each upstream call in seconds
    pub timeout_secs: u64,

    /// Extension of the versioned source file (`{slug}.{ext}`)
    pub file_extension: String,

    /// Largest archive accepted from upstream
    pub max_archive_bytes: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            token: None,
            raw_host: "https://raw.githubusercontent.com".to_string(),
            api_host: "https://api.github.com".to_string(),
            web_host: "https://github.com".to_string(),
            user_agent: "Update-Server".to_string(),
            timeout_secs: 30,
            file_extension: "php".to_string(),
            max_archive_bytes: 256 * 1024 * 1024,
        }
    }
}

impl UpstreamConfig {
    /// The configured token, treating an empty string as unset
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of persisted state
    pub root: PathBuf,

    /// Namespace directory for this updater under the root
    pub updater_id: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("depot"),
            updater_id: "depot".to_string(),
        }
    }
}

impl StorageConfig {
    /// Directory holding `{slug}/{version}/{slug}.zip` entries
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(&self.updater_id).join("plugin-updates")
    }
}

/// Host-side polling configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Base URL of the depot to poll (including any route prefix)
    pub base_url: Option<String>,

    /// Package id to ask about
    pub slug: Option<String>,
}

/// Upstream coordinates of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Repository owner
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Branch to track
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}
