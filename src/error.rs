//! Error types for depot
//!
//! All modules use `DepotResult<T>` as their return type. Every variant maps
//! onto one of four request-level kinds so the HTTP layer can turn any failure
//! into a status code without inspecting messages.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for depot operations
pub type DepotResult<T> = Result<T, DepotError>;

/// All errors that can occur in depot
#[derive(Error, Debug)]
pub enum DepotError {
    // Request validation errors
    #[error("Invalid package identifier")]
    InvalidPackage(String),

    #[error("Credential not configured")]
    CredentialMissing,

    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    // Upstream errors
    #[error("Error connecting to upstream host: {0}")]
    UpstreamUnreachable(String),

    #[error("{file} not found upstream (missing file or invalid credential)")]
    UpstreamNotFound { file: String },

    #[error("Invalid package metadata in {file}: {reason}")]
    MalformedMetadata { file: String, reason: String },

    #[error("Archive download failed for {slug}: {reason}")]
    DownloadError { slug: String, reason: String },

    #[error("Update check failed with HTTP {status}: {message}")]
    PollFailed { status: u16, message: String },

    // Storage errors
    #[error("Repackaging failed for {slug}: {reason}")]
    RepackagingError { slug: String, reason: String },

    #[error("Archive creation failed at {path}: {reason}")]
    ArchiveCreationError { path: PathBuf, reason: String },

    #[error("Artifact not found: {slug} {version}")]
    ArtifactNotFound { slug: String, version: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Request-level classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad, missing or unknown identifier or version (user input fault)
    InvalidRequest,
    /// Unknown artifact or upstream file absent
    NotFound,
    /// Transport error, malformed metadata, failed download
    UpstreamFailure,
    /// Filesystem rename/compress/cleanup failure or any other local fault
    StorageFailure,
}

impl ErrorKind {
    /// HTTP status code reported for this kind
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::NotFound => 404,
            Self::UpstreamFailure | Self::StorageFailure => 500,
        }
    }
}

impl DepotError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a repackaging error
    pub fn repackaging(slug: impl Into<String>, reason: impl ToString) -> Self {
        Self::RepackagingError {
            slug: slug.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an archive creation error
    pub fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArchiveCreationError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify this error for the request boundary
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPackage(_)
            | Self::CredentialMissing
            | Self::MissingParameter(_)
            | Self::InvalidVersion(_) => ErrorKind::InvalidRequest,
            Self::UpstreamNotFound { .. } | Self::ArtifactNotFound { .. } => ErrorKind::NotFound,
            Self::UpstreamUnreachable(_)
            | Self::MalformedMetadata { .. }
            | Self::DownloadError { .. }
            | Self::PollFailed { .. } => ErrorKind::UpstreamFailure,
            _ => ErrorKind::StorageFailure,
        }
    }

    /// HTTP status code for this error
    pub fn status(&self) -> u16 {
        self.kind().status()
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CredentialMissing => Some("Set upstream.token in the config file or DEPOT_TOKEN"),
            Self::InvalidPackage(_) => Some("Add the package under [packages.<slug>] in the config"),
            Self::UpstreamNotFound { .. } => {
                Some("Check the repository coordinates and that the token has not expired")
            }
            _ => None,
        }
    }
}
