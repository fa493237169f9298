//! Header block parsing
//!
//! Release metadata lives in a comment block at the top of the package's
//! main source file:
//!
//! ```text
//! /**
//!  * Plugin Name: Example
//!  * Version: 2.3.0
//!  * Requires at least: 6.2
//!  * Requires PHP: 7.4
//!  */
//! ```
//!
//! Only the first 8 KiB are scanned. Field names match case-insensitively.

use serde::{Deserialize, Serialize};

/// Bytes of the file inspected for header fields
pub const HEADER_SCAN_BYTES: usize = 8 * 1024;

/// Default minimum host version when the header omits it
pub const DEFAULT_MIN_HOST: &str = "6.4";

/// Default minimum runtime version when the header omits it
pub const DEFAULT_MIN_RUNTIME: &str = "7.0";

/// Release metadata extracted from a header block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    /// Display name, if declared
    pub name: Option<String>,
    /// Authoritative release version
    pub version: String,
    /// Minimum host platform version
    pub min_host: Option<String>,
    /// Minimum language runtime version
    pub min_runtime: Option<String>,
}

impl ReleaseMetadata {
    /// Minimum host version, defaulted
    pub fn min_host_or_default(&self) -> &str {
        self.min_host.as_deref().unwrap_or(DEFAULT_MIN_HOST)
    }

    /// Minimum runtime version, defaulted
    pub fn min_runtime_or_default(&self) -> &str {
        self.min_runtime.as_deref().unwrap_or(DEFAULT_MIN_RUNTIME)
    }
}

/// Raw header fields found in a file (any may be missing)
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub name: Option<String>,
    pub version: Option<String>,
    pub requires_at_least: Option<String>,
    pub requires_php: Option<String>,
}

impl HeaderFields {
    /// Convert into metadata; `None` when no version is declared
    pub fn into_metadata(self) -> Option<ReleaseMetadata> {
        Some(ReleaseMetadata {
            version: self.version?,
            name: self.name,
            min_host: self.requires_at_least,
            min_runtime: self.requires_php,
        })
    }
}

/// Scan the leading portion of a source file for header fields.
///
/// The first occurrence of each field wins.
pub fn parse_header(content: &[u8]) -> HeaderFields {
    let end = content.len().min(HEADER_SCAN_BYTES);
    let text = String::from_utf8_lossy(&content[..end]);
    let mut fields = HeaderFields::default();

    for line in text.lines() {
        let Some((key, value)) = split_field(line) else {
            continue;
        };

        let slot = match key.to_ascii_lowercase().as_str() {
            "plugin name" => &mut fields.name,
            "version" => &mut fields.version,
            "requires at least" => &mut fields.requires_at_least,
            "requires php" => &mut fields.requires_php,
            _ => continue,
        };

        if slot.is_none() {
            *slot = Some(value);
        }
    }

    fields
}

/// Split `  * Key: value */` into `("Key", "value")`
fn split_field(line: &str) -> Option<(&str, String)> {
    let line = line.trim_start_matches(|c: char| c.is_whitespace() || "/*#@".contains(c));
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let value = value
        .strip_suffix("?>")
        .or_else(|| value.strip_suffix("*/"))
        .unwrap_or(value)
        .trim();
    if value.is_empty() {
        return None;
    }

    Some((key, value.to_string()))
}
