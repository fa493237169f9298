//! Dotted-numeric version ordering
//!
//! Release versions are free-form strings such as `0.9.3`, `1.10` or
//! `2.0.0-beta1`. They are compared segment by segment, numerically, never
//! lexically: `1.10 > 1.9`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One component of a version string
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Tag(String),
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            // Pre-release tags sort below any release number
            (Self::Tag(_), Self::Number(_)) => Ordering::Less,
            (Self::Number(_), Self::Tag(_)) => Ordering::Greater,
            (Self::Tag(a), Self::Tag(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed version with dotted-numeric precedence
#[derive(Debug, Clone)]
pub struct DottedVersion {
    raw: String,
    segments: Vec<Segment>,
}

impl DottedVersion {
    /// Parse a version string. Never fails: unknown text becomes tag segments.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let raw = raw.strip_prefix(['v', 'V']).unwrap_or(raw);

        let segments = raw
            .split(['.', '-', '+', '_'])
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<u64>() {
                Ok(n) => Segment::Number(n),
                Err(_) => Segment::Tag(s.to_ascii_lowercase()),
            })
            .collect();

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// The version string as given (minus a leading `v`)
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for DottedVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        let zero = Segment::Number(0);

        for i in 0..len {
            // Missing trailing segments count as zero: 1.0 == 1.0.0
            let a = self.segments.get(i).unwrap_or(&zero);
            let b = other.segments.get(i).unwrap_or(&zero);
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        Ordering::Equal
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DottedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DottedVersion {}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Whether `remote` is strictly newer than `local`
pub fn is_newer(remote: &str, local: &str) -> bool {
    DottedVersion::parse(remote) > DottedVersion::parse(local)
}

/// Whether a version string is usable as a single path component
pub fn is_path_safe(version: &str) -> bool {
    !version.is_empty()
        && !version.starts_with('.')
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'))
}
