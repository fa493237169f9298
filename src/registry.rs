//! Package registry
//!
//! Static mapping from package identifier (slug) to upstream repository
//! coordinates. Built once from configuration and never mutated.

use crate::config::schema::PackageConfig;
use crate::config::Config;
use crate::error::{DepotError, DepotResult};
use std::collections::BTreeMap;

/// Upstream coordinates of a single distributable package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Package identifier, unique key into the registry
    pub slug: String,
    /// Upstream repository owner
    pub owner: String,
    /// Upstream repository name
    pub repo: String,
    /// Upstream branch
    pub branch: String,
}

impl PackageDescriptor {
    /// Name of the versioned source file carrying the header block
    pub fn source_file(&self, extension: &str) -> String {
        format!("{}.{}", self.slug, extension)
    }
}

/// Immutable slug -> descriptor lookup
#[derive(Debug, Clone, Default)]
pub struct Registry {
    packages: BTreeMap<String, PackageDescriptor>,
}

impl Registry {
    /// Build the registry from configuration, rejecting unsafe slugs
    pub fn from_config(config: &Config) -> DepotResult<Self> {
        let mut packages = BTreeMap::new();

        for (slug, package) in &config.packages {
            validate_slug(slug)?;
            packages.insert(slug.clone(), descriptor(slug, package));
        }

        Ok(Self { packages })
    }

    /// Look up a package, treating unknown ids as a validation failure
    pub fn get(&self, slug: &str) -> DepotResult<&PackageDescriptor> {
        self.packages
            .get(slug)
            .ok_or_else(|| DepotError::InvalidPackage(slug.to_string()))
    }

    /// Whether the slug is registered
    pub fn contains(&self, slug: &str) -> bool {
        self.packages.contains_key(slug)
    }

    /// All registered packages in slug order
    pub fn iter(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn descriptor(slug: &str, package: &PackageConfig) -> PackageDescriptor {
    PackageDescriptor {
        slug: slug.to_string(),
        owner: package.owner.clone(),
        repo: package.repo.clone(),
        branch: package.branch.clone(),
    }
}

/// Validate that a slug is safe to use as a path component and URL segment.
fn validate_slug(slug: &str) -> DepotResult<()> {
    if slug.is_empty()
        || slug.starts_with('.')
        || !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(DepotError::ConfigInvalid {
            path: "packages".into(),
            reason: format!(
                "invalid package id '{}': use alphanumeric characters, '-', '_' or '.'",
                slug
            ),
        });
    }
    Ok(())
}
