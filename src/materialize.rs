//! Archive materializer
//!
//! Ensures an immutable archive exists for a (package, version):
//!
//! 1. Fast path: the canonical path already exists, return it without any
//!    network call.
//! 2. Slow path: download the branch archive, unpack it into a private staging
//!    directory, rename the host-generated root folder to `{slug}`, compress it
//!    under a private name and atomically publish it to the canonical path.
//!
//! Staging directories and partial files are dot-prefixed, uniquely named and
//! removed on every exit path. Concurrent first requests for the same key are
//! serialised so the branch is downloaded once.

use crate::archive::{extract_zip, single_root, zip_dir};
use crate::cache::{ArtifactStore, Published};
use crate::error::{DepotError, DepotResult};
use crate::registry::PackageDescriptor;
use crate::upstream::Upstream;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Produces and caches release archives on first demand
pub struct Materializer {
    store: ArtifactStore,
    upstream: Arc<dyn Upstream>,
    in_flight: Mutex<HashMap<(String, String), KeyLock>>,
}

impl Materializer {
    pub fn new(store: ArtifactStore, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            store,
            upstream,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The store artifacts are published into
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Return the canonical archive path, building it on a cache miss.
    pub async fn materialize(
        &self,
        package: &PackageDescriptor,
        version: &str,
    ) -> DepotResult<PathBuf> {
        let slug = package.slug.as_str();
        let dest = self.store.artifact_path(slug, version)?;

        if self.store.contains(slug, version).await? {
            debug!("Cache hit: {}", dest.display());
            return Ok(dest);
        }

        let key = (slug.to_string(), version.to_string());
        let lock = self.key_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.build_locked(package, version, &dest).await
        };
        self.release_key(&key, lock);

        result.map(|_| dest)
    }

    async fn build_locked(
        &self,
        package: &PackageDescriptor,
        version: &str,
        dest: &Path,
    ) -> DepotResult<()> {
        // A concurrent request may have published while we waited
        if self.store.contains(&package.slug, version).await? {
            debug!("Cache filled while waiting: {}", dest.display());
            return Ok(());
        }

        info!(
            "Cache miss for {} {}, downloading from {}",
            package.slug,
            version,
            self.upstream.host_name()
        );
        let bytes = self.upstream.fetch_archive(package).await?;
        debug!("Downloaded {} bytes for {}", bytes.len(), package.slug);

        let version_dir = self.store.ensure_version_dir(&package.slug, version).await?;
        let slug = package.slug.clone();
        let dest = dest.to_path_buf();

        let published = tokio::task::spawn_blocking(move || {
            repackage(&bytes, &slug, &version_dir, &dest)
        })
        .await
        .map_err(|e| DepotError::Internal(format!("repackaging task failed: {}", e)))??;

        if published == Published::AlreadyPresent {
            debug!("{} {} was published by another writer", package.slug, version);
        }
        Ok(())
    }

    fn key_lock(&self, key: &(String, String)) -> KeyLock {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.entry(key.clone()).or_default().clone()
    }

    fn release_key(&self, key: &(String, String), lock: KeyLock) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // Map entry + our handle: nobody else is waiting
        if Arc::strong_count(&lock) <= 2 {
            in_flight.remove(key);
        }
    }
}

/// Unpack, rename, compress and publish. Runs on a blocking thread.
///
/// The downloaded bytes and the staging tree are removed whether or not the
/// archive could be built.
fn repackage(bytes: &[u8], slug: &str, version_dir: &Path, dest: &Path) -> DepotResult<Published> {
    let mut download = tempfile::Builder::new()
        .prefix(".download-")
        .suffix(".zip")
        .tempfile_in(version_dir)
        .map_err(|e| DepotError::io("creating download staging file", e))?;
    download
        .write_all(bytes)
        .and_then(|_| download.flush())
        .map_err(|e| DepotError::io("writing downloaded archive", e))?;

    let staging = tempfile::Builder::new()
        .prefix(".stage-")
        .tempdir_in(version_dir)
        .map_err(|e| DepotError::io("creating staging directory", e))?;

    let result = build_from_download(download.as_file(), slug, staging.path(), version_dir, dest);

    let staging_path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        warn!("Failed to remove staging directory {}: {}", staging_path.display(), e);
    }
    if let Err(e) = download.close() {
        warn!("Failed to remove downloaded archive: {}", e);
    }

    result
}

fn build_from_download(
    download: &fs::File,
    slug: &str,
    staging: &Path,
    version_dir: &Path,
    dest: &Path,
) -> DepotResult<Published> {
    let unpacked = staging.join("unpacked");
    fs::create_dir(&unpacked).map_err(|e| DepotError::io("creating unpack directory", e))?;
    let files = extract_zip(download, &unpacked)
        .map_err(|e| DepotError::repackaging(slug, format!("unpacking archive: {}", e)))?;
    debug!("Unpacked {} files for {}", files, slug);

    let canonical = staging.join(slug);
    let root = single_root(&unpacked).map_err(|e| DepotError::repackaging(slug, e))?;
    rename_into_place(&root, &canonical).map_err(|e| DepotError::repackaging(slug, e))?;

    let partial = tempfile::Builder::new()
        .prefix(".partial-")
        .suffix(".zip")
        .tempfile_in(version_dir)
        .map_err(|e| DepotError::io("creating archive staging file", e))?;
    let partial =
        zip_dir(&canonical, slug, partial).map_err(|e| DepotError::archive(dest, e))?;

    ArtifactStore::publish(partial, dest)
}

/// Rename `from` to `to`, refusing to replace a non-empty target
fn rename_into_place(from: &Path, to: &Path) -> io::Result<()> {
    if let Ok(mut entries) = fs::read_dir(to) {
        if entries.next().is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("target {} exists and is not empty", to.display()),
            ));
        }
    }
    fs::rename(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::RawFile;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves a fixed branch archive and counts downloads
    struct ArchiveUpstream {
        archive: Vec<u8>,
        downloads: AtomicUsize,
    }

    impl ArchiveUpstream {
        fn new(archive: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                archive,
                downloads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Upstream for ArchiveUpstream {
        async fn fetch_raw_file(
            &self,
            _package: &PackageDescriptor,
            _file: &str,
        ) -> DepotResult<RawFile> {
            unreachable!("materializer never fetches raw files")
        }

        async fn fetch_archive(&self, _package: &PackageDescriptor) -> DepotResult<Vec<u8>> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(self.archive.clone())
        }

        fn public_archive_url(&self, _package: &PackageDescriptor) -> String {
            String::new()
        }

        fn host_name(&self) -> &str {
            "fake"
        }
    }

    fn package() -> PackageDescriptor {
        PackageDescriptor {
            slug: "p".to_string(),
            owner: "o".to_string(),
            repo: "r".to_string(),
            branch: "main".to_string(),
        }
    }

    /// Zip with a host-style generated root folder
    fn branch_archive() -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory("o-r-1a2b3c4/", options).unwrap();
        zip.start_file("o-r-1a2b3c4/p.php", options).unwrap();
        zip.write_all(b"<?php\n/* Version: 2.3.0 */").unwrap();
        zip.start_file("o-r-1a2b3c4/inc/util.php", options).unwrap();
        zip.write_all(b"<?php").unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn hidden_entries(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect()
    }

    #[tokio::test]
    async fn slow_path_builds_canonical_archive() {
        let temp = TempDir::new().unwrap();
        let upstream = ArchiveUpstream::new(branch_archive());
        let materializer = Materializer::new(ArtifactStore::new(temp.path()), upstream.clone());

        let path = materializer.materialize(&package(), "2.3.0").await.unwrap();

        assert_eq!(path, temp.path().join("p").join("2.3.0").join("p.zip"));
        let names = crate::archive::list_zip(fs::File::open(&path).unwrap()).unwrap();
        assert!(names.contains(&"p/p.php".to_string()));
        assert!(names.contains(&"p/inc/util.php".to_string()));
        assert!(names.iter().all(|n| n.starts_with("p/")));
        assert_eq!(upstream.downloads.load(Ordering::SeqCst), 1);

        // Staging directory, download and partial files are gone
        assert!(hidden_entries(path.parent().unwrap()).is_empty());
        assert!(!path.parent().unwrap().join("p").exists());
    }

    #[tokio::test]
    async fn second_call_is_a_cache_hit() {
        let temp = TempDir::new().unwrap();
        let upstream = ArchiveUpstream::new(branch_archive());
        let materializer = Materializer::new(ArtifactStore::new(temp.path()), upstream.clone());

        let first = materializer.materialize(&package(), "2.3.0").await.unwrap();
        let before = fs::read(&first).unwrap();
        let second = materializer.materialize(&package(), "2.3.0").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(&second).unwrap(), before);
        assert_eq!(upstream.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rebuild_from_same_input_is_byte_identical() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let upstream = ArchiveUpstream::new(branch_archive());

        let pa = Materializer::new(ArtifactStore::new(a.path()), upstream.clone())
            .materialize(&package(), "2.3.0")
            .await
            .unwrap();
        let pb = Materializer::new(ArtifactStore::new(b.path()), upstream.clone())
            .materialize(&package(), "2.3.0")
            .await
            .unwrap();

        assert_eq!(fs::read(pa).unwrap(), fs::read(pb).unwrap());
    }

    #[tokio::test]
    async fn concurrent_first_requests_download_once() {
        let temp = TempDir::new().unwrap();
        let upstream = ArchiveUpstream::new(branch_archive());
        let materializer = Arc::new(Materializer::new(
            ArtifactStore::new(temp.path()),
            upstream.clone(),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = materializer.clone();
                tokio::spawn(async move { m.materialize(&package(), "2.3.0").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(upstream.downloads.load(Ordering::SeqCst), 1);
        assert!(materializer.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_download_cleans_up() {
        let temp = TempDir::new().unwrap();
        let upstream = ArchiveUpstream::new(b"not a zip".to_vec());
        let materializer = Materializer::new(ArtifactStore::new(temp.path()), upstream);

        let err = materializer.materialize(&package(), "1.0").await.unwrap_err();

        assert!(matches!(err, DepotError::RepackagingError { .. }));
        assert_eq!(err.status(), 500);
        let version_dir = temp.path().join("p").join("1.0");
        assert!(hidden_entries(&version_dir).is_empty());
        assert!(!version_dir.join("p.zip").exists());
    }

    #[test]
    fn rename_refuses_non_empty_target() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("generated");
        let to = temp.path().join("p");
        fs::create_dir_all(&from).unwrap();
        fs::create_dir_all(&to).unwrap();
        fs::write(to.join("stale.txt"), "x").unwrap();

        let err = rename_into_place(&from, &to).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(from.exists());
    }
}
