//! Integration tests for Depot

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn depot() -> Command {
        let mut cmd = cargo_bin_cmd!("depot");
        cmd.env_remove("DEPOT_CONFIG").env_remove("DEPOT_TOKEN");
        cmd
    }

    /// Write a config whose storage lives inside `dir`
    fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
        let path = dir.join("config.toml");
        let content = format!(
            "[storage]\nroot = {:?}\nupdater_id = \"it\"\n\n{}",
            dir.join("state").display().to_string(),
            extra
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        depot()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("caching update proxy"));
    }

    #[test]
    fn version_displays() {
        depot()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("depot"));
    }

    #[test]
    fn config_path() {
        depot()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_redacts_token() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "[upstream]\ntoken = \"ghp_very_secret\"\n");

        depot()
            .arg("--config")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[server]"))
            .stdout(predicate::str::contains("ghp_very_secret").not());
    }

    #[test]
    fn config_loading_is_logged() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        depot()
            .env("DEPOT_TOKEN", "from-env")
            .arg("-vv")
            .arg("--config")
            .arg(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Using upstream token from DEPOT_TOKEN"))
            .stderr(predicate::str::contains("from-env").not());
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("nested").join("config.toml");

        depot()
            .arg("--config")
            .arg(&config)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(config.is_file());
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        depot()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached artifacts found"));

        depot()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::diff("[]\n"));
    }

    #[test]
    fn cache_list_shows_published_artifact() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        let dir = temp.path().join("state/it/plugin-updates/p/1.2.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("p.zip"), b"PK\x05\x06").unwrap();

        depot()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::diff("p 1.2.0\n"));

        depot()
            .arg("--config")
            .arg(&config)
            .args(["cache", "path", "p", "1.2.0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("p.zip"));
    }

    #[test]
    fn cache_path_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        depot()
            .arg("--config")
            .arg(&config)
            .args(["cache", "path", "p", "9.9"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Artifact not found"));
    }

    #[test]
    fn resolve_unknown_package() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "[upstream]\ntoken = \"t\"\n");

        depot()
            .arg("--config")
            .arg(&config)
            .args(["resolve", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid package identifier"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn resolve_without_credential() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "[packages.p]\nowner = \"o\"\nrepo = \"r\"\n");

        depot()
            .arg("--config")
            .arg(&config)
            .args(["resolve", "p"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Credential not configured"));
    }

    #[test]
    fn check_requires_base_url() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        depot()
            .arg("--config")
            .arg(&config)
            .args(["check", "1.0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("poll.base_url"));
    }

    #[test]
    fn completions_generate() {
        depot()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("depot"));
    }
}

mod server_tests {
    use async_trait::async_trait;
    use depot::config::schema::PackageConfig;
    use depot::config::Config;
    use depot::error::{DepotError, DepotResult};
    use depot::registry::PackageDescriptor;
    use depot::server;
    use depot::service::Depot;
    use depot::upstream::{RawFile, Upstream};
    use std::io::{Cursor, Read, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::runtime::Runtime;
    use tokio::sync::oneshot;

    const HEADER: &str = "<?php\n/**\n * Plugin Name: P\n * Version: 2.3.0\n */\n";

    /// Serves one fixed release of every package
    #[derive(Default)]
    struct FakeUpstream {
        raw_calls: AtomicUsize,
        archive_calls: AtomicUsize,
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn fetch_raw_file(
            &self,
            _package: &PackageDescriptor,
            _file: &str,
        ) -> DepotResult<RawFile> {
            self.raw_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawFile {
                status: 200,
                body: HEADER.as_bytes().to_vec(),
            })
        }

        async fn fetch_archive(&self, package: &PackageDescriptor) -> DepotResult<Vec<u8>> {
            self.archive_calls.fetch_add(1, Ordering::SeqCst);
            let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file(format!("{}-main/{}.php", package.repo, package.slug), options)
                .map_err(|e| DepotError::Internal(e.to_string()))?;
            zip.write_all(HEADER.as_bytes())
                .map_err(|e| DepotError::io("writing fake archive", e))?;
            zip.start_file(format!("{}-main/readme.txt", package.repo), options)
                .map_err(|e| DepotError::Internal(e.to_string()))?;
            zip.write_all(b"readme")
                .map_err(|e| DepotError::io("writing fake archive", e))?;
            let cursor = zip
                .finish()
                .map_err(|e| DepotError::Internal(e.to_string()))?;
            Ok(cursor.into_inner())
        }

        fn public_archive_url(&self, package: &PackageDescriptor) -> String {
            format!(
                "https://github.com/{}/{}/archive/{}.zip",
                package.owner, package.repo, package.branch
            )
        }

        fn host_name(&self) -> &str {
            "fake"
        }
    }

    struct Running {
        _runtime: Runtime,
        _temp: TempDir,
        _shutdown: oneshot::Sender<()>,
        base: String,
        upstream: Arc<FakeUpstream>,
        agent: ureq::Agent,
    }

    impl Running {
        fn get(&self, target: &str) -> (u16, Vec<u8>) {
            let mut response = self
                .agent
                .get(format!("{}{}", self.base, target))
                .call()
                .unwrap();
            let status = response.status().as_u16();
            (status, response.body_mut().read_to_vec().unwrap())
        }

        fn get_json(&self, target: &str) -> (u16, serde_json::Value) {
            let (status, body) = self.get(target);
            (status, serde_json::from_slice(&body).unwrap())
        }
    }

    fn start() -> Running {
        let runtime = Runtime::new().unwrap();
        let temp = TempDir::new().unwrap();
        let listener = runtime.block_on(server::bind("127.0.0.1:0")).unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let mut config = Config::default();
        config.upstream.token = Some("t".to_string());
        config.server.public_url = base.clone();
        config.storage.root = temp.path().to_path_buf();
        config.packages.insert(
            "p".to_string(),
            PackageConfig {
                owner: "o".to_string(),
                repo: "r".to_string(),
                branch: "main".to_string(),
            },
        );

        let upstream = Arc::new(FakeUpstream::default());
        let depot = Arc::new(Depot::with_upstream(&config, upstream.clone()).unwrap());
        let (tx, rx) = oneshot::channel::<()>();
        runtime.spawn(server::serve(listener, depot, async {
            let _ = rx.await;
        }));

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Running {
            _runtime: runtime,
            _temp: temp,
            _shutdown: tx,
            base,
            upstream,
            agent,
        }
    }

    #[test]
    fn resolve_then_download() {
        let server = start();

        let (status, body) = server.get_json("/update?plugin_slug=p");
        assert_eq!(status, 200);
        assert_eq!(
            body,
            serde_json::json!({
                "version": "2.3.0",
                "download_url": format!("{}/download-zip?plugin_slug=p&version=2.3.0", server.base),
                "slug": "p",
                "tested": "6.4",
                "requires": "7.0",
            })
        );
        assert_eq!(server.upstream.archive_calls.load(Ordering::SeqCst), 1);

        let (status, zip_bytes) = server.get("/download-zip?plugin_slug=p&version=2.3.0");
        assert_eq!(status, 200);
        let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert!(names.contains(&"p/p.php".to_string()));
        assert!(names.contains(&"p/readme.txt".to_string()));
        let mut readme = String::new();
        archive
            .by_name("p/readme.txt")
            .unwrap()
            .read_to_string(&mut readme)
            .unwrap();
        assert_eq!(readme, "readme");

        // Second resolution reuses the cached archive
        let (status, _) = server.get_json("/update?plugin_slug=p");
        assert_eq!(status, 200);
        assert_eq!(server.upstream.archive_calls.load(Ordering::SeqCst), 1);
        assert_eq!(server.upstream.raw_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn download_of_unbuilt_version_is_404() {
        let server = start();

        let (status, body) = server.get_json("/download-zip?plugin_slug=p&version=9.9.9");
        assert_eq!(status, 404);
        assert!(body["error"].as_str().unwrap().contains("not found"));
        assert_eq!(server.upstream.archive_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_package_is_rejected_without_upstream_calls() {
        let server = start();

        let (status, body) = server.get_json("/update?plugin_slug=zzz");
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Invalid package identifier");
        assert_eq!(server.upstream.raw_calls.load(Ordering::SeqCst), 0);
        assert_eq!(server.upstream.archive_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_route_is_json_404() {
        let server = start();

        let (status, body) = server.get_json("/elsewhere");
        assert_eq!(status, 404);
        assert!(body["error"].is_string());
    }
}
