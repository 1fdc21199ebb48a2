#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use stager_fetch::{Fetch, FetchError, FetchOptions};
use stager_install::InstallConfig;
use stager_lock::{Artifact, Lockfile};
use stager_verify::{Checksum, HashAlgorithm, Sha1Hasher, Sha256Hasher};
use tempfile::TempDir;

pub const TARGET_VERSION: &str = "1.20.1";

pub struct Instance {
    pub dir:    TempDir,
    pub config: InstallConfig,
}

impl Instance {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallConfig::for_instance("test-pack", dir.path());
        Self { dir, config }
    }

    pub fn root(&self) -> &Path { self.dir.path() }

    pub fn live(&self, relative: &str) -> PathBuf { self.root().join(relative) }

    pub fn staged(&self, relative: &str) -> PathBuf { self.config.staging_root.join(relative) }

    pub fn write_lockfile(&self, artifacts: Vec<Artifact>) -> Lockfile {
        let lockfile = Lockfile {
            schema_version: 1,
            target_version: TARGET_VERSION.to_string(),
            artifacts,
        };
        std::fs::write(&self.config.lockfile, serde_json::to_vec_pretty(&lockfile).unwrap()).unwrap();
        lockfile
    }

    pub fn quarantined(&self) -> Vec<Vec<u8>> {
        match std::fs::read_dir(&self.config.quarantine_root) {
            Ok(entries) => entries.map(|e| std::fs::read(e.unwrap().path()).unwrap()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn sha1(content: &[u8]) -> Checksum {
    Checksum::from_digest(HashAlgorithm::Sha1, &Sha1Hasher::digest(content)).unwrap()
}

pub fn sha256(content: &[u8]) -> Checksum {
    Checksum::from_digest(HashAlgorithm::Sha256, &Sha256Hasher::digest(content)).unwrap()
}

pub fn url_for(name: &str) -> String { format!("https://cdn.example.invalid/{name}") }

pub fn artifact(name: &str, kind: &str, relative_path: &str, content: &[u8]) -> Artifact {
    Artifact {
        name:            name.to_string(),
        kind_tag:        kind.to_string(),
        source_location: url_for(name),
        relative_path:   relative_path.to_string(),
        checksum:        sha1(content),
        size:            Some(content.len() as u64),
    }
}

pub fn write_file(path: &Path, content: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Every file under `root` with its length and modification time.
pub fn tree_state(root: &Path) -> BTreeMap<PathBuf, (u64, SystemTime)> {
    let mut state = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let metadata = entry.metadata().unwrap();
            if metadata.is_dir() {
                pending.push(entry.path());
                state.insert(entry.path(), (0, metadata.modified().unwrap()));
            } else {
                state.insert(entry.path(), (metadata.len(), metadata.modified().unwrap()));
            }
        }
    }
    state
}

/// In-memory fetcher that counts calls and writes whatever body it holds,
/// leaving verification to the caller.
#[derive(Default)]
pub struct MockFetcher {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    calls:  AtomicUsize,
    seen:   Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self { Self::default() }

    pub fn serve(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.lock().unwrap().insert(url.into(), body.into());
        self
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    pub fn seen(&self) -> Vec<String> { self.seen.lock().unwrap().clone() }
}

impl Fetch for MockFetcher {
    async fn fetch(&self, url: &str, destination: &Path, _options: &FetchOptions) -> stager_fetch::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(url.to_string());

        let body = self.bodies.lock().unwrap().get(url).cloned();
        let Some(body) = body else {
            return Err(FetchError::Network {
                url:     url.to_string(),
                message: "404 Not Found".to_string(),
            });
        };
        write_file(destination, &body);
        Ok(body.len() as u64)
    }
}
