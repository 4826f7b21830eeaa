#![allow(dead_code)]
//! Shared fixtures: a throwaway project directory with pinned timestamps

use asset_curator::{
    AssetGuid, AssetTypeManager, Curator, CuratorConfig, CuratorError, DocumentInfo,
    JsonAssetManager, ManagerRegistry, Result, TransformContext,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

pub fn guid(n: u128) -> AssetGuid {
    AssetGuid::from_u128(n)
}

/// Project with one data directory named `Data`
pub struct TestProject {
    _dir: TempDir,
    pub data: PathBuf,
    clock: AtomicU64,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("Data");
        fs::create_dir_all(&data).unwrap();
        Self {
            _dir: dir,
            data,
            clock: AtomicU64::new(0),
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.data.join(relative)
    }

    /// Write a file and give it a fresh, unique modification time
    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(relative);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(&path, contents).unwrap();
        self.touch(&path);
        path
    }

    pub fn touch(&self, path: &Path) {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        let time = UNIX_EPOCH + Duration::from_secs(1_700_000_000 + tick);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    pub fn write_document(&self, relative: &str, document: &DocumentInfo) -> PathBuf {
        self.write(relative, JsonAssetManager::document_to_string(document).unwrap())
    }

    /// Plain `.asset` document
    pub fn write_asset(
        &self,
        relative: &str,
        guid: AssetGuid,
        settings_hash: u64,
        dependencies: &[&str],
        references: &[&str],
    ) -> PathBuf {
        let mut document = DocumentInfo::new(guid, "Asset").with_settings_hash(settings_hash);
        for dependency in dependencies {
            document = document.with_dependency(*dependency);
        }
        for reference in references {
            document = document.with_reference(*reference);
        }
        self.write_document(relative, &document)
    }

    pub fn remove(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        fs::remove_file(&path).unwrap();
        path
    }

    pub fn config(&self) -> CuratorConfig {
        CuratorConfig::new()
            .with_data_directory(&self.data)
            .with_update_threads(2)
    }

    pub fn curator(&self) -> Curator {
        Curator::new(self.config(), default_managers()).unwrap()
    }

    pub fn curator_with(&self, managers: ManagerRegistry) -> Curator {
        Curator::new(self.config(), managers).unwrap()
    }
}

/// `.asset` without thumbnails, `.mesh` with thumbnails
pub fn default_managers() -> ManagerRegistry {
    let mut managers = ManagerRegistry::new();
    managers.register(JsonAssetManager::new("Asset", &["asset"]));
    managers.register(JsonAssetManager::new("Mesh", &["mesh"]).with_thumbnails(true));
    managers
}

/// `.fail` documents whose transform fails while the switch is on
pub struct FailingManager {
    inner: JsonAssetManager,
    pub failing: Arc<AtomicBool>,
}

impl FailingManager {
    pub fn new() -> Self {
        Self {
            inner: JsonAssetManager::new("Failing", &["fail"]),
            failing: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl AssetTypeManager for FailingManager {
    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn extensions(&self) -> &[&str] {
        self.inner.extensions()
    }

    fn read_document_info(&self, path: &Path, bytes: &[u8]) -> Result<DocumentInfo> {
        self.inner.read_document_info(path, bytes)
    }

    fn transform_asset(&self, ctx: &TransformContext<'_>) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(CuratorError::Io("simulated transform failure".into()));
        }
        self.inner.transform_asset(ctx)
    }

    fn patch_document_guid(&self, path: &Path, new_guid: AssetGuid) -> Result<()> {
        self.inner.patch_document_guid(path, new_guid)
    }
}
