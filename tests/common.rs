//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use modhost::{EntryPoint, ModuleContext, ModuleManager, ModuleManifest, Services};

/// Isolated modules directory
pub struct ModuleTestFixture {
    /// Keeps the directory alive for the duration of the test
    pub temp_dir: TempDir,
    pub modules_dir: PathBuf,
}

impl ModuleTestFixture {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let modules_dir = temp_dir.path().join("modules");
        std::fs::create_dir_all(&modules_dir)?;
        Ok(Self {
            temp_dir,
            modules_dir,
        })
    }

    /// Write `<modules_dir>/<file_stem>.toml` and return the package path
    pub fn write_manifest(&self, file_stem: &str, manifest: &ModuleManifest) -> PathBuf {
        let contents = manifest.to_toml().unwrap();
        self.write_raw(&format!("{file_stem}.toml"), &contents);
        self.modules_dir.join(file_stem)
    }

    /// Write `<modules_dir>/<file_stem>.json` and return the package path
    pub fn write_json_manifest(&self, file_stem: &str, manifest: &ModuleManifest) -> PathBuf {
        let contents = serde_json::to_string_pretty(manifest).unwrap();
        self.write_raw(&format!("{file_stem}.json"), &contents);
        self.modules_dir.join(file_stem)
    }

    /// Write arbitrary file contents under the modules directory
    pub fn write_raw(&self, file_name: &str, contents: &str) -> PathBuf {
        let path = self.modules_dir.join(file_name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn path(&self) -> &Path {
        &self.modules_dir
    }
}

pub fn manifest(name: &str, version: &str) -> ModuleManifest {
    ModuleManifest::new(name, version, name)
}

pub fn main_manifest(name: &str, version: &str) -> ModuleManifest {
    manifest(name, version).with_main(true)
}

/// Entry point counting its invocations
pub fn counting_entry(counter: &Arc<AtomicUsize>) -> impl EntryPoint + 'static {
    let counter = Arc::clone(counter);
    move |_ctx: ModuleContext| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(())
        }
    }
}

/// Manager with a counting `main` entry registered for each name
pub fn manager_with_entries(names: &[&str]) -> (ModuleManager, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut manager = ModuleManager::new(Services::new());
    for name in names {
        manager.register_entry_point(*name, counting_entry(&counter));
    }
    (manager, counter)
}
