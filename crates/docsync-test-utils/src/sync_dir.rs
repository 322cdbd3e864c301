//! [`SyncDir`]: a temporary directory standing in for the sync base dir.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// A temporary sync directory with helper assertions.
pub struct SyncDir {
    temp_dir: TempDir,
}

impl Default for SyncDir {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncDir {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    /// Names of the regular files directly inside the directory, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Poll until `name` exists with exactly `content`, or panic after
    /// `timeout`.
    pub fn wait_for_content(&self, name: &str, content: &[u8], timeout: Duration) {
        let path = self.path(name);
        let deadline = Instant::now() + timeout;
        loop {
            if fs::read(&path).is_ok_and(|actual| actual == content) {
                return;
            }
            if Instant::now() >= deadline {
                panic!(
                    "Timed out waiting for {} to contain {:?}; files: {:?}",
                    path.display(),
                    String::from_utf8_lossy(content),
                    self.file_names()
                );
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    /// Assert that the file `name` contains exactly `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or differs.
    pub fn assert_content(&self, name: &str, content: &[u8]) {
        let path = self.path(name);
        let actual = fs::read(&path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", path.display()));
        assert!(
            actual == content,
            "File {} has unexpected content.\nExpected: {}\nActual: {}",
            path.display(),
            String::from_utf8_lossy(content),
            String::from_utf8_lossy(&actual)
        );
    }
}
