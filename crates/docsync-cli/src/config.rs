//! Launcher settings
//!
//! Read from an optional TOML file, then overridden by environment
//! variables. Relative paths are resolved against the working directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docsync_broker::{CommandOpener, default_socket_path};
use docsync_fs::ConfigStore;
use docsync_store::BuiltinRegistry;
use serde::Deserialize;

use crate::error::{CliError, Result};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "docsync.toml";

/// Environment variable naming the store directory.
pub const STORE_ENV: &str = "DOCSYNC_STORE";

const SOCKET_ENV: &str = docsync_broker::SOCKET_ENV;
const DEFAULT_DEBOUNCE_MS: u64 = 3000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory synced files are placed in.
    pub base_dir: Option<PathBuf>,
    /// Root of the on-disk document store.
    pub store: Option<PathBuf>,
    /// Quiet period before local edits are written back.
    pub debounce_ms: Option<u64>,
    /// Socket path override.
    pub socket: Option<PathBuf>,
    /// Command used to open files; empty disables opening.
    pub open_command: Option<Vec<String>>,
    /// Extra document type to extension mappings.
    pub extensions: BTreeMap<String, Vec<String>>,
}

impl Settings {
    /// Load settings from `explicit`, or the first config file found.
    ///
    /// # Errors
    ///
    /// Fails if `explicit` does not exist or any file found cannot be parsed.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        let store = ConfigStore::new();
        if let Some(path) = explicit {
            let path = cwd.join(path);
            return Ok(store.load(&path)?);
        }
        let candidates = std::iter::once(cwd.join(LOCAL_CONFIG))
            .chain(dirs::config_dir().map(|d| d.join("docsync").join("config.toml")));
        for path in candidates {
            if let Some(settings) = store.load_optional(&path)? {
                tracing::debug!(path = %path.display(), "Loaded configuration");
                return Ok(settings);
            }
        }
        Ok(Self::default())
    }

    /// Apply environment overrides, read through `var`.
    pub fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(store) = var(STORE_ENV).filter(|v| !v.is_empty()) {
            self.store = Some(PathBuf::from(store));
        }
        if let Some(socket) = var(SOCKET_ENV).filter(|v| !v.is_empty()) {
            self.socket = Some(PathBuf::from(socket));
        }
        self
    }

    pub fn base_dir(&self, cwd: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        }
    }

    /// Store directory, defaulting to the user data directory.
    pub fn store_dir(&self, cwd: &Path) -> Result<PathBuf> {
        match &self.store {
            Some(dir) => Ok(cwd.join(dir)),
            None => dirs::data_dir()
                .map(|d| d.join("docsync").join("store"))
                .ok_or_else(|| {
                    CliError::user(format!(
                        "No store configured; set {STORE_ENV} or `store` in {LOCAL_CONFIG}"
                    ))
                }),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }

    pub fn socket_path(&self, cwd: &Path) -> PathBuf {
        match &self.socket {
            Some(socket) => cwd.join(socket),
            None => default_socket_path(cwd),
        }
    }

    pub fn opener(&self) -> CommandOpener {
        match &self.open_command {
            Some(argv) => CommandOpener::new(argv.clone()),
            None => CommandOpener::system(),
        }
    }

    pub fn registry(&self) -> BuiltinRegistry {
        let mut registry = BuiltinRegistry::new();
        for (doc_type, extensions) in &self.extensions {
            registry.register(doc_type.clone(), extensions.iter().cloned());
        }
        registry
    }
}
