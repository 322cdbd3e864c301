//! Filesystem watch seam
//!
//! [`crate::SyncManager`] subscribes to the local files it projects through
//! [`FileWatcher`]. The production implementation wraps `notify`; tests
//! substitute a recorder and feed [`SyncEvent::FileChanged`] directly.

use std::path::Path;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::events::{EventSender, SyncEvent};
use crate::{Error, Result};

/// Subscribes to change notifications for individual files.
pub trait FileWatcher: Send {
    fn watch(&mut self, path: &Path) -> Result<()>;

    /// Drop the subscription for `path`. Unknown paths are ignored.
    fn unwatch(&mut self, path: &Path);
}

/// [`FileWatcher`] backed by the platform's native notification API.
pub struct NotifyWatcher {
    inner: RecommendedWatcher,
}

impl NotifyWatcher {
    /// Create a watcher that reports into the control loop's channel.
    pub fn new(events: EventSender) -> Result<Self> {
        let inner = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for path in event.paths {
                        let _ = events.send(SyncEvent::FileChanged(path));
                    }
                }
                Err(e) => {
                    let _ = events.send(SyncEvent::WatchError(e.to_string()));
                }
            }
        })
        .map_err(|source| Error::Watch {
            path: Default::default(),
            source,
        })?;
        Ok(Self { inner })
    }
}

impl FileWatcher for NotifyWatcher {
    fn watch(&mut self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "Watching file");
        self.inner
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| Error::Watch {
                path: path.to_path_buf(),
                source,
            })
    }

    fn unwatch(&mut self, path: &Path) {
        // Already gone when the file was replaced or deleted
        if self.inner.unwatch(path).is_ok() {
            debug!(path = %path.display(), "Stopped watching file");
        }
    }
}
