//! Registry of active syncers
//!
//! The [`SyncManager`] owns one [`DocSyncer`] per document that has been
//! opened and one [`RevSyncer`] per revision, maps local paths back to the
//! document they project, and routes control-loop events to the right
//! syncer. Every path it hands out is unique across both registries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use docsync_store::{DocId, RevId, StoreEvent};
use tracing::{info, trace, warn};

use crate::doc_syncer::{DocSyncer, PathMove, SyncContext, SyncOutcome};
use crate::events::SyncEvent;
use crate::rev_syncer::RevSyncer;
use crate::watcher::FileWatcher;
use crate::{Error, Result};

pub struct SyncManager {
    ctx: SyncContext,
    watcher: Box<dyn FileWatcher>,
    docs: HashMap<DocId, DocSyncer>,
    paths: HashMap<PathBuf, DocId>,
    revs: HashMap<RevId, RevSyncer>,
}

/// Whether `path` is projected by any doc or revision syncer.
fn is_taken(paths: &HashMap<PathBuf, DocId>, revs: &HashMap<RevId, RevSyncer>, path: &Path) -> bool {
    paths.contains_key(path) || revs.values().any(|r| r.path() == Some(path))
}

impl SyncManager {
    /// Create an empty manager.
    ///
    /// The base directory is created if missing and made absolute so the
    /// paths handed out match those the watcher reports.
    pub fn new(mut ctx: SyncContext, watcher: Box<dyn FileWatcher>) -> Result<Self> {
        std::fs::create_dir_all(&ctx.base_dir)
            .map_err(|e| docsync_fs::Error::io(&ctx.base_dir, e))?;
        ctx.base_dir = std::fs::canonicalize(&ctx.base_dir)
            .map_err(|e| docsync_fs::Error::io(&ctx.base_dir, e))?;
        Ok(Self {
            ctx,
            watcher,
            docs: HashMap::new(),
            paths: HashMap::new(),
            revs: HashMap::new(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.ctx.base_dir
    }

    /// Local path of an already-synced document.
    pub fn document_path(&self, doc: &DocId) -> Option<&Path> {
        self.docs.get(doc).and_then(|s| s.path())
    }

    pub fn active_documents(&self) -> usize {
        self.docs.len()
    }

    /// Local path projecting `doc`, starting a syncer on first use.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be synced or its file cannot be
    /// watched. Nothing is registered in that case.
    pub fn resolve_document_path(&mut self, doc: &DocId) -> Result<PathBuf> {
        if let Some(path) = self.document_path(doc) {
            return Ok(path.to_path_buf());
        }

        let mut syncer = DocSyncer::new(doc.clone(), self.ctx.clone());
        {
            let (paths, revs) = (&self.paths, &self.revs);
            syncer.start_sync(&|p| is_taken(paths, revs, p))?;
        }
        let Some(path) = syncer.path().map(Path::to_path_buf) else {
            return Err(Error::DocumentUnavailable { doc: doc.clone() });
        };
        // Dropping the syncer on failure stops it
        self.watcher.watch(&path)?;

        self.paths.insert(path.clone(), doc.clone());
        self.docs.insert(doc.clone(), syncer);
        Ok(path)
    }

    /// Local read-only path projecting `rev`, written on first use.
    pub fn resolve_revision_path(&mut self, rev: &RevId) -> Result<PathBuf> {
        if let Some(path) = self.revs.get(rev).and_then(|r| r.path()) {
            return Ok(path.to_path_buf());
        }

        let mut syncer = RevSyncer::new(rev.clone(), self.ctx.clone());
        let path = {
            let (paths, revs) = (&self.paths, &self.revs);
            syncer.sync(&|p| is_taken(paths, revs, p))?
        };
        self.revs.insert(rev.clone(), syncer);
        Ok(path)
    }

    /// Route one control-loop event. Failures are logged, not returned.
    pub fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Store(event) => self.on_store_event(event),
            SyncEvent::FileChanged(path) => self.on_file_changed(&path),
            SyncEvent::DebounceElapsed { doc, generation } => {
                self.on_debounce_elapsed(&doc, generation)
            }
            SyncEvent::WatchError(message) => warn!(error = %message, "File watcher error"),
        }
    }

    /// Stop every syncer and clear the registries.
    pub fn shutdown(&mut self) {
        for (_, mut syncer) in self.docs.drain() {
            syncer.stop_sync();
        }
        for (path, _) in self.paths.drain() {
            self.watcher.unwatch(&path);
        }
        self.revs.clear();
        info!("Sync manager shut down");
    }

    fn on_store_event(&mut self, event: StoreEvent) {
        let doc = event.doc().clone();
        let (paths, revs) = (&self.paths, &self.revs);
        let Some(syncer) = self.docs.get_mut(&doc) else {
            trace!(doc = %doc, "Store event for inactive document");
            return;
        };
        let result = syncer.on_store_notification(&event, &|p| is_taken(paths, revs, p));
        self.apply(&doc, result);
    }

    fn on_debounce_elapsed(&mut self, doc: &DocId, generation: u64) {
        let (paths, revs) = (&self.paths, &self.revs);
        let Some(syncer) = self.docs.get_mut(doc) else {
            return;
        };
        let result = syncer.on_debounce_elapsed(generation, &|p| is_taken(paths, revs, p));
        self.apply(doc, result);
    }

    fn on_file_changed(&mut self, path: &Path) {
        let Some(doc) = self.paths.get(path).cloned() else {
            trace!(path = %path.display(), "Change to unmanaged path");
            return;
        };
        if !path.is_file() {
            info!(doc = %doc, path = %path.display(), "Local file removed; stopping sync");
            self.remove_document(&doc);
            return;
        }

        // Editors that save by replacing the file leave the old watch dangling
        self.watcher.unwatch(path);
        if let Err(e) = self.watcher.watch(path) {
            warn!(doc = %doc, error = %e, "Cannot re-watch local file");
        }
        if let Some(syncer) = self.docs.get_mut(&doc) {
            syncer.on_file_modified();
        }
    }

    fn apply(&mut self, doc: &DocId, result: Result<SyncOutcome>) {
        let moved = match result {
            Ok(outcome) => outcome.moved,
            Err(e) => {
                if e.is_retryable() {
                    warn!(doc = %doc, error = %e, "Local edit not committed; will retry on next change");
                } else {
                    warn!(doc = %doc, error = %e, "Sync step failed");
                }
                // The step may have renamed the file before failing
                self.unreported_move(doc)
            }
        };
        if let Some(moved) = moved {
            self.rebind(doc, moved);
        }
    }

    /// A move the syncer made but the registry has not seen yet.
    fn unreported_move(&self, doc: &DocId) -> Option<PathMove> {
        let to = self.docs.get(doc)?.path()?.to_path_buf();
        let from = self
            .paths
            .iter()
            .find(|(_, d)| *d == doc)
            .map(|(p, _)| p.clone())?;
        (from != to).then_some(PathMove { from, to })
    }

    fn rebind(&mut self, doc: &DocId, moved: PathMove) {
        self.paths.remove(&moved.from);
        self.watcher.unwatch(&moved.from);
        if let Err(e) = self.watcher.watch(&moved.to) {
            warn!(doc = %doc, error = %e, "Cannot watch renamed file");
        }
        self.paths.insert(moved.to, doc.clone());
    }

    fn remove_document(&mut self, doc: &DocId) {
        if let Some(mut syncer) = self.docs.remove(doc) {
            syncer.stop_sync();
        }
        let stale: Vec<PathBuf> = self
            .paths
            .iter()
            .filter(|(_, d)| *d == doc)
            .map(|(p, _)| p.clone())
            .collect();
        for path in stale {
            self.paths.remove(&path);
            self.watcher.unwatch(&path);
        }
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        if !self.docs.is_empty() {
            self.shutdown();
        }
    }
}
