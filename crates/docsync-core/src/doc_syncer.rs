//! Per-document two-way synchronization
//!
//! A [`DocSyncer`] keeps one document's current revision and one local file
//! convergent:
//!
//! - store to file: when the document's current revision list no longer
//!   contains the revision last synced, the new head is adopted, the file
//!   renamed if the name-relevant metadata changed, and the payload written
//!   out if its hash changed
//! - file to store: local modifications arm a debounce timer; when it
//!   elapses the file is hashed and, if it differs from the last synced
//!   payload, committed as a new revision on top of the synced one
//!
//! The syncer never calls back into its owner. Operations return a
//! [`SyncOutcome`] describing side effects the owner must mirror (a changed
//! path), and asynchronous triggers (store notifications, debounce firings)
//! arrive as [`SyncEvent`]s on the control loop's channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docsync_fs::{ContentHash, io};
use docsync_store::{DocId, Metadata, RevId, RevisionStat, Store, StoreEvent, TypeRegistry, part};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{self, EventSender, SyncEvent};
use crate::naming;
use crate::{Error, Result};

/// Annotation comment attached to revisions committed from a local edit.
pub const EXTERNAL_CHANGE_COMMENT: &str = "<<Changed by external app>>";

/// Everything a syncer needs from its environment.
#[derive(Clone)]
pub struct SyncContext {
    /// Directory local files are placed in.
    pub base_dir: PathBuf,
    pub store: Arc<dyn Store>,
    pub registry: Arc<dyn TypeRegistry>,
    /// Control loop channel for store notifications and debounce firings.
    pub events: EventSender,
    /// Quiet period between the last local modification and write-back.
    pub debounce: Duration,
}

/// A rename of a document's local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Side effects of one sync step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The local file moved.
    pub moved: Option<PathMove>,
    /// The local file's content was replaced from the store.
    pub wrote_file: bool,
    /// A local edit was committed as this revision.
    pub committed: Option<RevId>,
}

impl SyncOutcome {
    fn merge(mut self, other: SyncOutcome) -> Self {
        self.moved = match (self.moved, other.moved) {
            (Some(first), Some(second)) => Some(PathMove {
                from: first.from,
                to: second.to,
            }),
            (first, second) => second.or(first),
        };
        self.wrote_file |= other.wrote_file;
        self.committed = other.committed.or(self.committed);
        self
    }
}

/// What the syncer believes was last synchronized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub revision: Option<RevId>,
    pub meta_hash: Option<ContentHash>,
    pub file_hash: Option<ContentHash>,
    pub path: Option<PathBuf>,
}

pub struct DocSyncer {
    doc: DocId,
    ctx: SyncContext,
    state: SyncState,
    watching: bool,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

impl DocSyncer {
    pub fn new(doc: DocId, ctx: SyncContext) -> Self {
        Self {
            doc,
            ctx,
            state: SyncState::default(),
            watching: false,
            timer: None,
            generation: 0,
        }
    }

    pub fn doc(&self) -> &DocId {
        &self.doc
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Current local path; set once `start_sync` has succeeded.
    pub fn path(&self) -> Option<&Path> {
        self.state.path.as_deref()
    }

    /// Whether a local modification is waiting for its debounce to elapse.
    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    /// Subscribe to store notifications and perform the first reconcile,
    /// which fixes the local path and materializes the file.
    ///
    /// `taken` reports paths owned by other syncers.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be resolved or its file cannot be
    /// written; the syncer is left stopped.
    pub fn start_sync(&mut self, taken: &dyn Fn(&Path) -> bool) -> Result<()> {
        self.ctx
            .store
            .watch(&self.doc, events::store_sink(&self.ctx.events))?;
        self.watching = true;

        match self.reconcile(taken) {
            Ok(_) => {
                info!(doc = %self.doc, path = ?self.state.path, "Started syncing document");
                Ok(())
            }
            Err(e) => {
                self.stop_sync();
                Err(e)
            }
        }
    }

    /// Unsubscribe and cancel any pending write-back. Idempotent.
    pub fn stop_sync(&mut self) {
        if self.watching {
            self.ctx.store.unwatch(&self.doc);
            self.watching = false;
            debug!(doc = %self.doc, "Stopped syncing document");
        }
        self.cancel_timer();
    }

    /// React to a store notification for this document.
    ///
    /// Ignored while a local modification is pending: the local edit is
    /// committed first, on top of whatever head it finds then.
    pub fn on_store_notification(
        &mut self,
        event: &StoreEvent,
        taken: &dyn Fn(&Path) -> bool,
    ) -> Result<SyncOutcome> {
        match event {
            StoreEvent::Modified(_) if self.is_pending() => {
                debug!(doc = %self.doc, "Store changed while local edit pending; deferring");
                Ok(SyncOutcome::default())
            }
            StoreEvent::Modified(_) => self.reconcile(taken),
            StoreEvent::Removed(_) => {
                warn!(doc = %self.doc, "Document removed from store; keeping local file");
                Ok(SyncOutcome::default())
            }
        }
    }

    /// Note a local modification and (re)arm the debounce timer.
    ///
    /// Must be called from within a tokio runtime. A notification for
    /// content identical to the last synced payload does not arm the timer,
    /// which keeps the syncer's own write-back from echoing.
    pub fn on_file_modified(&mut self) {
        if !self.is_pending() && self.local_matches_synced() {
            debug!(doc = %self.doc, "Local file matches synced content");
            return;
        }
        self.cancel_timer();
        let generation = self.generation;
        let doc = self.doc.clone();
        let events = self.ctx.events.clone();
        let delay = self.ctx.debounce;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SyncEvent::DebounceElapsed { doc, generation });
        }));
        debug!(doc = %self.doc, generation, "Local modification; debounce armed");
    }

    /// Handle a debounce firing. Stale generations are ignored.
    pub fn on_debounce_elapsed(
        &mut self,
        generation: u64,
        taken: &dyn Fn(&Path) -> bool,
    ) -> Result<SyncOutcome> {
        if self.timer.is_none() || generation != self.generation {
            debug!(doc = %self.doc, generation, "Ignoring stale debounce");
            return Ok(SyncOutcome::default());
        }
        self.timer = None;
        self.generation += 1;
        self.push(taken)
    }

    /// Bring the local file in line with the document's current revision.
    ///
    /// No-op while the last synced revision is still among the current
    /// ones. Otherwise the first current revision is adopted.
    pub fn reconcile(&mut self, taken: &dyn Fn(&Path) -> bool) -> Result<SyncOutcome> {
        self.adopt_head(taken, true)
    }

    /// Adopt the document's first current revision unless the synced one is
    /// still current. With `write_file` unset the local payload and its
    /// synced hash are left alone.
    fn adopt_head(
        &mut self,
        taken: &dyn Fn(&Path) -> bool,
        write_file: bool,
    ) -> Result<SyncOutcome> {
        let revisions = match self.ctx.store.lookup_document(&self.doc) {
            Ok(revisions) => revisions,
            Err(e) if e.is_not_found() => {
                return Err(Error::DocumentUnavailable {
                    doc: self.doc.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if let Some(current) = &self.state.revision {
            if revisions.contains(current) {
                return Ok(SyncOutcome::default());
            }
        }
        let Some(head) = revisions.into_iter().next() else {
            return Err(Error::DocumentUnavailable {
                doc: self.doc.clone(),
            });
        };

        let stat = self.ctx.store.stat_revision(&head)?;
        let Some(file_hash) = stat.part_hash(part::FILE) else {
            return Err(Error::PartMissing {
                rev: head,
                part: part::FILE,
            });
        };

        let mut outcome = SyncOutcome::default();
        let meta_hash = stat.part_hash(part::META);
        if self.state.path.is_none() || meta_hash != self.state.meta_hash {
            outcome.moved = self.update_file_name(&head, &stat, taken)?;
            self.state.meta_hash = meta_hash;
        }

        if write_file && self.state.file_hash != Some(file_hash) {
            self.write_to_filesystem(&head)?;
            self.state.file_hash = Some(file_hash);
            outcome.wrote_file = true;
        }

        debug!(doc = %self.doc, rev = %head, "Adopted revision");
        self.state.revision = Some(head);
        Ok(outcome)
    }

    /// Commit the local file as a new revision if it differs from the last
    /// synced payload.
    ///
    /// If another writer committed since the last sync, the newer head is
    /// adopted (renaming the file if needed, keeping its content) and the
    /// local payload is committed on top of it once more.
    ///
    /// # Errors
    ///
    /// [`Error::CommitRace`] when that second commit loses too. The local
    /// file keeps its content and the next local modification retries.
    pub fn push(&mut self, taken: &dyn Fn(&Path) -> bool) -> Result<SyncOutcome> {
        let (Some(path), Some(base)) = (self.state.path.clone(), self.state.revision.clone())
        else {
            return Err(Error::NotStarted {
                doc: self.doc.clone(),
            });
        };

        let data = io::read_bytes(&path)?;
        let hash = ContentHash::of_bytes(&data);
        if self.state.file_hash == Some(hash) {
            // Notifications are dropped while an edit is pending; catch up
            debug!(doc = %self.doc, "Local file unchanged");
            return self.reconcile(taken);
        }

        let mut outcome = SyncOutcome::default();
        let rev = match self.commit_local(&base, &data) {
            Err(Error::CommitRace { .. }) => {
                warn!(
                    doc = %self.doc,
                    "Document changed in the store during a local edit; local version wins"
                );
                outcome = self.adopt_head(taken, false)?;
                let Some(base) = self.state.revision.clone() else {
                    return Err(Error::NotStarted {
                        doc: self.doc.clone(),
                    });
                };
                self.commit_local(&base, &data)?
            }
            result => result?,
        };

        info!(doc = %self.doc, rev = %rev, "Committed local changes");
        match self.ctx.store.stat_revision(&rev) {
            Ok(stat) => self.state.meta_hash = stat.part_hash(part::META),
            Err(e) => warn!(doc = %self.doc, error = %e, "Cannot stat committed revision"),
        }
        self.state.file_hash = Some(hash);
        self.state.revision = Some(rev.clone());

        // Another head may have appeared while the edit was pending
        let catch_up = self.reconcile(taken)?;
        Ok(outcome
            .merge(SyncOutcome {
                committed: Some(rev),
                ..SyncOutcome::default()
            })
            .merge(catch_up))
    }

    /// Write `data` as the FILE part of a new revision on top of `base`,
    /// with the external-change annotation.
    fn commit_local(&self, base: &RevId, data: &[u8]) -> Result<RevId> {
        let mut writer = self.ctx.store.update(&self.doc, base)?;
        let mut meta = match writer.read_all(part::META) {
            Ok(bytes) => Metadata::parse(&bytes),
            Err(e) if e.is_not_found() => Metadata::new(),
            Err(e) => return Err(e.into()),
        };
        meta.set_comment(EXTERNAL_CHANGE_COMMENT);
        writer.write_all(part::META, &meta.to_bytes())?;
        writer.write_all(part::FILE, data)?;
        writer.commit().map_err(|e| match e {
            e @ docsync_store::Error::Conflict { .. } => Error::CommitRace {
                doc: self.doc.clone(),
                source: e,
            },
            e => Error::Store(e),
        })
    }

    fn update_file_name(
        &mut self,
        head: &RevId,
        stat: &RevisionStat,
        taken: &dyn Fn(&Path) -> bool,
    ) -> Result<Option<PathMove>> {
        let meta = match self.ctx.store.peek(head).and_then(|mut r| r.read_all(part::META)) {
            Ok(bytes) => Metadata::parse(&bytes),
            Err(e) if e.is_not_found() => Metadata::new(),
            Err(e) => return Err(e.into()),
        };
        let id_hex = self.doc.to_hex();
        let name =
            naming::derive_file_name(&meta, &stat.doc_type, self.ctx.registry.as_ref(), &id_hex);
        let current = self.state.path.clone();
        let new_path = naming::unique_path(&self.ctx.base_dir, &name, &id_hex, |p| {
            current.as_deref() != Some(p) && taken(p)
        });

        let Some(old_path) = current else {
            self.state.path = Some(new_path);
            return Ok(None);
        };
        if old_path == new_path {
            return Ok(None);
        }
        if old_path.is_file() {
            if let Err(e) = io::rename_no_clobber(&old_path, &new_path) {
                warn!(doc = %self.doc, error = %e, "Cannot rename local file; keeping old name");
                return Ok(None);
            }
        }
        info!(doc = %self.doc, from = %old_path.display(), to = %new_path.display(), "Renamed local file");
        self.state.path = Some(new_path.clone());
        Ok(Some(PathMove {
            from: old_path,
            to: new_path,
        }))
    }

    fn write_to_filesystem(&mut self, rev: &RevId) -> Result<()> {
        self.cancel_timer();
        let Some(path) = self.state.path.clone() else {
            return Err(Error::NotStarted {
                doc: self.doc.clone(),
            });
        };
        let data = self.ctx.store.peek(rev)?.read_all(part::FILE)?;
        io::overwrite(&path, &data)?;
        debug!(doc = %self.doc, path = %path.display(), bytes = data.len(), "Wrote local file");
        Ok(())
    }

    fn local_matches_synced(&self) -> bool {
        match (&self.state.path, self.state.file_hash) {
            (Some(path), Some(synced)) => ContentHash::of_file(path).is_ok_and(|h| h == synced),
            _ => false,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
    }
}

impl Drop for DocSyncer {
    fn drop(&mut self) {
        self.stop_sync();
    }
}
