//! In-process store
//!
//! Keeps every revision in memory. Besides implementing [`Store`] it lets
//! tests act as "another writer" (committing revisions the syncer did not
//! make), inject commit conflicts, and count commits.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use docsync_fs::ContentHash;
use uuid::Uuid;

use crate::store::{EventSink, PartRead, PartWrite, RevisionStat, Store, StoreEvent};
use crate::{DocId, Error, Result, RevId};

#[derive(Debug, Clone)]
struct RevRecord {
    doc_type: String,
    parts: BTreeMap<String, Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    heads: HashMap<DocId, Vec<RevId>>,
    revs: HashMap<RevId, RevRecord>,
    sinks: HashMap<DocId, EventSink>,
    conflicts_to_inject: usize,
    commits: usize,
}

/// A [`Store`] that lives entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document with one revision carrying `parts`.
    pub fn create_document(&self, doc_type: &str, parts: &[(&str, &[u8])]) -> (DocId, RevId) {
        let doc = DocId::from_bytes(Uuid::new_v4().as_bytes().to_vec());
        let rev = fresh_rev();
        let record = RevRecord {
            doc_type: doc_type.to_string(),
            parts: parts
                .iter()
                .map(|(name, data)| (name.to_string(), data.to_vec()))
                .collect(),
        };

        let mut inner = self.lock();
        inner.revs.insert(rev.clone(), record);
        inner.heads.insert(doc.clone(), vec![rev.clone()]);
        (doc, rev)
    }

    /// Commit a new head on behalf of another writer, replacing the listed
    /// parts of the current head. Notifies the watcher of `doc`, if any.
    pub fn commit_external(&self, doc: &DocId, changes: &[(&str, &[u8])]) -> Result<RevId> {
        let base = self
            .lookup_document(doc)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::DocumentNotFound { doc: doc.clone() })?;
        let mut writer = MemoryWriter::open(self, doc, &base)?;
        for (part, data) in changes {
            writer.write_all(part, data)?;
        }
        Box::new(writer).commit()
    }

    /// Add a head that does not replace the current ones, modelling a
    /// concurrent revision made elsewhere. The new head is listed first.
    pub fn fork(&self, doc: &DocId, changes: &[(&str, &[u8])]) -> Result<RevId> {
        let rev = fresh_rev();
        let sink = {
            let mut inner = self.lock();
            let base = inner
                .heads
                .get(doc)
                .and_then(|h| h.first())
                .cloned()
                .ok_or_else(|| Error::DocumentNotFound { doc: doc.clone() })?;
            let mut record = inner
                .revs
                .get(&base)
                .cloned()
                .ok_or(Error::RevisionNotFound { rev: base })?;
            for (part, data) in changes {
                record.parts.insert(part.to_string(), data.to_vec());
            }
            inner.revs.insert(rev.clone(), record);
            if let Some(heads) = inner.heads.get_mut(doc) {
                heads.insert(0, rev.clone());
            }
            inner.sinks.get(doc).cloned()
        };
        if let Some(sink) = sink {
            sink(StoreEvent::Modified(doc.clone()));
        }
        Ok(rev)
    }

    /// Delete a document and notify its watcher.
    pub fn remove_document(&self, doc: &DocId) {
        let sink = {
            let mut inner = self.lock();
            inner.heads.remove(doc);
            inner.sinks.get(doc).cloned()
        };
        if let Some(sink) = sink {
            sink(StoreEvent::Removed(doc.clone()));
        }
    }

    /// Make the next `n` commits fail with [`Error::Conflict`].
    pub fn inject_conflicts(&self, n: usize) {
        self.lock().conflicts_to_inject = n;
    }

    /// Number of successful commits made through [`Store::update`] or
    /// [`MemoryStore::commit_external`].
    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    /// Read a part directly, bypassing the `peek` handle.
    pub fn part(&self, rev: &RevId, part: &str) -> Result<Vec<u8>> {
        MemoryReader::open(self, rev)?.read_all(part)
    }

    /// Is anybody watching `doc`?
    pub fn is_watched(&self, doc: &DocId) -> bool {
        self.lock().sinks.contains_key(doc)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock only happens in a failing test;
        // keep serving the data rather than cascading the poison.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn fresh_rev() -> RevId {
    RevId::from_bytes(Uuid::new_v4().as_bytes().to_vec())
}

impl Store for MemoryStore {
    fn lookup_document(&self, doc: &DocId) -> Result<Vec<RevId>> {
        self.lock()
            .heads
            .get(doc)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound { doc: doc.clone() })
    }

    fn stat_revision(&self, rev: &RevId) -> Result<RevisionStat> {
        let inner = self.lock();
        let record = inner
            .revs
            .get(rev)
            .ok_or_else(|| Error::RevisionNotFound { rev: rev.clone() })?;
        Ok(RevisionStat {
            parts: record
                .parts
                .iter()
                .map(|(name, data)| (name.clone(), ContentHash::of_bytes(data)))
                .collect(),
            doc_type: record.doc_type.clone(),
        })
    }

    fn peek(&self, rev: &RevId) -> Result<Box<dyn PartRead + '_>> {
        Ok(Box::new(MemoryReader::open(self, rev)?))
    }

    fn update(&self, doc: &DocId, base: &RevId) -> Result<Box<dyn PartWrite + '_>> {
        Ok(Box::new(MemoryWriter::open(self, doc, base)?))
    }

    fn watch(&self, doc: &DocId, sink: EventSink) -> Result<()> {
        self.lock().sinks.insert(doc.clone(), sink);
        Ok(())
    }

    fn unwatch(&self, doc: &DocId) {
        self.lock().sinks.remove(doc);
    }
}

struct MemoryReader {
    rev: RevId,
    record: RevRecord,
}

impl MemoryReader {
    fn open(store: &MemoryStore, rev: &RevId) -> Result<Self> {
        let record = store
            .lock()
            .revs
            .get(rev)
            .cloned()
            .ok_or_else(|| Error::RevisionNotFound { rev: rev.clone() })?;
        Ok(Self {
            rev: rev.clone(),
            record,
        })
    }
}

impl PartRead for MemoryReader {
    fn read_all(&mut self, part: &str) -> Result<Vec<u8>> {
        self.record
            .parts
            .get(part)
            .cloned()
            .ok_or_else(|| Error::PartNotFound {
                rev: self.rev.clone(),
                part: part.to_string(),
            })
    }
}

struct MemoryWriter<'a> {
    store: &'a MemoryStore,
    doc: DocId,
    base: RevId,
    staged: RevRecord,
}

impl<'a> MemoryWriter<'a> {
    fn open(store: &'a MemoryStore, doc: &DocId, base: &RevId) -> Result<Self> {
        let staged = MemoryReader::open(store, base)?.record;
        Ok(Self {
            store,
            doc: doc.clone(),
            base: base.clone(),
            staged,
        })
    }
}

impl PartRead for MemoryWriter<'_> {
    fn read_all(&mut self, part: &str) -> Result<Vec<u8>> {
        self.staged
            .parts
            .get(part)
            .cloned()
            .ok_or_else(|| Error::PartNotFound {
                rev: self.base.clone(),
                part: part.to_string(),
            })
    }
}

impl PartWrite for MemoryWriter<'_> {
    fn write_all(&mut self, part: &str, data: &[u8]) -> Result<()> {
        self.staged.parts.insert(part.to_string(), data.to_vec());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<RevId> {
        let rev = fresh_rev();
        let sink = {
            let mut inner = self.store.lock();
            let current = inner.heads.get(&self.doc).and_then(|h| h.first()).cloned();
            if inner.conflicts_to_inject > 0 || current.as_ref() != Some(&self.base) {
                inner.conflicts_to_inject = inner.conflicts_to_inject.saturating_sub(1);
                return Err(Error::Conflict {
                    doc: self.doc.clone(),
                    base: self.base.clone(),
                });
            }

            inner.revs.insert(rev.clone(), self.staged.clone());
            if let Some(heads) = inner.heads.get_mut(&self.doc) {
                heads.retain(|r| r != &self.base);
                heads.insert(0, rev.clone());
            }
            inner.commits += 1;
            inner.sinks.get(&self.doc).cloned()
        };

        if let Some(sink) = sink {
            sink(StoreEvent::Modified(self.doc.clone()));
        }
        Ok(rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part;
    use std::sync::Arc;

    fn seeded() -> (MemoryStore, DocId, RevId) {
        let store = MemoryStore::new();
        let (doc, rev) = store.create_document("text/plain", &[(part::FILE, b"v1")]);
        (store, doc, rev)
    }

    #[test]
    fn lookup_returns_single_head() {
        let (store, doc, rev) = seeded();
        assert_eq!(store.lookup_document(&doc).unwrap(), vec![rev]);
    }

    #[test]
    fn lookup_unknown_document_fails() {
        let store = MemoryStore::new();
        let err = store.lookup_document(&DocId::from_bytes(vec![1])).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn stat_reports_part_hashes() {
        let (store, _, rev) = seeded();
        let stat = store.stat_revision(&rev).unwrap();
        assert_eq!(stat.doc_type, "text/plain");
        assert_eq!(stat.part_hash(part::FILE), Some(ContentHash::of_bytes(b"v1")));
        assert_eq!(stat.part_hash(part::META), None);
    }

    #[test]
    fn commit_replaces_head_and_notifies() {
        let (store, doc, base) = seeded();
        let seen: Arc<Mutex<Vec<StoreEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        store
            .watch(&doc, Arc::new(move |e: StoreEvent| sink_seen.lock().unwrap().push(e)))
            .unwrap();

        let mut writer = store.update(&doc, &base).unwrap();
        assert_eq!(writer.read_all(part::FILE).unwrap(), b"v1");
        writer.write_all(part::FILE, b"v2").unwrap();
        let new_rev = writer.commit().unwrap();

        assert_eq!(store.lookup_document(&doc).unwrap(), vec![new_rev.clone()]);
        assert_eq!(store.part(&new_rev, part::FILE).unwrap(), b"v2");
        assert_eq!(store.part(&base, part::FILE).unwrap(), b"v1");
        assert_eq!(store.commit_count(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![StoreEvent::Modified(doc)]);
    }

    #[test]
    fn stale_base_is_a_conflict() {
        let (store, doc, base) = seeded();
        store.commit_external(&doc, &[(part::FILE, b"other")]).unwrap();

        let mut writer = store.update(&doc, &base).unwrap();
        writer.write_all(part::FILE, b"mine").unwrap();
        let err = writer.commit().unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn injected_conflict_fails_once() {
        let (store, doc, base) = seeded();
        store.inject_conflicts(1);

        let first = store.update(&doc, &base).unwrap().commit();
        assert!(matches!(first, Err(Error::Conflict { .. })));

        let second = store.update(&doc, &base).unwrap().commit();
        assert!(second.is_ok());
    }

    #[test]
    fn fork_lists_new_head_first_and_keeps_old() {
        let (store, doc, base) = seeded();
        let forked = store.fork(&doc, &[(part::FILE, b"branch")]).unwrap();
        assert_eq!(store.lookup_document(&doc).unwrap(), vec![forked, base]);
    }

    #[test]
    fn unwatch_stops_notifications() {
        let (store, doc, _) = seeded();
        store.watch(&doc, Arc::new(|_: StoreEvent| panic!("unexpected event"))).unwrap();
        store.unwatch(&doc);
        assert!(!store.is_watched(&doc));
        store.commit_external(&doc, &[(part::FILE, b"v2")]).unwrap();
    }
}
