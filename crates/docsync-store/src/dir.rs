//! On-disk store rooted at a directory
//!
//! Layout:
//!
//! ```text
//! <root>/objects/<hash>        part blobs, named by content hash
//! <root>/revs/<rev>.toml       revision records
//! <root>/docs/<doc>.toml       document heads, most current first
//! <root>/docs/<doc>.lock       commit lock
//! ```
//!
//! Revision ids are the content hash of the revision record, so revisions
//! are content-addressed like the blobs they reference. Change
//! notifications come from a filesystem watcher on `docs/`, which also
//! picks up commits made by other processes.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use docsync_fs::{ContentHash, io};
use fs2::FileExt;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{EventSink, PartRead, PartWrite, RevisionStat, Store, StoreEvent};
use crate::{DocId, Error, Result, RevId};

const OBJECTS_DIR: &str = "objects";
const REVS_DIR: &str = "revs";
const DOCS_DIR: &str = "docs";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DocRecord {
    heads: Vec<RevId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RevRecord {
    doc: DocId,
    parent: Option<RevId>,
    doc_type: String,
    committed_at: DateTime<Utc>,
    parts: BTreeMap<String, ContentHash>,
}

type SinkMap = Arc<Mutex<HashMap<DocId, EventSink>>>;

/// A [`Store`] persisted under a root directory.
pub struct DirStore {
    root: PathBuf,
    sinks: SinkMap,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [OBJECTS_DIR, REVS_DIR, DOCS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| docsync_fs::Error::io(&path, e))?;
        }
        tracing::debug!(root = %root.display(), "Opened directory store");
        Ok(Self {
            root,
            sinks: Arc::new(Mutex::new(HashMap::new())),
            watcher: Mutex::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a new document whose first revision carries `parts`.
    pub fn create_document(&self, doc_type: &str, parts: &[(&str, &[u8])]) -> Result<(DocId, RevId)> {
        let doc = DocId::from_bytes(Uuid::new_v4().as_bytes().to_vec());
        let staged: BTreeMap<String, Vec<u8>> = parts
            .iter()
            .map(|(name, data)| (name.to_string(), data.to_vec()))
            .collect();

        let _lock = self.lock_doc(&doc)?;
        let rev = self.write_revision(&doc, None, doc_type, &staged)?;
        self.write_doc_record(
            &doc,
            &DocRecord {
                heads: vec![rev.clone()],
            },
        )?;
        Ok((doc, rev))
    }

    fn doc_path(&self, doc: &DocId) -> PathBuf {
        self.root.join(DOCS_DIR).join(format!("{}.toml", doc))
    }

    fn rev_path(&self, rev: &RevId) -> PathBuf {
        self.root.join(REVS_DIR).join(format!("{}.toml", rev))
    }

    fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(OBJECTS_DIR).join(hash.to_hex())
    }

    fn lock_doc(&self, doc: &DocId) -> Result<fs::File> {
        let path = self.root.join(DOCS_DIR).join(format!("{}.lock", doc));
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| docsync_fs::Error::io(&path, e))?;
        // Blocks while another process commits to the same document;
        // released when the handle is dropped
        file.lock_exclusive()
            .map_err(|_| docsync_fs::Error::LockFailed { path })?;
        Ok(file)
    }

    fn read_doc_record(&self, doc: &DocId) -> Result<DocRecord> {
        let path = self.doc_path(doc);
        if !path.is_file() {
            return Err(Error::DocumentNotFound { doc: doc.clone() });
        }
        read_toml(&path)
    }

    fn write_doc_record(&self, doc: &DocId, record: &DocRecord) -> Result<()> {
        let content = toml::to_string_pretty(record)?;
        io::write_atomic(&self.doc_path(doc), content.as_bytes())?;
        Ok(())
    }

    fn read_rev_record(&self, rev: &RevId) -> Result<RevRecord> {
        let path = self.rev_path(rev);
        if !path.is_file() {
            return Err(Error::RevisionNotFound { rev: rev.clone() });
        }
        read_toml(&path)
    }

    fn read_object(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        Ok(io::read_bytes(&self.object_path(hash))?)
    }

    /// Store blobs and the revision record; returns the new revision id.
    fn write_revision(
        &self,
        doc: &DocId,
        parent: Option<&RevId>,
        doc_type: &str,
        staged: &BTreeMap<String, Vec<u8>>,
    ) -> Result<RevId> {
        let mut parts = BTreeMap::new();
        for (name, data) in staged {
            let hash = ContentHash::of_bytes(data);
            let path = self.object_path(&hash);
            if !path.exists() {
                io::write_atomic(&path, data)?;
            }
            parts.insert(name.clone(), hash);
        }

        let record = RevRecord {
            doc: doc.clone(),
            parent: parent.cloned(),
            doc_type: doc_type.to_string(),
            committed_at: Utc::now(),
            parts,
        };
        let content = toml::to_string_pretty(&record)?;
        let rev = RevId::from_bytes(ContentHash::of_bytes(content.as_bytes()).as_bytes().to_vec());
        io::write_atomic(&self.rev_path(&rev), content.as_bytes())?;
        Ok(rev)
    }

    fn sinks(&self) -> MutexGuard<'_, HashMap<DocId, EventSink>> {
        self.sinks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_watcher(&self) -> Result<()> {
        let mut slot = self.watcher.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Ok(());
        }

        let sinks = self.sinks.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => dispatch_fs_event(&sinks, &event),
                Err(e) => tracing::warn!(error = %e, "Store watcher error"),
            }
        })?;
        watcher.watch(&self.root.join(DOCS_DIR), RecursiveMode::NonRecursive)?;
        *slot = Some(watcher);
        Ok(())
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = io::read_bytes(path)?;
    toml::from_str(&String::from_utf8_lossy(&bytes)).map_err(|e| Error::Corrupt {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Map a change under `docs/` to a notification for the watched document.
fn dispatch_fs_event(sinks: &SinkMap, event: &notify::Event) {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return;
    }

    for path in &event.paths {
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let Some(doc) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| DocId::from_hex(s).ok())
        else {
            continue;
        };

        let sink = sinks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&doc)
            .cloned();
        if let Some(sink) = sink {
            if path.exists() {
                sink(StoreEvent::Modified(doc));
            } else {
                sink(StoreEvent::Removed(doc));
            }
        }
    }
}

impl Store for DirStore {
    fn lookup_document(&self, doc: &DocId) -> Result<Vec<RevId>> {
        Ok(self.read_doc_record(doc)?.heads)
    }

    fn stat_revision(&self, rev: &RevId) -> Result<RevisionStat> {
        let record = self.read_rev_record(rev)?;
        Ok(RevisionStat {
            parts: record.parts,
            doc_type: record.doc_type,
        })
    }

    fn peek(&self, rev: &RevId) -> Result<Box<dyn PartRead + '_>> {
        let record = self.read_rev_record(rev)?;
        Ok(Box::new(DirReader {
            store: self,
            rev: rev.clone(),
            record,
        }))
    }

    fn update(&self, doc: &DocId, base: &RevId) -> Result<Box<dyn PartWrite + '_>> {
        let record = self.read_rev_record(base)?;
        let mut staged = BTreeMap::new();
        for (name, hash) in &record.parts {
            staged.insert(name.clone(), self.read_object(hash)?);
        }
        Ok(Box::new(DirWriter {
            store: self,
            doc: doc.clone(),
            base: base.clone(),
            doc_type: record.doc_type,
            staged,
        }))
    }

    fn watch(&self, doc: &DocId, sink: EventSink) -> Result<()> {
        self.ensure_watcher()?;
        self.sinks().insert(doc.clone(), sink);
        Ok(())
    }

    fn unwatch(&self, doc: &DocId) {
        self.sinks().remove(doc);
    }
}

struct DirReader<'a> {
    store: &'a DirStore,
    rev: RevId,
    record: RevRecord,
}

impl PartRead for DirReader<'_> {
    fn read_all(&mut self, part: &str) -> Result<Vec<u8>> {
        let hash = self
            .record
            .parts
            .get(part)
            .ok_or_else(|| Error::PartNotFound {
                rev: self.rev.clone(),
                part: part.to_string(),
            })?;
        self.store.read_object(hash)
    }
}

struct DirWriter<'a> {
    store: &'a DirStore,
    doc: DocId,
    base: RevId,
    doc_type: String,
    staged: BTreeMap<String, Vec<u8>>,
}

impl PartRead for DirWriter<'_> {
    fn read_all(&mut self, part: &str) -> Result<Vec<u8>> {
        self.staged
            .get(part)
            .cloned()
            .ok_or_else(|| Error::PartNotFound {
                rev: self.base.clone(),
                part: part.to_string(),
            })
    }
}

impl PartWrite for DirWriter<'_> {
    fn write_all(&mut self, part: &str, data: &[u8]) -> Result<()> {
        self.staged.insert(part.to_string(), data.to_vec());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<RevId> {
        let _lock = self.store.lock_doc(&self.doc)?;

        let mut record = self.store.read_doc_record(&self.doc)?;
        if record.heads.first() != Some(&self.base) {
            return Err(Error::Conflict {
                doc: self.doc.clone(),
                base: self.base.clone(),
            });
        }

        let rev = self
            .store
            .write_revision(&self.doc, Some(&self.base), &self.doc_type, &self.staged)?;
        record.heads.retain(|r| r != &self.base);
        record.heads.insert(0, rev.clone());
        self.store.write_doc_record(&self.doc, &record)?;

        tracing::debug!(doc = %self.doc, rev = %rev, "Committed revision");
        Ok(rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part;
    use tempfile::TempDir;

    #[test]
    fn create_and_read_back() {
        let temp = TempDir::new().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        let (doc, rev) = store
            .create_document("text/plain", &[(part::FILE, b"hello"), (part::META, b"{}")])
            .unwrap();

        assert_eq!(store.lookup_document(&doc).unwrap(), vec![rev.clone()]);
        let stat = store.stat_revision(&rev).unwrap();
        assert_eq!(stat.doc_type, "text/plain");
        assert_eq!(stat.part_hash(part::FILE), Some(ContentHash::of_bytes(b"hello")));
        assert_eq!(store.peek(&rev).unwrap().read_all(part::FILE).unwrap(), b"hello");
    }

    #[test]
    fn reopened_store_sees_documents() {
        let temp = TempDir::new().unwrap();
        let (doc, rev) = DirStore::open(temp.path())
            .unwrap()
            .create_document("text/plain", &[(part::FILE, b"x")])
            .unwrap();

        let reopened = DirStore::open(temp.path()).unwrap();
        assert_eq!(reopened.lookup_document(&doc).unwrap(), vec![rev]);
    }

    #[test]
    fn commit_advances_head_and_keeps_history() {
        let temp = TempDir::new().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        let (doc, base) = store.create_document("text/plain", &[(part::FILE, b"v1")]).unwrap();

        let mut writer = store.update(&doc, &base).unwrap();
        writer.write_all(part::FILE, b"v2").unwrap();
        let rev = writer.commit().unwrap();

        assert_eq!(store.lookup_document(&doc).unwrap(), vec![rev.clone()]);
        assert_eq!(store.peek(&rev).unwrap().read_all(part::FILE).unwrap(), b"v2");
        assert_eq!(store.peek(&base).unwrap().read_all(part::FILE).unwrap(), b"v1");
    }

    #[test]
    fn stale_base_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        let (doc, base) = store.create_document("text/plain", &[(part::FILE, b"v1")]).unwrap();

        let mut first = store.update(&doc, &base).unwrap();
        first.write_all(part::FILE, b"a").unwrap();
        first.commit().unwrap();

        let mut second = store.update(&doc, &base).unwrap();
        second.write_all(part::FILE, b"b").unwrap();
        assert!(matches!(second.commit(), Err(Error::Conflict { .. })));
    }

    #[test]
    fn missing_part_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        let (_, rev) = store.create_document("text/plain", &[(part::FILE, b"x")]).unwrap();

        let err = store.peek(&rev).unwrap().read_all(part::META).unwrap_err();
        assert!(err.is_not_found());
    }
}
