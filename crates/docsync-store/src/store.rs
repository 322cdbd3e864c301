//! The store-access interface consumed by the syncers

use std::collections::BTreeMap;
use std::sync::Arc;

use docsync_fs::ContentHash;

use crate::{DocId, Result, RevId};

/// Part names a revision may carry.
pub mod part {
    /// Structured metadata (JSON object).
    pub const META: &str = "META";
    /// Opaque payload bytes.
    pub const FILE: &str = "FILE";
}

/// What [`Store::stat_revision`] reports about one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionStat {
    /// Content hash of every part the revision carries.
    pub parts: BTreeMap<String, ContentHash>,
    /// Type identifier (MIME type or UTI) of the document's payload.
    pub doc_type: String,
}

impl RevisionStat {
    pub fn part_hash(&self, part: &str) -> Option<ContentHash> {
        self.parts.get(part).copied()
    }
}

/// Notification about a watched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The document's revision list changed.
    Modified(DocId),
    /// The document no longer exists.
    Removed(DocId),
}

impl StoreEvent {
    pub fn doc(&self) -> &DocId {
        match self {
            Self::Modified(doc) | Self::Removed(doc) => doc,
        }
    }
}

/// Receives store notifications.
///
/// Sinks must only enqueue: they may be called from a store's background
/// thread or from inside a store call, never re-enter the store.
pub type EventSink = Arc<dyn Fn(StoreEvent) + Send + Sync>;

/// Read access to the parts of one revision.
pub trait PartRead {
    fn read_all(&mut self, part: &str) -> Result<Vec<u8>>;
}

/// A pending revision opened against a base revision.
///
/// Starts out with the base revision's parts; nothing is visible to other
/// readers until [`PartWrite::commit`] succeeds.
pub trait PartWrite: PartRead {
    fn write_all(&mut self, part: &str, data: &[u8]) -> Result<()>;

    /// Publish the pending revision.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Conflict`] if the base revision is no longer
    /// current.
    fn commit(self: Box<Self>) -> Result<RevId>;
}

/// A versioned, content-addressed document store.
pub trait Store: Send + Sync {
    /// Current revisions of a document, most current first.
    fn lookup_document(&self, doc: &DocId) -> Result<Vec<RevId>>;

    fn stat_revision(&self, rev: &RevId) -> Result<RevisionStat>;

    /// Open a revision for reading.
    fn peek(&self, rev: &RevId) -> Result<Box<dyn PartRead + '_>>;

    /// Open a new revision of `doc` based on `base`.
    fn update(&self, doc: &DocId, base: &RevId) -> Result<Box<dyn PartWrite + '_>>;

    /// Deliver change notifications for `doc` to `sink`, replacing any
    /// previous sink for the same document.
    fn watch(&self, doc: &DocId, sink: EventSink) -> Result<()>;

    /// Stop notifications for `doc`. Unknown documents are ignored.
    fn unwatch(&self, doc: &DocId);
}
