//! Error types for docsync-core

use std::path::PathBuf;

use docsync_store::{DocId, RevId};

/// Result type for docsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while synchronizing documents
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document has no resolvable current revision
    #[error("Document unavailable: {doc}")]
    DocumentUnavailable { doc: DocId },

    /// A revision lacks a part the syncer needs
    #[error("Revision {rev} has no {part} part")]
    PartMissing { rev: RevId, part: &'static str },

    /// The store rejected a commit because the base revision went stale
    #[error("Commit of {doc} raced with another writer")]
    CommitRace {
        doc: DocId,
        #[source]
        source: docsync_store::Error,
    },

    /// An operation needed the syncer to have completed `start_sync`
    #[error("Syncer for {doc} has not been started")]
    NotStarted { doc: DocId },

    /// Filesystem watch could not be established
    #[error("Cannot watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Store error from docsync-store
    #[error(transparent)]
    Store(#[from] docsync_store::Error),

    /// Filesystem error from docsync-fs
    #[error(transparent)]
    Fs(#[from] docsync_fs::Error),
}

impl Error {
    /// True for failures that leave sync state untouched and clear up by
    /// themselves on the next triggering event.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CommitRace { .. })
    }
}
