//! Error types for docsync-store

use crate::{DocId, RevId};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a document store
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document has never existed or was deleted
    #[error("Document not found: {doc}")]
    DocumentNotFound { doc: DocId },

    /// The revision is unknown to the store
    #[error("Revision not found: {rev}")]
    RevisionNotFound { rev: RevId },

    /// The revision exists but does not carry the requested part
    #[error("Revision {rev} has no {part} part")]
    PartNotFound { rev: RevId, part: String },

    /// A commit was based on a revision that is no longer current
    #[error("Commit to {doc} rejected: base revision {base} is stale")]
    Conflict { doc: DocId, base: RevId },

    /// An identifier could not be decoded
    #[error("Invalid {kind} id: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    /// On-disk store record is unreadable
    #[error("Corrupt store record {path}: {message}")]
    Corrupt { path: String, message: String },

    /// Filesystem error from docsync-fs
    #[error(transparent)]
    Fs(#[from] docsync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    /// Filesystem notification backend error
    #[error(transparent)]
    Watch(#[from] notify::Error),
}

impl Error {
    /// True when the store itself is fine but the request named something
    /// that is not there.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DocumentNotFound { .. } | Self::RevisionNotFound { .. } | Self::PartNotFound { .. }
        )
    }
}
