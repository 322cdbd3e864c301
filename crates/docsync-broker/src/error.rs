//! Error types for docsync-broker

use std::path::PathBuf;

/// Result type for docsync-broker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating roles or serving requests
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `kill` was requested but nothing is listening
    #[error("No docsync server is running at {}", socket.display())]
    NoServer { socket: PathBuf },

    /// A request line did not match any known form
    #[error("Invalid request '{line}': expected doc:<hex>, rev:<hex> or kill")]
    InvalidRequest { line: String },

    #[error("Cannot connect to {}: {source}", socket.display())]
    Connect {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot listen on {}: {source}", socket.display())]
    Bind {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Socket I/O error while talking to a peer
    #[error("IPC error: {0}")]
    Io(#[from] std::io::Error),

    /// Sync engine error from docsync-core
    #[error(transparent)]
    Sync(#[from] docsync_core::Error),
}
