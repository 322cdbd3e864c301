//! Error types for docsync-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from docsync-broker
    #[error(transparent)]
    Broker(#[from] docsync_broker::Error),

    /// Error from docsync-core
    #[error(transparent)]
    Sync(#[from] docsync_core::Error),

    /// Error from docsync-store
    #[error(transparent)]
    Store(#[from] docsync_store::Error),

    /// Error from docsync-fs
    #[error(transparent)]
    Fs(#[from] docsync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
