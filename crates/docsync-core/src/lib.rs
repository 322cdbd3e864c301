//! Synchronization engine for docsync
//!
//! Projects store documents onto ordinary local files and keeps both sides
//! convergent:
//!
//! - [`DocSyncer`]: two-way sync of one document and one file
//! - [`RevSyncer`]: one-shot read-only projection of a revision
//! - [`SyncManager`]: registry of syncers and router for control-loop events
//!
//! All asynchronous inputs (store notifications, filesystem notifications,
//! debounce firings) are [`SyncEvent`]s delivered over one channel and
//! handled sequentially by whoever owns the manager.

pub mod doc_syncer;
pub mod error;
pub mod events;
pub mod manager;
pub mod naming;
pub mod rev_syncer;
pub mod watcher;

pub use doc_syncer::{DocSyncer, EXTERNAL_CHANGE_COMMENT, PathMove, SyncContext, SyncOutcome, SyncState};
pub use error::{Error, Result};
pub use events::{EventReceiver, EventSender, SyncEvent, channel};
pub use manager::SyncManager;
pub use naming::{FileName, derive_file_name};
pub use rev_syncer::RevSyncer;
pub use watcher::{FileWatcher, NotifyWatcher};
