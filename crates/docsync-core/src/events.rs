//! Events delivered to the sync control loop
//!
//! Store notifications, filesystem notifications and debounce firings all
//! arrive as [`SyncEvent`] messages on one channel and are handled one at a
//! time by [`crate::SyncManager::handle_event`]. Producers only enqueue, so
//! no handler ever re-enters a syncer.

use std::path::PathBuf;
use std::sync::Arc;

use docsync_store::{DocId, EventSink, StoreEvent};
use tokio::sync::mpsc;

/// A message for the sync control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The store reported a change to a watched document.
    Store(StoreEvent),
    /// Something happened to a watched file.
    FileChanged(PathBuf),
    /// A document's debounce period ended.
    DebounceElapsed { doc: DocId, generation: u64 },
    /// The filesystem watcher reported an error.
    WatchError(String),
}

pub type EventSender = mpsc::UnboundedSender<SyncEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SyncEvent>;

/// Create the control loop's event channel.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Adapt the event channel into a store notification sink.
pub fn store_sink(events: &EventSender) -> EventSink {
    let events = events.clone();
    Arc::new(move |event: StoreEvent| {
        // Receiver gone means the loop is shutting down
        let _ = events.send(SyncEvent::Store(event));
    })
}
