//! Launching: forward the request to a running server, or become one

use std::path::Path;
use std::sync::Arc;

use docsync_broker::{Request, Role, Server, negotiate, send};
use docsync_core::{NotifyWatcher, SyncContext, SyncManager};
use docsync_store::DirStore;
use tracing::info;

use crate::config::Settings;
use crate::error::Result;

/// Run one invocation to completion on a single-threaded runtime.
pub fn run(request: Option<Request>, settings: Settings, cwd: &Path) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(launch(request, settings, cwd))
}

async fn launch(request: Option<Request>, settings: Settings, cwd: &Path) -> Result<()> {
    let socket = settings.socket_path(cwd);
    match negotiate(&socket, request.as_ref()).await? {
        Role::Client(stream) => {
            send(stream, request.as_ref()).await?;
            Ok(())
        }
        Role::Server(endpoint) => {
            let store_dir = settings.store_dir(cwd)?;
            let store = DirStore::open(&store_dir)?;
            info!(store = %store_dir.display(), socket = %socket.display(), "Starting server");

            let (events, rx) = docsync_core::channel();
            let watcher = NotifyWatcher::new(events.clone())?;
            let ctx = SyncContext {
                base_dir: settings.base_dir(cwd),
                store: Arc::new(store),
                registry: Arc::new(settings.registry()),
                events,
                debounce: settings.debounce(),
            };
            let manager = SyncManager::new(ctx, Box::new(watcher))?;
            Server::new(endpoint, manager, rx, Arc::new(settings.opener()))
                .run(request)
                .await;
            Ok(())
        }
    }
}
