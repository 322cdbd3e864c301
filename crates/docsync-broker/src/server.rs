//! The server control loop
//!
//! One task owns the [`SyncManager`] and multiplexes, via `select!`:
//!
//! - new client connections
//! - parsed requests forwarded by connection tasks
//! - sync events (store and filesystem notifications, debounce firings)
//! - Ctrl-C
//!
//! Connection tasks only read a line and forward it, so every request and
//! every sync event is handled to completion before the next one starts.

use std::sync::Arc;

use docsync_core::{EventReceiver, SyncManager};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::opener::Opener;
use crate::request::Request;
use crate::role::Endpoint;

type RequestSender = mpsc::UnboundedSender<(Request, oneshot::Sender<()>)>;

pub struct Server {
    endpoint: Endpoint,
    manager: SyncManager,
    events: EventReceiver,
    opener: Arc<dyn Opener>,
}

impl Server {
    pub fn new(
        endpoint: Endpoint,
        manager: SyncManager,
        events: EventReceiver,
        opener: Arc<dyn Opener>,
    ) -> Self {
        Self {
            endpoint,
            manager,
            events,
            opener,
        }
    }

    /// Process `initial` locally, then serve until `kill` or Ctrl-C.
    pub async fn run(mut self, initial: Option<Request>) {
        if let Some(request) = initial {
            process(&mut self.manager, self.opener.as_ref(), &request);
        }

        let (requests_tx, mut requests) = mpsc::unbounded_channel();
        let mut clients = JoinSet::new();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            let Some(listener) = self.endpoint.listener() else {
                break;
            };
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        clients.spawn(handle_client(stream, requests_tx.clone()));
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
                Some((request, done)) = requests.recv() => {
                    if request == Request::Kill {
                        info!("Kill requested");
                        break;
                    }
                    process(&mut self.manager, self.opener.as_ref(), &request);
                    let _ = done.send(());
                }
                Some(event) = self.events.recv() => self.manager.handle_event(event),
                Some(_) = clients.join_next() => {}
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        self.manager.shutdown();
        self.endpoint.close();
        clients.shutdown().await;
        info!("Server stopped");
    }
}

/// Resolve a request to a local path and open it.
fn process(manager: &mut SyncManager, opener: &dyn Opener, request: &Request) {
    let resolved = match request {
        Request::Document(doc) => manager.resolve_document_path(doc),
        Request::Revision(rev) => manager.resolve_revision_path(rev),
        Request::Kill => return,
    };
    match resolved {
        Ok(path) => {
            info!(request = %request, path = %path.display(), "Opening");
            if let Err(e) = opener.open(&path) {
                warn!(path = %path.display(), error = %e, "Cannot open file");
            }
        }
        Err(e) => error!(request = %request, error = %e, "Cannot resolve request"),
    }
}

async fn handle_client(stream: UnixStream, requests: RequestSender) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => {
            debug!("Client hung up without a request");
            return;
        }
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "Failed to read request");
            return;
        }
    }
    let request = match line.parse::<Request>() {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed request");
            return;
        }
    };
    let (done_tx, done_rx) = oneshot::channel();
    if requests.send((request, done_tx)).is_err() {
        return;
    }
    // Connection closes once the request has been handled
    let _ = done_rx.await;
}
