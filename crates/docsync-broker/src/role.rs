//! Client/server role negotiation
//!
//! Every invocation first tries to reach a running server. Whoever finds
//! nobody listening promotes itself. A sibling lock file serialises the
//! check-then-bind step only; once bound, the listening socket itself is
//! what turns later invocations into clients.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use crate::paths::lock_path;
use crate::request::Request;
use crate::{Error, Result};

/// Outcome of [`negotiate`].
#[derive(Debug)]
pub enum Role {
    /// A server is running; forward the request to it.
    Client(UnixStream),
    /// Nobody was listening; this process is now the server.
    Server(Endpoint),
}

/// A bound socket owned by the server.
///
/// Dropping it removes the socket file.
#[derive(Debug)]
pub struct Endpoint {
    listener: Option<UnixListener>,
    socket: PathBuf,
}

impl Endpoint {
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn listener(&self) -> Option<&UnixListener> {
        self.listener.as_ref()
    }

    /// Stop listening and remove the socket file. Idempotent.
    ///
    /// The file is unlinked under the promotion lock while the listener is
    /// still open, so no successor can bind in between.
    pub fn close(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let lock = match acquire_lock(&self.socket) {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(error = %e, "Removing socket without the promotion lock");
                None
            }
        };
        if let Err(e) = std::fs::remove_file(&self.socket) {
            debug!(socket = %self.socket.display(), error = %e, "Socket file already gone");
        }
        drop(listener);
        drop(lock);
        info!(socket = %self.socket.display(), "Stopped listening");
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decide whether this invocation is a client or the server.
///
/// # Errors
///
/// - [`Error::NoServer`] if the request is `kill` and nobody is listening
/// - [`Error::Connect`] for connection failures other than "nobody there"
/// - [`Error::Bind`] / [`Error::Lock`] if promotion fails
pub async fn negotiate(socket: &Path, request: Option<&Request>) -> Result<Role> {
    match UnixStream::connect(socket).await {
        Ok(stream) => {
            debug!(socket = %socket.display(), "Connected to running server");
            Ok(Role::Client(stream))
        }
        Err(e) if nobody_listening(&e) => {
            if matches!(request, Some(Request::Kill)) {
                return Err(Error::NoServer {
                    socket: socket.to_path_buf(),
                });
            }
            promote(socket).await
        }
        Err(source) => Err(Error::Connect {
            socket: socket.to_path_buf(),
            source,
        }),
    }
}

/// Send `request` to a running server and wait for it to hang up.
///
/// With no request the connection is simply closed.
pub async fn send(mut stream: UnixStream, request: Option<&Request>) -> Result<()> {
    if let Some(request) = request {
        stream.write_all(format!("{request}\n").as_bytes()).await?;
        stream.flush().await?;
        debug!(request = %request, "Sent request");
    }
    stream.shutdown().await?;
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await?;
    Ok(())
}

fn nobody_listening(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused)
}

/// Take the promotion lock for `socket`. Released when the file is dropped.
fn acquire_lock(socket: &Path) -> Result<File> {
    let lock_file = lock_path(socket);
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_file)
        .and_then(|f| f.lock_exclusive().map(|_| f))
        .map_err(|source| Error::Lock {
            path: lock_file,
            source,
        })
}

/// Held only for check-then-bind, never for the server's lifetime.
async fn promote(socket: &Path) -> Result<Role> {
    let lock = acquire_lock(socket)?;

    // Another invocation may have promoted while we waited for the lock
    match UnixStream::connect(socket).await {
        Ok(stream) => return Ok(Role::Client(stream)),
        Err(e) if nobody_listening(&e) => {}
        Err(source) => {
            return Err(Error::Connect {
                socket: socket.to_path_buf(),
                source,
            });
        }
    }

    if std::fs::symlink_metadata(socket).is_ok() {
        info!(socket = %socket.display(), "Removing stale socket");
        std::fs::remove_file(socket).map_err(|source| Error::Bind {
            socket: socket.to_path_buf(),
            source,
        })?;
    }
    let listener = UnixListener::bind(socket).map_err(|source| Error::Bind {
        socket: socket.to_path_buf(),
        source,
    })?;
    drop(lock);
    info!(socket = %socket.display(), "Listening for requests");
    Ok(Role::Server(Endpoint {
        listener: Some(listener),
        socket: socket.to_path_buf(),
    }))
}
