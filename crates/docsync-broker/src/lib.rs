//! Single-instance request broker for docsync
//!
//! The first invocation in a working directory becomes the server: it owns
//! the sync engine and listens on a Unix domain socket. Later invocations
//! connect, send their request as one line, and exit once the server hangs
//! up.
//!
//! - [`request`]: the `doc:` / `rev:` / `kill` request forms
//! - [`role`]: client/server negotiation and the bound endpoint
//! - [`server`]: the control loop
//! - [`opener`]: handing paths to the desktop

pub mod error;
pub mod opener;
pub mod paths;
pub mod request;
pub mod role;
pub mod server;

pub use error::{Error, Result};
pub use opener::{CommandOpener, Opener};
pub use paths::{SOCKET_ENV, default_socket_path, lock_path};
pub use request::{Request, USAGE};
pub use role::{Endpoint, Role, negotiate, send};
pub use server::Server;
