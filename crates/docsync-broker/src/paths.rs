//! Socket path resolution

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use docsync_fs::ContentHash;

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "DOCSYNC_SOCKET";

/// Hex digits of the working-directory digest used in the socket name.
const DIGEST_LEN: usize = 16;

/// Returns the default socket path for a server syncing into `cwd`.
///
/// One name per working directory, so invocations from the same directory
/// share a server.
///
/// # Resolution Order
///
/// 1. `DOCSYNC_SOCKET` environment variable.
/// 2. System runtime directory (e.g., `$XDG_RUNTIME_DIR`).
/// 3. System temp directory (e.g., `/tmp`).
pub fn default_socket_path(cwd: &Path) -> PathBuf {
    if let Some(p) = std::env::var_os(SOCKET_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(p);
    }
    let canonical = std::fs::canonicalize(cwd).unwrap_or_else(|_| cwd.to_path_buf());
    dirs::runtime_dir()
        .filter(|p| std::fs::create_dir_all(p).is_ok())
        .unwrap_or_else(std::env::temp_dir)
        .join(socket_file_name(&canonical))
}

fn socket_file_name(dir: &Path) -> String {
    let digest = ContentHash::of_bytes(dir.as_os_str().as_encoded_bytes()).to_hex();
    format!("docsync-{}.sock", &digest[..DIGEST_LEN])
}

/// Lock file serializing promotion to server for `socket`.
pub fn lock_path(socket: &Path) -> PathBuf {
    let mut name = OsString::from(socket.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}
