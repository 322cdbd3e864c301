//! Handing resolved paths to the desktop

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

/// Opens a local file with whatever the user has associated with it.
pub trait Opener: Send + Sync {
    /// Start opening `path` without waiting for the viewer to exit.
    fn open(&self, path: &Path) -> std::io::Result<()>;
}

/// [`Opener`] that runs a command with the path appended.
///
/// An empty command disables opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOpener {
    argv: Vec<String>,
}

impl CommandOpener {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// The platform's default file opener.
    pub fn system() -> Self {
        let argv: &[&str] = if cfg!(target_os = "macos") {
            &["open"]
        } else if cfg!(windows) {
            &["cmd", "/C", "start", ""]
        } else {
            &["xdg-open"]
        };
        Self::new(argv.iter().map(|s| s.to_string()).collect())
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl Default for CommandOpener {
    fn default() -> Self {
        Self::system()
    }
}

impl Opener for CommandOpener {
    fn open(&self, path: &Path) -> std::io::Result<()> {
        let Some((program, args)) = self.argv.split_first() else {
            debug!(path = %path.display(), "Opening disabled");
            return Ok(());
        };
        let mut child = Command::new(program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!(program = %program, path = %path.display(), "Spawned opener");
        // Reap in the background so the viewer never becomes a zombie
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}
