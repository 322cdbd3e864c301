//! Filesystem primitives for docsync
//!
//! Provides the content hash shared by every sync decision, atomic file
//! writes, non-clobbering renames, file-name sanitising and config loading.

pub mod config;
pub mod error;
pub mod hash;
pub mod io;
pub mod name;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use hash::ContentHash;
pub use name::{sanitize_extension, sanitize_stem};
