//! Shared test utilities for the docsync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`fixtures`]: seeded documents in either store backend
//! - [`sync_dir`]: [`SyncDir`] temporary sync directory with assertions

pub mod fixtures;
pub mod sync_dir;

pub use fixtures::{NewDoc, seed, seed_dir_store};
pub use sync_dir::SyncDir;
