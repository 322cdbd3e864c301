//! File naming policy
//!
//! A document's local file name is derived from its metadata and type:
//!
//! - stem: the title's stem, else the origin file's stem, else the id in hex
//! - extension: the title's extension, else the type registry's first
//!   candidate, else the origin file's extension, else `.bin`
//!
//! Both halves are sanitised so the result is always one path component
//! inside the sync directory.

use std::path::{Path, PathBuf};

use docsync_fs::{sanitize_extension, sanitize_stem};
use docsync_store::{Metadata, TypeRegistry};

/// Extension used when nothing better is known.
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Length of the id suffix used to disambiguate colliding names.
const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    pub stem: String,
    /// Empty or a single leading dot followed by the extension body.
    pub ext: String,
}

impl FileName {
    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem, self.ext)
    }
}

/// Derive a file name for a document or revision.
///
/// `id_hex` is the stem of last resort, normally the id in hex.
pub fn derive_file_name(
    meta: &Metadata,
    doc_type: &str,
    registry: &dyn TypeRegistry,
    id_hex: &str,
) -> FileName {
    let (title_stem, title_ext) = meta.title().map(split_ext).unwrap_or_default();
    let (origin_stem, origin_ext) = meta
        .origin()
        .and_then(|origin| Path::new(origin).file_name())
        .and_then(|name| name.to_str())
        .map(split_ext)
        .unwrap_or_default();

    let stem = [title_stem, origin_stem]
        .into_iter()
        .map(sanitize_stem)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| id_hex.to_string());

    let ext = std::iter::once(sanitize_extension(title_ext))
        .chain(registry.extensions(doc_type).iter().map(|e| sanitize_extension(e)))
        .chain(std::iter::once(sanitize_extension(origin_ext)))
        .find(|e| !e.is_empty())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

    FileName { stem, ext }
}

/// Pick a path for `name` inside `base_dir` that `taken` does not reject.
///
/// Tries the plain name, then `stem (<short id>)`, then `stem (<full id>)`.
/// The last form is unique per id, so it is returned even if rejected.
pub fn unique_path(
    base_dir: &Path,
    name: &FileName,
    id_hex: &str,
    taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let plain = base_dir.join(name.file_name());
    if !taken(&plain) {
        return plain;
    }
    let short: String = id_hex.chars().take(SHORT_ID_LEN).collect();
    let suffixed = base_dir.join(format!("{} ({}){}", name.stem, short, name.ext));
    if !taken(&suffixed) {
        return suffixed;
    }
    base_dir.join(format!("{} ({}){}", name.stem, id_hex, name.ext))
}

/// Split a file name into stem and extension.
///
/// Leading dots belong to the stem, so `.profile` has no extension and
/// `archive.tar.gz` splits into `archive.tar` and `.gz`.
fn split_ext(name: &str) -> (&str, &str) {
    let lead = name.len() - name.trim_start_matches('.').len();
    match name[lead..].rfind('.') {
        Some(i) => name.split_at(lead + i),
        None => (name, ""),
    }
}
