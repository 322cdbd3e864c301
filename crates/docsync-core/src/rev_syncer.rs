//! Read-only projection of a single revision
//!
//! Revisions are immutable, so a revision's file is written once, marked
//! read-only, and never watched.

use std::path::{Path, PathBuf};

use docsync_fs::io;
use docsync_store::{Metadata, RevId, part};
use tracing::info;

use crate::doc_syncer::SyncContext;
use crate::naming;
use crate::{Error, Result};

pub struct RevSyncer {
    rev: RevId,
    ctx: SyncContext,
    path: Option<PathBuf>,
}

impl RevSyncer {
    pub fn new(rev: RevId, ctx: SyncContext) -> Self {
        Self {
            rev,
            ctx,
            path: None,
        }
    }

    pub fn rev(&self) -> &RevId {
        &self.rev
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the revision's payload to its local path, once.
    ///
    /// `taken` reports paths owned by other syncers.
    pub fn sync(&mut self, taken: &dyn Fn(&Path) -> bool) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        let stat = self.ctx.store.stat_revision(&self.rev)?;
        if stat.part_hash(part::FILE).is_none() {
            return Err(Error::PartMissing {
                rev: self.rev.clone(),
                part: part::FILE,
            });
        }
        let mut reader = self.ctx.store.peek(&self.rev)?;
        let meta = match reader.read_all(part::META) {
            Ok(bytes) => Metadata::parse(&bytes),
            Err(e) if e.is_not_found() => Metadata::new(),
            Err(e) => return Err(e.into()),
        };
        let data = reader.read_all(part::FILE)?;
        drop(reader);

        let id_hex = self.rev.to_hex();
        let name =
            naming::derive_file_name(&meta, &stat.doc_type, self.ctx.registry.as_ref(), &id_hex);
        let path = naming::unique_path(&self.ctx.base_dir, &name, &id_hex, taken);

        io::write_atomic(&path, &data)?;
        io::set_readonly(&path)?;
        info!(rev = %self.rev, path = %path.display(), "Materialized revision");
        self.path = Some(path.clone());
        Ok(path)
    }
}
