//! Document store access for docsync
//!
//! The document store is a collaborator: docsync only needs to look up a
//! document's current revisions, stat and read a revision's parts, commit a
//! new revision, and be told when a document changes. This crate defines
//! that narrow interface ([`Store`]), the metadata and type-registry pieces
//! the naming policy needs, and two backends:
//!
//! - [`MemoryStore`] for tests and embedding
//! - [`DirStore`] persisted under a directory, with change notifications

pub mod dir;
pub mod error;
pub mod ids;
pub mod memory;
pub mod meta;
pub mod registry;
pub mod store;

pub use dir::DirStore;
pub use error::{Error, Result};
pub use ids::{DocId, RevId};
pub use memory::MemoryStore;
pub use meta::Metadata;
pub use registry::{BuiltinRegistry, TypeRegistry};
pub use store::{EventSink, PartRead, PartWrite, RevisionStat, Store, StoreEvent, part};
