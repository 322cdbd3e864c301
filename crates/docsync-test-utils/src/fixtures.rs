//! Seeded documents for sync scenarios.

use std::path::Path;

use docsync_store::{DirStore, DocId, MemoryStore, Metadata, RevId, part};

/// Description of a document to seed.
///
/// # Example
///
/// ```rust
/// use docsync_store::MemoryStore;
/// use docsync_test_utils::{NewDoc, seed};
///
/// let store = MemoryStore::new();
/// let (doc, _rev) = seed(&store, &NewDoc::titled("Notes.txt", "hello"));
/// assert!(!doc.as_bytes().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct NewDoc {
    pub title: Option<String>,
    pub origin: Option<String>,
    pub doc_type: String,
    pub content: Vec<u8>,
}

impl NewDoc {
    /// A `text/plain` document with a title.
    pub fn titled(title: &str, content: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            origin: None,
            doc_type: "text/plain".to_string(),
            content: content.as_bytes().to_vec(),
        }
    }

    /// A document with no metadata at all.
    pub fn untitled(doc_type: &str, content: &[u8]) -> Self {
        Self {
            title: None,
            origin: None,
            doc_type: doc_type.to_string(),
            content: content.to_vec(),
        }
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    fn meta(&self) -> Vec<u8> {
        let mut meta = Metadata::new();
        if let Some(title) = &self.title {
            meta = meta.with_title(title);
        }
        if let Some(origin) = &self.origin {
            meta = meta.with_origin(origin);
        }
        meta.to_bytes()
    }
}

/// Seed a document into a [`MemoryStore`].
pub fn seed(store: &MemoryStore, new_doc: &NewDoc) -> (DocId, RevId) {
    let meta = new_doc.meta();
    store.create_document(
        &new_doc.doc_type,
        &[(part::META, &meta), (part::FILE, &new_doc.content)],
    )
}

/// Open (creating if needed) a [`DirStore`] at `root` and seed a document.
///
/// # Panics
/// Panics if the store cannot be opened or written.
pub fn seed_dir_store(root: &Path, new_doc: &NewDoc) -> (DocId, RevId) {
    let store = DirStore::open(root)
        .unwrap_or_else(|e| panic!("Could not open store at {}: {e}", root.display()));
    let meta = new_doc.meta();
    store
        .create_document(
            &new_doc.doc_type,
            &[(part::META, &meta), (part::FILE, &new_doc.content)],
        )
        .unwrap_or_else(|e| panic!("Could not seed document: {e}"))
}
