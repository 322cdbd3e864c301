//! DirStore behaviour visible across store instances

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use docsync_store::{DirStore, Metadata, Store, StoreEvent, part};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn test_commit_from_other_instance_is_notified() {
    let temp = TempDir::new().unwrap();
    let watching = DirStore::open(temp.path()).unwrap();
    let (doc, base) = watching
        .create_document("text/plain", &[(part::FILE, b"v1")])
        .unwrap();

    let (tx, rx) = mpsc::channel();
    watching
        .watch(
            &doc,
            Arc::new(move |event: StoreEvent| {
                let _ = tx.send(event);
            }),
        )
        .unwrap();

    let writer_store = DirStore::open(temp.path()).unwrap();
    let mut writer = writer_store.update(&doc, &base).unwrap();
    writer.write_all(part::FILE, b"v2").unwrap();
    let rev = writer.commit().unwrap();

    let event = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("no notification for external commit");
    assert_eq!(event, StoreEvent::Modified(doc.clone()));
    assert_eq!(watching.lookup_document(&doc).unwrap(), vec![rev]);
}

#[test]
fn test_update_preserves_untouched_parts() {
    let temp = TempDir::new().unwrap();
    let store = DirStore::open(temp.path()).unwrap();
    let meta = Metadata::new().with_title("Notes.txt").to_bytes();
    let (doc, base) = store
        .create_document("text/plain", &[(part::META, &meta), (part::FILE, b"v1")])
        .unwrap();

    let mut writer = store.update(&doc, &base).unwrap();
    writer.write_all(part::FILE, b"v2").unwrap();
    let rev = writer.commit().unwrap();

    let base_stat = store.stat_revision(&base).unwrap();
    let new_stat = store.stat_revision(&rev).unwrap();
    assert_eq!(base_stat.part_hash(part::META), new_stat.part_hash(part::META));
    assert_ne!(base_stat.part_hash(part::FILE), new_stat.part_hash(part::FILE));
    assert_eq!(new_stat.doc_type, "text/plain");
}

#[test]
fn test_identical_content_shares_objects() {
    let temp = TempDir::new().unwrap();
    let store = DirStore::open(temp.path()).unwrap();
    store.create_document("text/plain", &[(part::FILE, b"same")]).unwrap();
    store.create_document("text/plain", &[(part::FILE, b"same")]).unwrap();

    let objects = std::fs::read_dir(temp.path().join("objects")).unwrap().count();
    assert_eq!(objects, 1);
}
