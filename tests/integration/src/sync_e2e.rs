//! Full-stack sync scenarios
//!
//! Runs a real server in-process against an on-disk store, real file
//! watching and a real socket, then drives it the way other processes
//! would: commits through a second store handle, edits through the
//! filesystem, requests through the socket.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docsync_broker::{Opener, Request, Role, Server, negotiate, send};
use docsync_core::{NotifyWatcher, SyncContext, SyncManager, channel};
use docsync_fs::ContentHash;
use docsync_store::{BuiltinRegistry, DirStore, DocId, Metadata, RevId, Store, part};
use docsync_test_utils::{NewDoc, SyncDir, seed_dir_store};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(10);
const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Clone, Default)]
struct RecordingOpener {
    opened: Arc<Mutex<Vec<PathBuf>>>,
}

impl Opener for RecordingOpener {
    fn open(&self, path: &Path) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// A running server plus handles to poke at it from outside.
struct Stack {
    _temp: TempDir,
    dir: SyncDir,
    store_root: PathBuf,
    socket: PathBuf,
    opener: RecordingOpener,
    server: Option<JoinHandle<()>>,
}

impl Stack {
    async fn start(seeds: &[NewDoc]) -> (Self, Vec<(DocId, RevId)>) {
        let temp = TempDir::new().unwrap();
        let store_root = temp.path().join("store");
        let socket = temp.path().join("docsync.sock");
        let ids = seeds
            .iter()
            .map(|new_doc| seed_dir_store(&store_root, new_doc))
            .collect();

        let endpoint = match negotiate(&socket, None).await.unwrap() {
            Role::Server(endpoint) => endpoint,
            Role::Client(_) => panic!("socket already in use"),
        };
        let dir = SyncDir::new();
        let (events, rx) = channel();
        let watcher = NotifyWatcher::new(events.clone()).unwrap();
        let ctx = SyncContext {
            base_dir: dir.root().to_path_buf(),
            store: Arc::new(DirStore::open(&store_root).unwrap()),
            registry: Arc::new(BuiltinRegistry::new()),
            events,
            debounce: DEBOUNCE,
        };
        let manager = SyncManager::new(ctx, Box::new(watcher)).unwrap();
        let opener = RecordingOpener::default();
        let server = Server::new(endpoint, manager, rx, Arc::new(opener.clone()));
        let handle = tokio::spawn(server.run(None));

        let stack = Self {
            _temp: temp,
            dir,
            store_root,
            socket,
            opener,
            server: Some(handle),
        };
        (stack, ids)
    }

    async fn request(&self, request: Request) {
        let Role::Client(stream) = negotiate(&self.socket, Some(&request)).await.unwrap() else {
            panic!("server is not running");
        };
        tokio::time::timeout(TIMEOUT, send(stream, Some(&request)))
            .await
            .expect("server did not hang up")
            .unwrap();
    }

    /// Path the server handed to the opener for the `n`th request.
    fn opened(&self, n: usize) -> PathBuf {
        self.opener.opened.lock().unwrap()[n].clone()
    }

    /// A separate handle on the store, as another process would have.
    fn other_writer(&self) -> DirStore {
        DirStore::open(&self.store_root).unwrap()
    }

    fn head(&self, doc: &DocId) -> RevId {
        self.other_writer().lookup_document(doc).unwrap().remove(0)
    }

    fn commit(&self, doc: &DocId, changes: &[(&str, &[u8])]) -> RevId {
        let store = self.other_writer();
        let base = store.lookup_document(doc).unwrap().remove(0);
        let mut writer = store.update(doc, &base).unwrap();
        for (name, data) in changes {
            writer.write_all(name, data).unwrap();
        }
        writer.commit().unwrap()
    }

    async fn stop(mut self) {
        self.request(Request::Kill).await;
        if let Some(server) = self.server.take() {
            tokio::time::timeout(TIMEOUT, server)
                .await
                .expect("server did not stop")
                .unwrap();
        }
        assert!(!self.socket.exists());
    }
}

async fn eventually(mut ready: impl FnMut() -> bool, what: &str) {
    let poll = async {
        while !ready() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    tokio::time::timeout(TIMEOUT, poll)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_external_commit_converges_to_local_file() {
    let (stack, ids) = Stack::start(&[NewDoc::titled("Notes.txt", "v1")]).await;
    let (doc, _) = ids[0].clone();
    stack.request(Request::Document(doc.clone())).await;
    stack.dir.assert_content("Notes.txt", b"v1");

    stack.commit(&doc, &[(part::FILE, b"v2 from elsewhere")]);

    let dir = &stack.dir;
    eventually(
        || std::fs::read(dir.path("Notes.txt")).is_ok_and(|c| c == b"v2 from elsewhere"),
        "external commit to reach the local file",
    )
    .await;
    stack.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_local_edit_is_committed_with_annotation() {
    let (stack, ids) = Stack::start(&[NewDoc::titled("Notes.txt", "v1")]).await;
    let (doc, first) = ids[0].clone();
    stack.request(Request::Document(doc.clone())).await;

    std::fs::write(stack.dir.path("Notes.txt"), b"edited").unwrap();

    eventually(|| stack.head(&doc) != first, "local edit to be committed").await;
    let store = stack.other_writer();
    let head = stack.head(&doc);
    let mut reader = store.peek(&head).unwrap();
    assert_eq!(reader.read_all(part::FILE).unwrap(), b"edited");
    let meta = Metadata::parse(&reader.read_all(part::META).unwrap());
    assert_eq!(meta.comment(), Some(docsync_core::EXTERNAL_CHANGE_COMMENT));
    assert_eq!(meta.title(), Some("Notes.txt"));
    drop(reader);
    stack.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pull_does_not_echo_back_as_commit() {
    let (stack, ids) = Stack::start(&[NewDoc::titled("Notes.txt", "v1")]).await;
    let (doc, _) = ids[0].clone();
    stack.request(Request::Document(doc.clone())).await;

    let pushed = stack.commit(&doc, &[(part::FILE, b"v2")]);
    let dir = &stack.dir;
    eventually(
        || std::fs::read(dir.path("Notes.txt")).is_ok_and(|c| c == b"v2"),
        "external commit to reach the local file",
    )
    .await;

    // Well past the debounce: the write-back must not produce a commit
    tokio::time::sleep(DEBOUNCE * 5).await;
    assert_eq!(stack.head(&doc), pushed);
    stack.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_title_change_renames_local_file() {
    let (stack, ids) = Stack::start(&[NewDoc::titled("Draft.txt", "body")]).await;
    let (doc, _) = ids[0].clone();
    stack.request(Request::Document(doc.clone())).await;

    let meta = Metadata::new().with_title("Final.txt").to_bytes();
    stack.commit(&doc, &[(part::META, &meta)]);

    let dir = &stack.dir;
    eventually(
        || dir.file_names() == vec!["Final.txt".to_string()],
        "local file to be renamed",
    )
    .await;
    stack.dir.assert_content("Final.txt", b"body");

    // The renamed file is still synced
    stack.commit(&doc, &[(part::FILE, b"body v2")]);
    eventually(
        || std::fs::read(dir.path("Final.txt")).is_ok_and(|c| c == b"body v2"),
        "update to reach the renamed file",
    )
    .await;
    stack.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_revision_view_is_never_rewritten() {
    let (stack, ids) = Stack::start(&[NewDoc::titled("Plan.md", "# v1")
        .with_origin("/home/someone/plan.md")])
    .await;
    let (doc, first) = ids[0].clone();
    stack.request(Request::Revision(first.clone())).await;
    stack.request(Request::Document(doc.clone())).await;
    let rev_path = stack.opened(0);
    let doc_path = stack.opened(1);
    assert_ne!(rev_path, doc_path);

    stack.commit(&doc, &[(part::FILE, b"# v2")]);
    eventually(
        || std::fs::read(&doc_path).is_ok_and(|c| c == b"# v2"),
        "document file to update",
    )
    .await;

    assert_eq!(std::fs::read(&rev_path).unwrap(), b"# v1");
    assert_eq!(
        ContentHash::of_file(&rev_path).unwrap(),
        ContentHash::of_bytes(b"# v1")
    );
    assert!(std::fs::metadata(&rev_path).unwrap().permissions().readonly());
    stack.stop().await;
}
