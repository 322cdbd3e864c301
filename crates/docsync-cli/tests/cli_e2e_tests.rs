//! CLI end-to-end tests that run the compiled `docsync` binary.
//!
//! Every test gets its own store, socket and working directory through
//! `DOCSYNC_STORE`, `DOCSYNC_SOCKET` and a local `docsync.toml`, so tests
//! never meet each other's servers.

use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use docsync_store::{DirStore, DocId, Store, part};
use docsync_test_utils::{NewDoc, SyncDir, seed_dir_store};
use predicates::prelude::*;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Isolated environment for one test.
struct Env {
    _temp: TempDir,
    work: SyncDir,
    store: PathBuf,
    socket: PathBuf,
    config_home: PathBuf,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let store = temp.path().join("store");
        let socket = temp.path().join("docsync.sock");
        let config_home = temp.path().join("config");
        std::fs::create_dir_all(&config_home).unwrap();
        let work = SyncDir::new();
        std::fs::write(
            work.path("docsync.toml"),
            "open_command = []\ndebounce_ms = 200\n",
        )
        .unwrap();
        Self {
            _temp: temp,
            work,
            store,
            socket,
            config_home,
        }
    }

    fn seed(&self, new_doc: &NewDoc) -> DocId {
        seed_dir_store(&self.store, new_doc).0
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("docsync").expect("Failed to find docsync binary");
        self.configure(cmd.current_dir(self.work.root()));
        cmd
    }

    /// Start a long-running invocation that is expected to become the server.
    fn spawn_server(&self, args: &[&str]) -> ServerProcess {
        let mut cmd = StdCommand::new(env!("CARGO_BIN_EXE_docsync"));
        cmd.args(args)
            .current_dir(self.work.root())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        self.configure_std(&mut cmd);
        let child = cmd.spawn().expect("failed to spawn docsync");
        let process = ServerProcess { child };
        wait_until(|| self.socket.exists(), "server socket");
        process
    }

    fn configure(&self, cmd: &mut Command) {
        cmd.env("DOCSYNC_STORE", &self.store)
            .env("DOCSYNC_SOCKET", &self.socket)
            .env("XDG_CONFIG_HOME", &self.config_home)
            .env_remove("RUST_LOG");
    }

    fn configure_std(&self, cmd: &mut StdCommand) {
        cmd.env("DOCSYNC_STORE", &self.store)
            .env("DOCSYNC_SOCKET", &self.socket)
            .env("XDG_CONFIG_HOME", &self.config_home)
            .env_remove("RUST_LOG");
    }
}

/// Kills the server if a test fails before asking it to stop.
struct ServerProcess {
    child: Child,
}

impl ServerProcess {
    fn wait_for_exit(&mut self) -> std::process::ExitStatus {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status;
            }
            assert!(Instant::now() < deadline, "server did not exit");
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn wait_until(mut ready: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + TIMEOUT;
    while !ready() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn head_content(store: &Path, doc: &DocId) -> Vec<u8> {
    let store = DirStore::open(store).unwrap();
    let head = store.lookup_document(doc).unwrap().remove(0);
    store.peek(&head).unwrap().read_all(part::FILE).unwrap()
}

#[test]
fn test_help_lists_request_forms() {
    let env = Env::new();
    env.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("doc:<hex id>"))
        .stdout(predicate::str::contains("rev:<hex id>"))
        .stdout(predicate::str::contains("kill"));
}

#[test]
fn test_unknown_request_is_usage_error() {
    let env = Env::new();
    env.cmd()
        .arg("open:1234")
        .assert()
        .failure()
        .stderr(predicate::str::contains("doc:<hex id>"));
    assert!(!env.socket.exists());
}

#[test]
fn test_extra_argument_is_usage_error() {
    let env = Env::new();
    env.cmd().args(["kill", "kill"]).assert().failure();
}

#[test]
fn test_kill_without_server_fails() {
    let env = Env::new();
    env.cmd()
        .arg("kill")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No docsync server is running"));
    assert!(!env.socket.exists());
}

#[test]
fn test_first_open_materializes_file_then_kill() {
    let env = Env::new();
    let doc = env.seed(&NewDoc::titled("Notes.txt", "hello"));

    let mut server = env.spawn_server(&[&format!("doc:{doc}")]);
    env.work.wait_for_content("Notes.txt", b"hello", TIMEOUT);

    env.cmd().arg("kill").assert().success();
    assert!(server.wait_for_exit().success());
    assert!(!env.socket.exists());
}

#[test]
fn test_second_invocation_forwards_to_server() {
    let env = Env::new();
    let first = env.seed(&NewDoc::titled("First.txt", "one"));
    let second = env.seed(&NewDoc::titled("Second.txt", "two"));

    let mut server = env.spawn_server(&[&format!("doc:{first}")]);
    env.cmd().arg(format!("doc:{second}")).assert().success();

    env.work.wait_for_content("First.txt", b"one", TIMEOUT);
    env.work.wait_for_content("Second.txt", b"two", TIMEOUT);

    env.cmd().arg("kill").assert().success();
    assert!(server.wait_for_exit().success());
}

#[test]
fn test_local_edit_is_pushed_to_store() {
    let env = Env::new();
    let doc = env.seed(&NewDoc::titled("Notes.txt", "v1"));

    let mut server = env.spawn_server(&[&format!("doc:{doc}")]);
    env.work.wait_for_content("Notes.txt", b"v1", TIMEOUT);

    std::fs::write(env.work.path("Notes.txt"), b"edited locally").unwrap();
    wait_until(
        || head_content(&env.store, &doc) == b"edited locally",
        "local edit to reach the store",
    );

    env.cmd().arg("kill").assert().success();
    assert!(server.wait_for_exit().success());
}
