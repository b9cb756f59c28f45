//! Tests for the TCP server and client
//!
//! Each test starts a server on an ephemeral port in a background thread,
//! talks to it over real sockets, then shuts it down.

use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rfs::network::{Client, Server, ShutdownHandle, EXIT_ACK};
use rfs::protocol::{read_reply, write_frame, write_request, Request, Status, VersionSelector};
use rfs::{Config, Engine, LockScope, RfsError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    temp: TempDir,
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    engine: Arc<Engine>,
    handle: Option<JoinHandle<rfs::Result<()>>>,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with_scope(LockScope::Path)
    }

    fn start_with_scope(scope: LockScope) -> Self {
        let temp = TempDir::new().unwrap();
        let config = Config::builder()
            .data_dir(temp.path())
            .listen_addr("127.0.0.1:0")
            .lock_scope(scope)
            .shutdown_grace_ms(500)
            .read_timeout_ms(5000)
            .build();

        let engine = Arc::new(Engine::open(config.clone()).unwrap());
        let mut server = Server::new(config, Arc::clone(&engine));
        let addr = server.bind().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = thread::spawn(move || server.run());

        Self {
            temp,
            addr,
            shutdown,
            engine,
            handle: Some(handle),
        }
    }

    fn client(&self) -> Client {
        Client::connect(&self.addr.to_string()).unwrap()
    }

    /// Wait for `run` to return
    fn join(&mut self) -> rfs::Result<()> {
        self.handle.take().unwrap().join().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// =============================================================================
// Action Tests
// =============================================================================

#[test]
fn test_notes_scenario_over_tcp() {
    let server = TestServer::start();

    let reply = server.client().write_bytes("notes.txt", b"hello").unwrap();
    assert_eq!(reply.text(), "Successfully writing to file 'notes.txt'");

    let reply = server.client().write_bytes("notes.txt", b"world").unwrap();
    assert_eq!(reply.text(), "Successfully writing to file 'notes_1.txt'");

    let v0 = server.client().get_bytes("notes.txt", VersionSelector::Exact(0)).unwrap();
    assert_eq!(v0, b"hello");
    let latest = server.client().get_bytes("notes.txt", VersionSelector::Latest).unwrap();
    assert_eq!(latest, b"world");

    let listing = server.client().list("notes.txt").unwrap();
    let text = listing.text();
    assert!(text.starts_with("Versioning Information about notes.txt:"));
    assert!(text.contains("File: notes.txt\nVersion: v0"));
    assert!(text.contains("File: notes_1.txt\nVersion: v1"));

    let reply = server.client().remove("notes.txt").unwrap();
    assert_eq!(
        reply.text(),
        "File 'notes.txt' is removed successfully\nFile 'notes_1.txt' is removed successfully"
    );

    match server.client().get_bytes("notes.txt", VersionSelector::Latest) {
        Err(RfsError::Remote(Status::NotFound, message)) => {
            assert_eq!(message, "Error: File 'notes.txt' not exist")
        }
        other => panic!("Expected Remote(NotFound), got {:?}", other),
    }
}

#[test]
fn test_get_returns_status_reply() {
    let server = TestServer::start();
    server.client().write_bytes("a.txt", b"abc").unwrap();
    server.client().write_bytes("a.txt", b"abcd").unwrap();

    let mut sink = Vec::new();
    let reply = server
        .client()
        .get_into("a.txt", VersionSelector::Exact(1), &mut sink)
        .unwrap();
    assert_eq!(sink, b"abcd");
    assert_eq!(reply.text(), "Successfully reading from file 'a_1.txt'");
}

#[test]
fn test_large_file_roundtrip() {
    let server = TestServer::start();
    let data: Vec<u8> = (0..200_000u32).map(|i| (i * 7 % 256) as u8).collect();

    server.client().write_bytes("big/blob.bin", &data).unwrap();
    let fetched = server
        .client()
        .get_bytes("big/blob.bin", VersionSelector::Latest)
        .unwrap();

    assert_eq!(fetched.len(), data.len());
    assert_eq!(fetched, data);
}

#[test]
fn test_write_file_from_disk() {
    let server = TestServer::start();
    let local = TempDir::new().unwrap();
    let source = local.path().join("upload.txt");
    std::fs::write(&source, b"from disk").unwrap();

    server.client().write_file(&source, "remote/upload.txt").unwrap();
    assert_eq!(
        server.client().get_bytes("remote/upload.txt", VersionSelector::Latest).unwrap(),
        b"from disk"
    );
}

#[test]
fn test_remove_missing_is_not_found() {
    let server = TestServer::start();
    match server.client().remove("ghost.txt") {
        Err(RfsError::Remote(Status::NotFound, message)) => {
            assert_eq!(message, "Error: File 'ghost.txt' not exist")
        }
        other => panic!("Expected Remote(NotFound), got {:?}", other),
    }
}

#[test]
fn test_invalid_path_rejected() {
    let server = TestServer::start();
    match server.client().write_bytes("../escape.txt", b"nope") {
        Err(RfsError::Remote(Status::Error, message)) => assert!(message.starts_with("Error")),
        other => panic!("Expected Remote(Error), got {:?}", other),
    }
    assert!(!server.temp.path().parent().unwrap().join("escape.txt").exists());
}

#[test]
fn test_reserved_directory_rejected() {
    let server = TestServer::start();
    match server.client().write_bytes(".rfs-lock.a.txt/x", b"wedge") {
        Err(RfsError::Remote(Status::Error, message)) => assert!(message.contains("reserved")),
        other => panic!("Expected Remote(Error), got {:?}", other),
    }
    assert!(!server.temp.path().join(".rfs-lock.a.txt").exists());

    server.client().write_bytes("a.txt", b"one").unwrap();
    server.client().write_bytes("a.txt", b"two").unwrap();
}

#[test]
fn test_busy_writer_gets_busy_reply() {
    let server = TestServer::start_with_scope(LockScope::Directory);
    let lock_target = rfs::store::LogicalPath::parse("shared/held.txt").unwrap();
    let guard = server.engine.locks().acquire(&lock_target).unwrap();

    match server.client().write_bytes("shared/new.txt", b"x") {
        Err(RfsError::Remote(Status::Busy, _)) => {}
        other => panic!("Expected Remote(Busy), got {:?}", other),
    }

    // The rejected upload was drained; the server keeps serving
    drop(guard);
    server.client().write_bytes("shared/new.txt", b"x").unwrap();
}

// =============================================================================
// Connection Behavior Tests
// =============================================================================

#[test]
fn test_unknown_action_closes_without_reply() {
    let server = TestServer::start();

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    write_frame(&mut stream, b"DANCE").unwrap();

    let mut buf = Vec::new();
    let n = stream.read_to_end(&mut buf).unwrap();
    assert_eq!(n, 0);

    // Still serving afterwards
    server.client().write_bytes("after.txt", b"ok").unwrap();
}

#[test]
fn test_one_action_per_connection() {
    let server = TestServer::start();

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    write_request(&mut stream, &Request::List { path: "x.txt".to_string() }).unwrap();

    let reply = read_reply(&mut stream).unwrap();
    assert!(reply.is_ok());

    // Server closed its end after the single action
    let mut rest = Vec::new();
    assert_eq!(stream.read_to_end(&mut rest).unwrap(), 0);
}

#[test]
fn test_client_disconnect_mid_upload_releases_lock() {
    let server = TestServer::start();

    {
        let mut stream = TcpStream::connect(server.addr).unwrap();
        write_request(&mut stream, &Request::Write { path: "cut.txt".to_string() }).unwrap();
        // Announce 1000 bytes, send 3, hang up
        std::io::Write::write_all(&mut stream, &1000u64.to_be_bytes()).unwrap();
        std::io::Write::write_all(&mut stream, b"abc").unwrap();
    }

    // The worker may still hold the lock briefly while it notices EOF
    let mut reply = None;
    for _ in 0..100 {
        match server.client().write_bytes("cut.txt", b"complete") {
            Err(RfsError::Remote(Status::Busy, _)) => thread::sleep(Duration::from_millis(20)),
            other => {
                reply = Some(other.unwrap());
                break;
            }
        }
    }

    let reply = reply.expect("lock never released");
    assert!(reply.text().starts_with("Successfully writing to file 'cut"));
    let stored = server.client().get_bytes("cut.txt", VersionSelector::Latest).unwrap();
    assert_eq!(stored, b"complete");
}

#[test]
fn test_connect_refused() {
    let server = TestServer::start();
    let addr = server.addr;
    drop(server);

    match Client::connect(&addr.to_string()) {
        Err(RfsError::Network(message)) => assert!(message.starts_with("Unable to connect")),
        Err(other) => panic!("Expected Network error, got {:?}", other),
        Ok(_) => panic!("Connected to a stopped server"),
    }
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_exit_stops_server() {
    let mut server = TestServer::start();

    let reply = server.client().exit().unwrap();
    assert_eq!(reply.text(), EXIT_ACK);

    server.join().unwrap();
}

#[test]
fn test_shutdown_handle_stops_server() {
    let mut server = TestServer::start();
    server.client().write_bytes("a.txt", b"1").unwrap();

    server.shutdown.shutdown();
    server.shutdown.shutdown();
    server.join().unwrap();

    let path = rfs::store::LogicalPath::parse("a.txt").unwrap();
    assert!(server.engine.physical_path(&path, 0).is_file());
}
