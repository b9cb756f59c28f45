//! Connection Handler
//!
//! Handles individual client connections: one action per connection.
//!
//! ```text
//! AWAIT_ACTION ──token──▶ action exchange ──▶ CLOSED
//!      │
//!      └── unknown token ──────────────────▶ CLOSED (no reply)
//! ```

use std::io::{self, BufReader, BufWriter, Read};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{Result, RfsError};
use crate::protocol::{
    read_frame_header, read_request, write_reply, write_reply_from, Reply, Request, Status,
    VersionSelector,
};
use crate::store::LogicalPath;

use super::server::ShutdownHandle;

/// Acknowledgement sent before the server stops
pub const EXIT_ACK: &str = "Server terminated by client";

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the storage engine
    engine: Arc<Engine>,

    /// Used by EXIT to stop the acceptor
    shutdown: ShutdownHandle,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, engine: Arc<Engine>, shutdown: ShutdownHandle) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Accepted from a non-blocking listener; some platforms inherit that
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            shutdown,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 = block indefinitely)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Serve the single action on this connection
    ///
    /// A peer hanging up mid-exchange is not treated as an error.
    pub fn handle(&mut self) -> Result<()> {
        let request = match read_request(&mut self.reader) {
            Ok(request) => request,
            Err(RfsError::UnknownAction(token)) => {
                tracing::warn!("Invalid action {:?} from {}, closing", token, self.peer_addr);
                return Ok(());
            }
            Err(e) if e.is_disconnect() => {
                tracing::debug!("Client {} disconnected before sending a request", self.peer_addr);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Error reading request from {}: {}", self.peer_addr, e);
                return Err(e);
            }
        };

        tracing::debug!("{} from {}: {:?}", request.action(), self.peer_addr, request);

        let result = match request {
            Request::Write { path } => self.handle_write(&path),
            Request::Get { path, version } => self.handle_get(&path, version),
            Request::Remove { path } => self.handle_remove(&path),
            Request::List { path } => self.handle_list(&path),
            Request::Exit => self.handle_exit(),
        };

        match result {
            Err(e) if e.is_disconnect() => {
                tracing::debug!("Client {} disconnected mid-exchange: {}", self.peer_addr, e);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Error serving {}: {}", self.peer_addr, e);
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    /// WRITE: `[path][content]` → one reply
    fn handle_write(&mut self, raw_path: &str) -> Result<()> {
        let len = read_frame_header(&mut self.reader)?;
        let mut body = (&mut self.reader).take(len);

        let reply = match LogicalPath::parse(raw_path) {
            Ok(path) => match self.engine.write(&path, &mut body, len) {
                Ok(stored) => Reply::ok(format!(
                    "Successfully writing to file '{}'",
                    stored.name.display()
                )),
                Err(e) => {
                    tracing::warn!("WRITE {} failed: {}", raw_path, e);
                    Reply::from(&e)
                }
            },
            Err(e) => Reply::from(&e),
        };

        // Whatever was not consumed still has to leave the socket
        io::copy(&mut body, &mut io::sink())?;

        write_reply(&mut self.writer, &reply)
    }

    /// GET: `[path][selector]` → content reply + status reply, or one failure
    fn handle_get(&mut self, raw_path: &str, selector: VersionSelector) -> Result<()> {
        let opened = LogicalPath::parse(raw_path)
            .and_then(|path| self.engine.open_version(&path, selector));

        let mut opened = match opened {
            Ok(opened) => opened,
            Err(e) => {
                tracing::debug!("GET {} ({:?}) failed: {}", raw_path, selector, e);
                return write_reply(&mut self.writer, &Reply::from(&e));
            }
        };

        write_reply_from(&mut self.writer, Status::Ok, &mut opened.file, opened.size)?;

        let status = format!(
            "Successfully reading from file '{}'",
            opened.name.display()
        );
        write_reply(&mut self.writer, &Reply::ok(status))
    }

    /// RM: `[path]` → per-version report
    fn handle_remove(&mut self, raw_path: &str) -> Result<()> {
        let reply = match LogicalPath::parse(raw_path).and_then(|path| self.engine.remove(&path)) {
            Ok(report) if report.any_removed() => Reply::ok(report.to_string()),
            Ok(report) => Reply::not_found(&report.to_string()),
            Err(e) => Reply::from(&e),
        };
        write_reply(&mut self.writer, &reply)
    }

    /// LS: `[path]` → versioning information
    fn handle_list(&mut self, raw_path: &str) -> Result<()> {
        let reply = match LogicalPath::parse(raw_path) {
            Ok(path) => Reply::ok(self.engine.list(&path).to_string()),
            Err(e) => Reply::from(&e),
        };
        write_reply(&mut self.writer, &reply)
    }

    /// EXIT: acknowledge, then stop the acceptor
    fn handle_exit(&mut self) -> Result<()> {
        tracing::info!("Shutdown requested by client {}", self.peer_addr);
        let sent = write_reply(&mut self.writer, &Reply::ok(EXIT_ACK));
        self.shutdown.shutdown();
        sent
    }
}
