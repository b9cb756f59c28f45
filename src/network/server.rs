//! TCP Server
//!
//! Accepts connections and runs each on its own detached worker thread.
//!
//! The listener is non-blocking: between accept attempts the acceptor waits
//! on the shutdown channel, so EXIT (or a signal) stops it promptly. Workers
//! each hold a clone of a "done" sender; once the acceptor stops it waits
//! for every sender to drop, up to the configured grace period.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, RfsError};

use super::connection::Connection;

/// How long the acceptor sleeps between accept attempts when idle
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cloneable trigger that stops a running [`Server`]
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Sender<()>,
}

impl ShutdownHandle {
    /// Ask the acceptor to stop; safe to call more than once
    pub fn shutdown(&self) {
        let _ = self.tx.try_send(());
    }
}

/// TCP server for rfs
pub struct Server {
    /// Server configuration
    config: Config,

    /// Shared storage engine
    engine: Arc<Engine>,

    /// Bound listener (set by `bind`, consumed by `run`)
    listener: Option<TcpListener>,

    /// Shutdown signal
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

impl Server {
    /// Create a new server with the given config and engine
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        let (shutdown_tx, shutdown_rx) = channel::bounded(1);
        Self {
            config,
            engine,
            listener: None,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind the listening socket and return the bound address
    ///
    /// Useful with port 0 to learn the ephemeral port before `run`.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            RfsError::Network(format!(
                "Couldn't bind to {}: {}",
                self.config.listen_addr, e
            ))
        })?;
        listener.set_nonblocking(true)?;

        let addr = listener.local_addr()?;
        tracing::info!("Listening for incoming connections on {}", addr);
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Handle that stops `run` from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Address of the bound listener, if bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| RfsError::Network("listener not bound".to_string()))?;

        let (done_tx, done_rx) = channel::bounded::<()>(0);
        let mut next_id: u64 = 1;

        loop {
            if self.shutdown_rx.try_recv().is_ok() {
                break;
            }

            match listener.accept() {
                Ok((stream, peer)) => {
                    tracing::debug!("Client connected from {}", peer);
                    self.spawn_worker(stream, next_id, done_tx.clone());
                    next_id += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if self.shutdown_rx.recv_timeout(ACCEPT_POLL_INTERVAL).is_ok() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // An individual accept failure never stops the server
                    tracing::warn!("Can't accept: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Shutdown requested, no longer accepting connections");
        drop(listener);
        drop(done_tx);

        let grace = Duration::from_millis(self.config.shutdown_grace_ms);
        match done_rx.recv_timeout(grace) {
            Err(RecvTimeoutError::Timeout) => tracing::warn!(
                "Connections still in flight after {:?}; abandoning them",
                grace
            ),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("All connections finished")
            }
        }

        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown_handle().shutdown();
    }

    /// Run one connection on a detached thread
    fn spawn_worker(&self, stream: TcpStream, id: u64, done: Sender<()>) {
        let engine = Arc::clone(&self.engine);
        let shutdown = self.shutdown_handle();
        let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

        let spawned = thread::Builder::new()
            .name(format!("rfs-conn-{}", id))
            .spawn(move || {
                let _done = done;
                let served = Connection::new(stream, engine, shutdown).and_then(|mut conn| {
                    conn.set_timeouts(read_ms, write_ms)?;
                    conn.handle()
                });
                if let Err(e) = served {
                    tracing::debug!("Connection {} ended with error: {}", id, e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Fail to create thread for connection {}: {}", id, e);
        }
    }
}
