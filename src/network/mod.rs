//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single non-blocking acceptor thread
//! - One detached worker thread per connection, one action per connection
//! - Handlers run against the shared `Engine`

mod client;
mod connection;
mod server;

pub use client::Client;
pub use connection::{Connection, EXIT_ACK};
pub use server::{Server, ShutdownHandle};
