//! rfs Server Binary
//!
//! Starts the TCP server for rfs.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use rfs::config::KvFile;
use rfs::network::{Server, ShutdownHandle};
use rfs::{Config, Engine, LockScope};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing_subscriber::{fmt, EnvFilter};

/// rfs Server
#[derive(Parser, Debug)]
#[command(name = "rfs-server")]
#[command(about = "Versioned remote file storage server")]
#[command(version)]
struct Args {
    /// Data directory (root of all stored files)
    #[arg(short, long, default_value = "./rfs_data")]
    data_dir: PathBuf,

    /// Listen address (host:port); overrides the config file
    #[arg(short, long)]
    listen: Option<String>,

    /// key=value config file providing IP_ADDRESS (and optionally PORT)
    #[arg(short, long, default_value = ".config")]
    config: PathBuf,

    /// Write lock granularity: path or dir
    #[arg(long, default_value = "path")]
    lock_scope: LockScope,

    /// Grace period for in-flight connections at shutdown (milliseconds)
    #[arg(long, default_value = "5000")]
    grace_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rfs=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let listen = match resolve_listen_addr(&args) {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Error retrieving listen address: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("rfs server v{}", rfs::VERSION);
    tracing::info!("Data directory: {}", args.data_dir.display());
    tracing::info!("Listen address: {}", listen);

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(listen)
        .lock_scope(args.lock_scope)
        .shutdown_grace_ms(args.grace_ms)
        .build();

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let mut server = Server::new(config, engine);
    if let Err(e) = server.bind() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = install_signal_handler(server.shutdown_handle()) {
        tracing::warn!("Signal handling unavailable: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

/// `--listen` wins; otherwise the config file; otherwise the default
fn resolve_listen_addr(args: &Args) -> rfs::Result<String> {
    if let Some(listen) = &args.listen {
        return Ok(listen.clone());
    }
    if args.config.exists() {
        return KvFile::load(&args.config)?.server_addr();
    }
    Ok(Config::default().listen_addr)
}

/// Turn SIGINT/SIGTERM into the same shutdown EXIT uses
fn install_signal_handler(shutdown: ShutdownHandle) -> std::io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            tracing::info!("Received signal {}, initiating shutdown...", sig);
            shutdown.shutdown();
        }
    });
    Ok(())
}
