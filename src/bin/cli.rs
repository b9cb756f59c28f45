//! rfs CLI Client
//!
//! Command-line interface for interacting with an rfs server.
//!
//! ```text
//! rfs WRITE <local> [<remote>]
//! rfs GET [-vN] <remote> [<local>]
//! rfs RM <remote>
//! rfs LS <remote> [> <local>]
//! rfs EXIT
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rfs::network::Client;
use rfs::protocol::{Reply, VersionSelector};
use rfs::{ClientConfig, Result, RfsError};
use tracing_subscriber::{fmt, EnvFilter};

/// rfs CLI
#[derive(Parser, Debug)]
#[command(name = "rfs")]
#[command(about = "CLI for the rfs versioned file store")]
struct Args {
    /// key=value config file providing IP_ADDRESS (and optionally PORT)
    #[arg(short, long, default_value = ".config", global = true)]
    config: PathBuf,

    /// Server address (host:port); overrides the config file
    #[arg(short, long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a local file as the next version of a remote file
    #[command(name = "WRITE", alias = "write")]
    Write {
        /// Local file to upload
        local: PathBuf,

        /// Remote path (defaults to the local path)
        remote: Option<String>,
    },

    /// Download one version of a remote file
    #[command(name = "GET", alias = "get")]
    Get {
        /// Version to fetch (latest when omitted), e.g. -v2
        #[arg(short = 'v', long = "version")]
        version: Option<u64>,

        /// Remote path
        remote: String,

        /// Local destination (defaults to the remote path)
        local: Option<PathBuf>,
    },

    /// Remove every version of a remote file
    #[command(name = "RM", alias = "rm")]
    Rm {
        /// Remote path
        remote: String,
    },

    /// Show versioning information of a remote file
    #[command(name = "LS", alias = "ls")]
    Ls {
        /// Remote path
        remote: String,

        /// A literal `>` followed by a local file saves the listing there
        redirect: Option<String>,

        /// Local file receiving the listing
        target: Option<PathBuf>,
    },

    /// Shut the server down
    #[command(name = "EXIT", alias = "exit")]
    Exit,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.to_string().trim_start_matches("Error: "));
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match args.server {
        Some(server_addr) => ClientConfig { server_addr },
        None => ClientConfig::from_file(&args.config)?,
    };

    match args.command {
        Commands::Write { local, remote } => {
            let remote = remote.unwrap_or_else(|| local.to_string_lossy().into_owned());
            let reply = Client::from_config(&config)?.write_file(&local, &remote)?;
            print_reply(&reply);
        }
        Commands::Get {
            version,
            remote,
            local,
        } => {
            let local = local.unwrap_or_else(|| PathBuf::from(&remote));
            let reply = get_to_file(&config, &remote, version.into(), &local)?;
            print_reply(&reply);
        }
        Commands::Rm { remote } => {
            let reply = Client::from_config(&config)?.remove(&remote)?;
            print_reply(&reply);
        }
        Commands::Ls {
            remote,
            redirect,
            target,
        } => {
            let target = match (redirect.as_deref(), target) {
                (None, None) => None,
                (Some(">"), Some(target)) => Some(target),
                _ => {
                    return Err(RfsError::Config(
                        "Usage: rfs LS <remote-file-path> [> <local-file-path>]".to_string(),
                    ))
                }
            };

            let reply = Client::from_config(&config)?.list(&remote)?;
            match target {
                Some(target) => fs::write(&target, reply.body.as_ref())?,
                None => println!("{}", reply.text()),
            }
        }
        Commands::Exit => {
            let reply = Client::from_config(&config)?.exit()?;
            print_reply(&reply);
        }
    }

    Ok(())
}

/// Download into `<local>.part`, renaming into place only on success
fn get_to_file(
    config: &ClientConfig,
    remote: &str,
    version: VersionSelector,
    local: &Path,
) -> Result<Reply> {
    let partial = PathBuf::from(format!("{}.part", local.display()));
    let mut file = File::create(&partial)?;

    let fetched = Client::from_config(config).and_then(|c| c.get_into(remote, version, &mut file));
    drop(file);

    match fetched {
        Ok(reply) => {
            fs::rename(&partial, local)?;
            Ok(reply)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

fn print_reply(reply: &Reply) {
    println!("Response from the server:\n\"{}\"", reply.text());
}
