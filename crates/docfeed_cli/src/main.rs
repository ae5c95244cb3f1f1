//! DocFeed CLI
//!
//! Runs the change-feed server and offers maintenance tools over a data
//! directory.
//!
//! # Commands
//!
//! - `serve` - Run the WebSocket sync server
//! - `ingest` - Ingest a batch of documents from a file
//! - `headers` - List headers, optionally from a revision or time
//! - `drop` - Delete documents by identity
//! - `replay` - Replay a recorded client conversation
//! - `inspect` - Display journal and store statistics
//! - `compact` - Rewrite the journal as a snapshot of live documents

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DocFeed change-feed server and tools.
#[derive(Parser)]
#[command(name = "docfeed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the WebSocket sync server
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:9215")]
        bind: SocketAddr,

        /// Shared secret clients must present
        #[arg(long, env = "DOCFEED_SECRET")]
        secret: Option<String>,

        /// Cookie carrying the shared secret
        #[arg(long, default_value = docfeed_server::DEFAULT_SECRET_NAME)]
        secret_name: String,

        /// Maximum headers per update message
        #[arg(long, default_value_t = 1000)]
        max_headers: usize,

        /// Outbound frames buffered per client
        #[arg(long, default_value_t = 4096)]
        queue: usize,

        /// Skip fsync after each committed batch
        #[arg(long)]
        no_sync: bool,
    },

    /// Ingest a batch of documents
    Ingest {
        /// JSON file holding an array or {"docs": [...]}; `-` for stdin
        file: PathBuf,
    },

    /// List headers
    Headers {
        /// Only revisions after this one
        #[arg(short, long)]
        from: Option<u64>,

        /// Only revisions from the first one at or after this Unix time
        #[arg(short, long, conflicts_with = "from")]
        since: Option<f64>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Delete documents by identity (clients are not notified)
    Drop {
        /// Identities to delete
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Replay a recorded client conversation
    Replay {
        /// JSON file holding {"messages": [...]}; `-` for stdin
        file: PathBuf,

        /// Maximum headers per update message
        #[arg(long, default_value_t = 1000)]
        max_headers: usize,
    },

    /// Display journal and store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Rewrite the journal as a snapshot of live documents
    Compact,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            secret,
            secret_name,
            max_headers,
            queue,
            no_sync,
        } => {
            let path = cli.path.ok_or("Data path required for serve")?;
            let options = commands::serve::ServeOptions {
                bind,
                secret,
                secret_name,
                max_headers,
                queue,
                sync_on_commit: !no_sync,
            };
            commands::serve::run(&path, options)?;
        }
        Commands::Ingest { file } => {
            let path = cli.path.ok_or("Data path required for ingest")?;
            commands::ingest::run(&path, &file)?;
        }
        Commands::Headers {
            from,
            since,
            format,
        } => {
            let path = cli.path.ok_or("Data path required for headers")?;
            commands::headers::run(&path, from, since, &format)?;
        }
        Commands::Drop { ids } => {
            let path = cli.path.ok_or("Data path required for drop")?;
            commands::drop::run(&path, &ids)?;
        }
        Commands::Replay { file, max_headers } => {
            let path = cli.path.ok_or("Data path required for replay")?;
            commands::replay::run(&path, &file, max_headers)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Data path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Compact => {
            let path = cli.path.ok_or("Data path required for compact")?;
            commands::compact::run(&path)?;
        }
        Commands::Version => {
            println!("DocFeed CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("DocFeed Core v{}", docfeed_core::VERSION);
        }
    }

    Ok(())
}
