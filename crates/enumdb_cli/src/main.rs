//! enumdb CLI
//!
//! Maintenance tools for enumerator stores.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and file layout
//! - `verify` - Check that every key resolves to its own id
//! - `dump` - Print stored keys by id
//! - `rebuild-index` - Recreate the durable index from the key log

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// enumdb command-line store tools.
#[derive(Parser)]
#[command(name = "enumdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store's key log
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
    /// Display store statistics and file layout
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that every stored key resolves to its own id
    Verify,

    /// Print stored keys by id
    Dump {
        /// Maximum number of keys to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// First id to print
        #[arg(short, long, default_value = "1")]
        start: u32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Recreate the durable index from the key log
    RebuildIndex,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Store path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Dump {
            limit,
            start,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            commands::dump::run(&path, limit, start, &format)?;
        }
        Commands::RebuildIndex => {
            let path = cli.path.ok_or("Store path required for rebuild-index")?;
            commands::rebuild_index::run(&path)?;
        }
        Commands::Version => {
            println!("enumdb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("enumdb core v{}", enumdb_core::VERSION);
        }
    }

    Ok(())
}
