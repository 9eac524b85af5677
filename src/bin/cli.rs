//! bstdb CLI
//!
//! Command-line tool for reading and writing a bstdb file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use bstdb::{Config, Database};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// bstdb CLI
#[derive(Parser, Debug)]
#[command(name = "bstdb")]
#[command(about = "Disk-backed binary search tree key-value store")]
#[command(version)]
struct Args {
    /// Database file (created if missing)
    database: PathBuf,

    /// Maximum key length in bytes (new files only)
    #[arg(long, default_value = "255")]
    max_key_len: usize,

    /// Maximum value length in bytes (new files only)
    #[arg(long, default_value = "4096")]
    max_value_len: usize,

    /// Give up waiting for the file lock after this many milliseconds
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Print the value stored under a key
    Get {
        /// The key to get
        key: String,
    },

    /// Check whether a key exists
    Find {
        /// The key to look for
        key: String,
    },

    /// Remove a key
    Remove {
        /// The key to remove
        key: String,
    },

    /// Print every entry in key order
    Scan,

    /// Check file integrity and print record statistics
    Verify,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut builder = Config::builder()
        .path(&args.database)
        .max_key_len(args.max_key_len)
        .max_value_len(args.max_value_len);
    if let Some(ms) = args.lock_timeout_ms {
        builder = builder.lock_timeout(Duration::from_millis(ms));
    }

    let db = match Database::open(builder.build()) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", args.database.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let name = args.database.display().to_string();
    let outcome = run(&db, &name, args.command).and_then(|found| db.close().map(|()| found));

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("An error occurred: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Execute one command; `Ok(false)` means the key was missing
fn run(db: &Database, name: &str, command: Commands) -> bstdb::Result<bool> {
    match command {
        Commands::Set { key, value } => {
            db.put(key.as_bytes(), value.as_bytes())?;
            println!("Successfully set {} to {} in {}.", key, value, name);
            Ok(true)
        }
        Commands::Get { key } => match db.get(key.as_bytes())? {
            Some(value) => {
                println!(
                    "The value for {} is {} in {}.",
                    key,
                    String::from_utf8_lossy(&value),
                    name
                );
                Ok(true)
            }
            None => {
                eprintln!("Error: The key '{}' does not exist in {}.", key, name);
                Ok(false)
            }
        },
        Commands::Find { key } => {
            if db.contains(key.as_bytes())? {
                println!("Found {} in {}.", key, name);
                Ok(true)
            } else {
                eprintln!("Error: The key '{}' does not exist in {}.", key, name);
                Ok(false)
            }
        }
        Commands::Remove { key } => {
            if db.delete(key.as_bytes())? {
                println!("Successfully removed {} from {}.", key, name);
                Ok(true)
            } else {
                eprintln!("Error: The key '{}' does not exist in {}.", key, name);
                Ok(false)
            }
        }
        Commands::Scan => {
            for entry in db.scan()? {
                let (key, value) = entry?;
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
            Ok(true)
        }
        Commands::Verify => {
            let stats = db.verify()?;
            println!("live:       {}", stats.live);
            println!("tombstones: {}", stats.tombstones);
            println!("free:       {}", stats.free);
            println!("orphaned:   {}", stats.orphaned);
            println!("records:    {}", stats.total_records);
            println!("max depth:  {}", stats.max_depth);
            Ok(true)
        }
    }
}
