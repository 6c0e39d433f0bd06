//! minikv admin binary
//!
//! Opens a data directory in-process and runs one command against it.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use minikv::entry::Entry;
use minikv::wal::{self, SimpleWal};
use minikv::{CheckpointMode, Config, Engine, KvError};
use tracing_subscriber::{fmt, EnvFilter};

/// minikv
#[derive(Parser, Debug)]
#[command(name = "minikv")]
#[command(about = "Embedded key-value store with a write-ahead log")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./minikv_data")]
    data_dir: PathBuf,

    /// Checkpoint mode
    #[arg(short, long, value_enum, default_value = "snapshot")]
    checkpoint: CheckpointArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CheckpointArg {
    Snapshot,
    Disabled,
}

impl From<CheckpointArg> for CheckpointMode {
    fn from(arg: CheckpointArg) -> Self {
        match arg {
            CheckpointArg::Snapshot => CheckpointMode::Snapshot,
            CheckpointArg::Disabled => CheckpointMode::Disabled,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// List pairs in key order
    Scan {
        /// First key (inclusive)
        #[arg(long)]
        start: Option<String>,

        /// Last key (exclusive)
        #[arg(long)]
        end: Option<String>,

        /// Maximum number of pairs to print
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Snapshot the store and compact the WAL
    Checkpoint,

    /// Validate the WAL file without modifying it
    InspectWal,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,minikv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            eprintln!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), KvError> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .checkpoint(args.checkpoint.into())
        .build();

    // Inspection reads the file directly; opening an engine would repair it.
    if let Commands::InspectWal = args.command {
        return inspect_wal(&config);
    }

    let engine = Engine::open(config)?;
    match args.command {
        Commands::Put { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Get { key } => match engine.get(key.as_bytes()) {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Delete { key } => {
            engine.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Scan { start, end, limit } => {
            let start = start.map(String::into_bytes);
            let end = end.map(String::into_bytes);
            let pairs = match (start, end) {
                (Some(start), Some(end)) => engine.scan(start..end),
                (Some(start), None) => engine.scan(start..),
                (None, Some(end)) => engine.scan(..end),
                (None, None) => engine.scan(..),
            };
            for (key, value) in pairs.take(limit.unwrap_or(usize::MAX)) {
                println!(
                    "{} = {}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
        }
        Commands::Checkpoint => match engine.checkpoint()? {
            Some(id) => println!("checkpoint covers log id {}", id),
            None => println!("nothing to checkpoint"),
        },
        // handled above
        Commands::InspectWal => {}
    }

    engine.stop()
}

fn inspect_wal(config: &Config) -> Result<(), KvError> {
    let path = config.wal_dir().join(SimpleWal::<Entry>::FILE_NAME);
    let report = wal::inspect(&path)?;

    println!("file:     {}", path.display());
    println!("size:     {} bytes", report.file_size);
    println!("records:  {}", report.records.len());
    if let (Some(first), Some(last)) = (report.records.first(), report.records.last()) {
        println!("log ids:  {}..={}", first.id, last.id);
    }
    match report.torn_tail_at {
        Some(offset) => println!("torn tail at offset {} (repaired on next open)", offset),
        None => println!("torn tail: none"),
    }
    Ok(())
}
