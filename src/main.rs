use clap::Parser;
use miette::{IntoDiagnostic, Result};
use staybook::application::engine::BookingEngine;
use staybook::config::GatewayConfig;
use staybook::domain::ports::{GatewayRef, StoreRef};
use staybook::infrastructure::chapa::ChapaClient;
use staybook::infrastructure::in_memory::InMemoryStore;
use staybook::interfaces::jsonl::{CommandReader, ResultWriter, execute};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input command script, one JSON command per line
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<StoreRef> {
    use staybook::infrastructure::rocksdb::RocksDbStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDbStore::open(path)?)),
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<StoreRef> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = GatewayConfig::from_env()?;
    let callback_url = config.callback_url.clone();
    let gateway: GatewayRef = Arc::new(ChapaClient::new(config)?);
    let store = open_store(cli.db_path)?;
    let engine = BookingEngine::new(store, gateway, callback_url);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(BufReader::new(file));
    let stdout = io::stdout();
    let mut writer = ResultWriter::new(stdout.lock());

    for command in reader.commands() {
        match command {
            Ok(command) => {
                let op = command.name();
                match execute(&engine, command).await {
                    Ok(result) => writer.write_result(op, &result).into_diagnostic()?,
                    Err(e) => eprintln!("Error processing command: {}", e),
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    Ok(())
}
