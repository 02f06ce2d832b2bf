//! Demand Response Events CLI Application
//!
//! This is the command-line interface for the demand response event store.
//! It uses the dr-event-store library and adds:
//! - TOML configuration
//! - The HTTP transport (`serve`)
//! - Offline inspection of a SQLite store (`list`)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dr_event_store::{
    EventQuery, EventService, EventStore, EventValidator, EventView, MemoryStore, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod server;

use config::{AppConfig, StorageBackend};

/// Demand Response Events - record and serve demand response events
#[derive(Parser, Debug)]
#[command(name = "dr-event-cli")]
#[command(about = "Record and serve demand response events", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// SQLite database file (overrides config)
    #[arg(long, value_name = "FILE", conflicts_with = "memory")]
    db: Option<PathBuf>,

    /// Keep events in memory only
    #[arg(long)]
    memory: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Print stored events as JSON
    List {
        /// all, active, future or past
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        entity: Option<String>,
        #[arg(long)]
        metadata_key: Option<String>,
        #[arg(long)]
        metadata_value: Option<String>,
        /// start_time or end_time
        #[arg(long)]
        sort: Option<String>,
        /// Display timezone for start/end times
        #[arg(long)]
        tz: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Demand Response Events CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using event store library v{}", dr_event_store::VERSION);

    let config = resolve_config(&args)?;
    let service = Arc::new(EventService::new(
        open_store(&config)?,
        EventValidator::new(config.validation.clone()),
    ));

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(service, &config.server).await,
        Command::List {
            status,
            entity,
            metadata_key,
            metadata_value,
            sort,
            tz,
        } => {
            if config.storage.backend == StorageBackend::Memory {
                log::warn!("Listing an in-memory store always yields no events");
            }

            let query = EventQuery::from_params(
                status.as_deref(),
                entity.as_deref(),
                metadata_key.as_deref(),
                metadata_value.as_deref(),
                sort.as_deref(),
            )?;
            let views: Vec<EventView> = service
                .list(&query)?
                .iter()
                .map(|r| EventView::render(r, tz.as_deref()))
                .collect();

            println!("{}", serde_json::to_string_pretty(&views)?);
            Ok(())
        }
    }
}

/// Load the config file (if any) and apply command line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(db) = &args.db {
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = db.clone();
    }
    if args.memory {
        config.storage.backend = StorageBackend::Memory;
    }

    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn EventStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            log::info!("Using in-memory event store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let store = SqliteStore::open(
                &config.storage.path,
                Duration::from_millis(config.storage.busy_timeout_ms),
            )
            .with_context(|| format!("Failed to open event database: {:?}", config.storage.path))?;
            Ok(Arc::new(store))
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
