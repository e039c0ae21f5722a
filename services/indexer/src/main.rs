//! Raster catalog indexer service.
//!
//! Sweeps the configured raster sources and registers everything it
//! finds into the spatial catalog, once by default or on a fixed
//! interval.

mod readiness;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use catalog::PgCatalog;
use indexing::{build_loaders, builtin_sources, data_root, ConfigError, Orchestrator};
use readiness::{wait_until_ready, DatabaseProbe, TokioSleeper};

#[derive(Parser, Debug)]
#[command(name = "indexer")]
#[command(about = "Raster source indexer for the spatial catalog")]
struct Args {
    /// Catalog database host
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    host: String,

    /// Catalog database port
    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    port: u16,

    /// Catalog database user
    #[arg(long, env = "DB_USER", default_value = "opendatacube")]
    user: String,

    /// Catalog database password
    #[arg(long, env = "DB_PASSWORD", default_value = "opendatacube")]
    password: String,

    /// Catalog database name
    #[arg(long, env = "DB_NAME", default_value = "opendatacube")]
    db: String,

    /// Skip the ICMP probe and go straight to the TCP check
    #[arg(long)]
    no_ping: bool,

    /// Readiness attempts before giving up
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u32).range(1..=15))]
    max_retries: u32,

    /// Seconds between readiness attempts
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..=20))]
    sleep: u64,

    /// Sweep repeatedly at this interval in seconds (default: run once and exit)
    #[arg(long)]
    interval: Option<u64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // An .env next to the binary feeds the env-var fallbacks below.
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting raster catalog indexer");

    let database_url = format!(
        "postgresql://{}:{}@{}:{}/{}",
        args.user, args.password, args.host, args.port, args.db
    );

    let probe = DatabaseProbe::new(&args.host, args.port, &database_url, !args.no_ping);
    let attempts = wait_until_ready(
        &probe,
        args.max_retries,
        Duration::from_secs(args.sleep),
        &TokioSleeper,
    )
    .await
    .context("Catalog never became reachable")?;
    info!(attempts, host = %args.host, "Catalog is reachable");

    let store = PgCatalog::connect(&database_url).await?;
    store.migrate().await?;

    let root = data_root();
    if !root.is_dir() {
        return Err(ConfigError::MissingDataRoot(root).into());
    }

    let loaders = build_loaders(builtin_sources(&root))?;
    if loaders.is_empty() {
        warn!("No sources enabled, nothing to index");
    }
    let orchestrator = Orchestrator::new(loaders, Arc::new(store));

    match args.interval {
        None => {
            orchestrator.run().await.log();
        }
        Some(secs) => loop {
            orchestrator.run().await.log();
            info!(interval_secs = secs, "Sleeping until next sweep");
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        },
    }

    Ok(())
}
