//! # KBO Loader
//!
//! Command-line entry point for bulk-loading the BCE/KBO CSV export into
//! Postgres. Points `LoaderOrchestrator` at a directory of `*.csv` files and
//! drives it to completion, one unlogged table per file.
//!
//! ## Usage
//!
//! ```bash
//! kbo-loader --dir ./bce_mai_2025
//! kbo-loader --dir ./bce_mai_2025 --workers 8 --chunk-size 100000
//! RUST_LOG=debug kbo-loader --dir ./bce_mai_2025 --allow-unsafe-tuning
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use deadpool_postgres::{ManagerConfig, RecyclingMethod, Runtime};
use kbo_core::config::KboConfig;
use kbo_load::LoaderOrchestrator;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the bulk loader.
#[derive(Parser, Debug)]
#[command(name = "kbo-loader")]
#[command(about = "Bulk CSV loader for the BCE/KBO registry dataset")]
struct Args {
    /// Directory containing the `*.csv` export files. Defaults to `CSV_DIR`.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Number of concurrent COPY workers. Defaults to available parallelism, capped at 8.
    #[arg(long)]
    workers: Option<usize>,

    /// Rows per chunk handed to a worker in one COPY batch.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Apply unsafe session tuning (`fsync = OFF`) for faster initial loads.
    /// Never use this against a database you care about keeping durable.
    #[arg(long, default_value_t = false)]
    allow_unsafe_tuning: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = KboConfig::from_env()?;
    let dir = args.dir.unwrap_or_else(|| PathBuf::from(&config.csv_dir));

    let mut pg_config = deadpool_postgres::Config::new();
    pg_config.host = Some(config.db_host.clone());
    pg_config.port = Some(config.db_port);
    pg_config.user = Some(config.postgres_user.clone());
    pg_config.password = Some(config.postgres_password.clone());
    pg_config.dbname = Some(config.postgres_db.clone());
    pg_config.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    let pg_pool = pg_config.create_pool(Some(Runtime::Tokio1), tokio_postgres::NoTls)?;

    let mut orchestrator = LoaderOrchestrator::new(pg_pool).with_unsafe_tuning(args.allow_unsafe_tuning);
    if let Some(workers) = args.workers {
        orchestrator = orchestrator.with_num_workers(workers);
    }
    if let Some(chunk_size) = args.chunk_size {
        orchestrator = orchestrator.with_chunk_size(chunk_size);
    }

    let cancel = CancellationToken::new();
    let load_cancel = cancel.child_token();

    tokio::select! {
        results = orchestrator.load_directory(&dir, load_cancel) => {
            let results = results?;
            let mut failures = 0;
            for result in &results {
                match &result.error {
                    None => tracing::info!(
                        file = %result.file.display(),
                        table = %result.table,
                        rows = result.row_count,
                        duration_ms = result.duration.as_millis() as u64,
                        "loaded"
                    ),
                    Some(e) => {
                        failures += 1;
                        tracing::error!(file = %result.file.display(), error = %e, "load failed");
                    }
                }
            }
            tracing::info!(files = results.len(), failures, "load complete");
            if failures > 0 {
                anyhow::bail!("{failures} of {} files failed to load", results.len());
            }
        }
        _ = signal::ctrl_c() => {
            println!("\nReceived Ctrl-C, cancelling in-flight load...");
            cancel.cancel();
        }
    }

    Ok(())
}
