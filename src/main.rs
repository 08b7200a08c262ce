use anyhow::Result;
use bronze_loader::{
    config::{DbConfig, Destination, DEFAULT_DATASETS_DIR},
    load, store, LoadError,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "bronze-loader")]
#[command(about = "Load the CSV inside each .tar.xz archive of a directory into a table named after it")]
struct Args {
    /// Directory holding the .tar.xz archives
    #[arg(short, long, default_value = DEFAULT_DATASETS_DIR)]
    dir: PathBuf,

    /// Write into a DuckDB file instead of the MySQL database from DB_* settings
    #[arg(long, value_name = "PATH")]
    duckdb: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn report(err: &LoadError) {
    error!("{}", err);
    if let Some(hint) = err.hint() {
        error!("{}", hint);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let default_filter = if args.verbose {
        "info,bronze_loader=debug"
    } else {
        "info"
    };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();
    info!("Starting data loading process...");

    // ─── 2) resolve destination ──────────────────────────────────────
    let dest = match args.duckdb {
        Some(path) => Destination::DuckDb(Some(path)),
        None => match DbConfig::from_env() {
            Ok(cfg) => {
                info!("destination {}", cfg.redacted_url());
                Destination::MySql(cfg)
            }
            Err(e) => {
                report(&e);
                return Ok(());
            }
        },
    };

    // ─── 3) connect + connectivity check ─────────────────────────────
    let mut store = match store::open(&dest) {
        Ok(s) => s,
        Err(e) => {
            report(&e);
            return Ok(());
        }
    };
    if let Err(e) = store.ping() {
        report(&LoadError::Connection(e));
        return Ok(());
    }
    info!("Successfully connected to the database.");

    // ─── 4) load every archive ───────────────────────────────────────
    let summary = load::run(&args.dir, store.as_mut());
    info!(
        "Data loading complete: {} loaded, {} skipped, {} failed.",
        summary.loaded(),
        summary.skipped(),
        summary.failed()
    );

    // ─── 5) close the connection ─────────────────────────────────────
    let backend = store.backend();
    drop(store);
    info!("{} connection closed", backend);
    Ok(())
}
