//! Schema reset tool
//!
//! Drops the play mart tables if they exist and recreates them from the
//! declared schema. Destructive: any loaded data is gone afterwards.

use anyhow::Result;
use clap::Parser;
use playmart::mart_store::SqliteMartStore;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "create-tables")]
#[command(about = "Drop and recreate the play mart star schema")]
struct Args {
    /// Path to the SQLite play mart database file (created if missing)
    #[arg(value_name = "MART_DB")]
    mart_db: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Recreating play mart schema at {}", args.mart_db.display());
    SqliteMartStore::create(&args.mart_db)?;
    info!("Schema created and validated.");

    Ok(())
}
