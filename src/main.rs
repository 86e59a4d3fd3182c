//! Playmart ETL runner
//!
//! Loads the song catalog and the activity logs into an already-created
//! star schema. Run `create-tables` first to (re)create the schema.

use anyhow::Result;
use clap::Parser;
use playmart::ingest::run_pipeline;
use playmart::mart_store::SqliteMartStore;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "playmart-etl")]
#[command(about = "Load song metadata and activity logs into the play mart")]
struct Args {
    /// Path to the SQLite play mart database file
    #[arg(value_name = "MART_DB")]
    mart_db: PathBuf,

    /// Directory tree of song-metadata JSON files
    #[arg(long, default_value = "data/song_data")]
    song_data: PathBuf,

    /// Directory tree of activity-log JSON files
    #[arg(long, default_value = "data/log_data")]
    log_data: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Playmart ETL");
    info!("============");
    info!("Database: {}", args.mart_db.display());
    info!("Song data: {}", args.song_data.display());
    info!("Log data: {}", args.log_data.display());

    let store = SqliteMartStore::open(&args.mart_db)?;

    let stats = run_pipeline(&store, &args.song_data, &args.log_data)?;

    info!("");
    info!("Load Summary");
    info!("============");
    info!("Song files processed: {}", stats.song_files_processed);
    info!("Log files processed: {}", stats.log_files_processed);
    info!("Artists loaded: {}", stats.artists_loaded);
    info!("Songs loaded: {}", stats.songs_loaded);
    info!("Time slots written: {}", stats.time_slots_written);
    info!("Users upserted: {}", stats.users_upserted);
    info!(
        "Song plays written: {} ({} resolved, {} unresolved)",
        stats.song_plays_written, stats.plays_resolved, stats.plays_unresolved
    );
    if stats.parse_errors > 0 || stats.write_errors > 0 {
        warn!(
            "Errors encountered: {} parse, {} write",
            stats.parse_errors, stats.write_errors
        );
    }

    use playmart::mart_store::MartStore as _;
    let counts = store.counts()?;
    info!("");
    info!("Database contains:");
    info!("  {} artists", counts.artists);
    info!("  {} songs", counts.songs);
    info!("  {} users", counts.users);
    info!("  {} time slots", counts.time_slots);
    info!("  {} song plays", counts.song_plays);

    Ok(())
}
