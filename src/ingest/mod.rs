//! The extract-transform-load pipeline.
//!
//! Two phases, in a fixed order: the song catalog populates `artists` and
//! `songs` first, then the activity logs derive `time`, `users` and the
//! `songplays` fact rows (whose lookup join needs the catalog in place).
//! Processing is single threaded, one file and one row at a time.

mod activity_logs;
mod models;
mod song_files;

pub use activity_logs::{derive_time_slot, parse_log_file, process_log_file};
pub use models::{ActivityEvent, SongFileRecord};
pub use song_files::{parse_song_file, process_song_file};

use crate::mart_store::MartStore;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Row and error accounting across the whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub song_files_processed: usize,
    pub log_files_processed: usize,
    pub artists_loaded: usize,
    pub songs_loaded: usize,
    pub time_slots_written: usize,
    pub users_upserted: usize,
    pub song_plays_written: usize,
    pub plays_resolved: usize,
    pub plays_unresolved: usize,
    pub parse_errors: usize,
    pub write_errors: usize,
}

/// Collect every `*.json` file under `root`, sorted by path so a run is
/// deterministic and log files (named by date) come up chronologically.
pub fn collect_json_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("could not walk {}", root.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "json")
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn process_directory<F>(root: &Path, stats: &mut PipelineStats, mut process: F) -> Result<usize>
where
    F: FnMut(&Path, &mut PipelineStats),
{
    let files = collect_json_files(root)?;
    info!("{} files found in {}", files.len(), root.display());

    for (index, file) in files.iter().enumerate() {
        process(file, stats);
        info!("{}/{} files processed.", index + 1, files.len());
    }
    Ok(files.len())
}

/// Run the full load against an already-created schema.
///
/// Fatal errors (unreadable directory trees) abort; per-record parse and
/// write failures are logged, counted and skipped.
pub fn run_pipeline(
    store: &dyn MartStore,
    song_data: &Path,
    log_data: &Path,
) -> Result<PipelineStats> {
    let mut stats = PipelineStats::default();

    info!("Loading song catalog from {}...", song_data.display());
    stats.song_files_processed = process_directory(song_data, &mut stats, |path, stats| {
        process_song_file(store, path, stats)
    })?;

    info!("Processing activity logs from {}...", log_data.display());
    stats.log_files_processed = process_directory(log_data, &mut stats, |path, stats| {
        process_log_file(store, path, stats)
    })?;

    if stats.parse_errors > 0 || stats.write_errors > 0 {
        warn!(
            "Completed with {} parse errors and {} write errors",
            stats.parse_errors, stats.write_errors
        );
    }
    Ok(stats)
}
