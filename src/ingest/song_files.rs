//! Song catalog loading: one song-metadata file at a time into the
//! `artists` and `songs` dimensions.

use super::models::SongFileRecord;
use super::PipelineStats;
use crate::mart_store::{Artist, MartStore, Song};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

/// Parse a song-metadata file. The corpus stores one JSON object per file;
/// the newline-delimited single-record form is accepted too.
pub fn parse_song_file(path: &Path) -> Result<SongFileRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    if let Ok(record) = serde_json::from_str(&content) {
        return Ok(record);
    }
    // Newline-delimited form: the first non-empty line is the record
    let first_record = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or(&content);
    serde_json::from_str(first_record)
        .with_context(|| format!("could not parse JSON content of {}", path.display()))
}

/// Load one song file: artist row first, then the song row referencing it.
///
/// A parse failure skips the file; a write failure on either row skips the
/// rest of the file. Both are logged and counted, neither aborts the run.
pub fn process_song_file(store: &dyn MartStore, path: &Path, stats: &mut PipelineStats) {
    let record = match parse_song_file(path) {
        Ok(record) => record,
        Err(e) => {
            warn!("Skipping song file: {e:#}");
            stats.parse_errors += 1;
            return;
        }
    };

    let artist = Artist {
        artist_id: record.artist_id.clone(),
        name: record.artist_name,
        location: record.artist_location.filter(|l| !l.is_empty()),
        latitude: record.artist_latitude,
        longitude: record.artist_longitude,
    };
    if let Err(e) = store.insert_artist(&artist) {
        warn!("Could not insert artist {}: {e}", artist.artist_id);
        stats.write_errors += 1;
        return;
    }
    stats.artists_loaded += 1;

    let song = Song {
        song_id: record.song_id,
        title: record.title,
        artist_id: record.artist_id,
        year: record.year,
        duration: record.duration,
    };
    if let Err(e) = store.insert_song(&song) {
        warn!("Could not insert song {}: {e}", song.song_id);
        stats.write_errors += 1;
        return;
    }
    stats.songs_loaded += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mart_store::SqliteMartStore;
    use tempfile::TempDir;

    fn song_json() -> &'static str {
        r#"{"num_songs": 1, "artist_id": "AR1", "artist_latitude": null,
            "artist_longitude": null, "artist_location": "Rome, IT",
            "artist_name": "X", "song_id": "S1", "title": "Y",
            "duration": 200.0, "year": 2000}"#
    }

    #[test]
    fn test_process_song_file_loads_artist_then_song() {
        let dir = TempDir::new().unwrap();
        let store = SqliteMartStore::create(dir.path().join("mart.db")).unwrap();
        let song_path = dir.path().join("song.json");
        std::fs::write(&song_path, song_json()).unwrap();

        let mut stats = PipelineStats::default();
        process_song_file(&store, &song_path, &mut stats);

        assert_eq!(stats.artists_loaded, 1);
        assert_eq!(stats.songs_loaded, 1);
        assert_eq!(stats.parse_errors, 0);
        assert_eq!(stats.write_errors, 0);

        use crate::mart_store::MartStore as _;
        let counts = store.counts().unwrap();
        assert_eq!(counts.artists, 1);
        assert_eq!(counts.songs, 1);
        assert!(store.resolve_song_ref("X", "Y", 200.0).unwrap().is_some());
    }

    #[test]
    fn test_malformed_song_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = SqliteMartStore::create(dir.path().join("mart.db")).unwrap();
        let song_path = dir.path().join("song.json");
        std::fs::write(&song_path, "{not json").unwrap();

        let mut stats = PipelineStats::default();
        process_song_file(&store, &song_path, &mut stats);

        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.songs_loaded, 0);
    }

    #[test]
    fn test_reload_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = SqliteMartStore::create(dir.path().join("mart.db")).unwrap();
        let song_path = dir.path().join("song.json");
        std::fs::write(&song_path, song_json()).unwrap();

        let mut stats = PipelineStats::default();
        process_song_file(&store, &song_path, &mut stats);
        process_song_file(&store, &song_path, &mut stats);

        use crate::mart_store::MartStore as _;
        let counts = store.counts().unwrap();
        assert_eq!(counts.artists, 1);
        assert_eq!(counts.songs, 1);
    }
}
