//! Activity log transformation: time dimension, user dimension and the
//! `songplays` fact table, one log batch (file) at a time.

use super::models::ActivityEvent;
use super::PipelineStats;
use crate::mart_store::{MartStore, SongPlay, TimeSlot, User};
use anyhow::{Context, Result};
use chrono::{Datelike, TimeZone, Timelike, Utc};
use std::path::Path;
use tracing::warn;

/// Derive the time dimension tuple from a millisecond epoch timestamp.
///
/// A pure function of `ts_ms`; returns `None` for timestamps chrono cannot
/// represent. `day`/`week`/`year` follow the ISO week calendar, `weekday`
/// is the zero-based Monday-first index.
pub fn derive_time_slot(ts_ms: i64) -> Option<TimeSlot> {
    let dt = Utc.timestamp_millis_opt(ts_ms).single()?;
    Some(TimeSlot {
        start_time: ts_ms,
        hour: dt.hour(),
        day: dt.weekday().number_from_monday(),
        week: dt.iso_week().week(),
        month: dt.month(),
        year: dt.iso_week().year(),
        weekday: dt.weekday().num_days_from_monday(),
    })
}

/// Parse a newline-delimited log file. Malformed lines are logged, counted
/// and skipped; the surviving events are sorted by timestamp so that user
/// upserts reflect true recency regardless of input order.
pub fn parse_log_file(path: &Path, stats: &mut PipelineStats) -> Result<Vec<ActivityEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;

    let mut events: Vec<ActivityEvent> = Vec::new();
    for (line_number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(
                    "Skipping malformed event at {}:{}: {e}",
                    path.display(),
                    line_number + 1
                );
                stats.parse_errors += 1;
            }
        }
    }
    events.sort_by_key(|event| event.ts);
    Ok(events)
}

/// Transform one log batch and load it.
///
/// Ordering inside the batch: time slots first, then users, then fact rows,
/// so every songplay insert finds its `time` and `users` parents already in
/// place. Each row commit is independent; a failed write is logged and the
/// batch proceeds.
pub fn process_log_file(store: &dyn MartStore, path: &Path, stats: &mut PipelineStats) {
    let events = match parse_log_file(path, stats) {
        Ok(events) => events,
        Err(e) => {
            warn!("Skipping log file: {e:#}");
            stats.parse_errors += 1;
            return;
        }
    };

    // Time dimension, from qualifying play events only
    for event in events.iter().filter(|e| e.is_qualifying_play()) {
        let slot = match derive_time_slot(event.ts) {
            Some(slot) => slot,
            None => {
                warn!("Event with out-of-range timestamp {} skipped", event.ts);
                continue;
            }
        };
        match store.insert_time_slot(&slot) {
            Ok(()) => stats.time_slots_written += 1,
            Err(e) => {
                warn!("Could not insert time slot {}: {e}", slot.start_time);
                stats.write_errors += 1;
            }
        }
    }

    // User dimension, from every identified event regardless of page.
    // Events are already in chronological order, so the last upsert for a
    // given user id carries the most recent level.
    for event in &events {
        let user_id = match event.user_id {
            Some(id) => id,
            None => continue,
        };
        let user = User {
            user_id,
            first_name: event.first_name.clone(),
            last_name: event.last_name.clone(),
            gender: event.gender.clone(),
            level: event.level.clone(),
        };
        match store.upsert_user(&user) {
            Ok(()) => stats.users_upserted += 1,
            Err(e) => {
                warn!("Could not upsert user {user_id}: {e}");
                stats.write_errors += 1;
            }
        }
    }

    // Fact rows, resolving catalog references where possible
    for event in events.iter().filter(|e| e.is_qualifying_play()) {
        let user_id = match event.user_id {
            Some(id) => id,
            None => {
                warn!("Play event at ts {} has no user id, skipped", event.ts);
                continue;
            }
        };

        // is_qualifying_play guarantees these three
        let artist = event.artist.as_deref().unwrap_or_default();
        let song = event.song.as_deref().unwrap_or_default();
        let length = event.length.unwrap_or_default();

        let song_ref = match store.resolve_song_ref(artist, song, length) {
            Ok(song_ref) => song_ref,
            Err(e) => {
                warn!("Catalog lookup failed for ({artist}, {song}): {e}");
                stats.write_errors += 1;
                continue;
            }
        };
        match &song_ref {
            Some(_) => stats.plays_resolved += 1,
            None => stats.plays_unresolved += 1,
        }

        let play = SongPlay {
            start_time: event.ts,
            user_id,
            level: event.level.clone(),
            song_id: song_ref.as_ref().map(|r| r.song_id.clone()),
            artist_id: song_ref.map(|r| r.artist_id),
            session_id: event.session_id,
            location: event.location.clone(),
            user_agent: event.user_agent.clone(),
        };
        match store.insert_song_play(&play) {
            Ok(_) => stats.song_plays_written += 1,
            Err(e) => {
                warn!("Could not insert song play at ts {}: {e}", event.ts);
                stats.write_errors += 1;
            }
        }
    }
}
