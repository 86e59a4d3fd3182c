//! Row models for the play mart star schema.
//!
//! Each struct is a named-field image of one table row, so extraction and
//! insertion never rely on positional column order.

use serde::{Deserialize, Serialize};

/// One row of the `artists` dimension. Immutable once inserted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One row of the `songs` dimension. Immutable once inserted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i64,
    pub duration: f64,
}

/// One row of the `users` dimension.
///
/// Unlike the other dimensions, user rows are mutable: the non-key fields
/// reflect the most recently processed event for this `user_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

/// One row of the `time` dimension, derived from a millisecond epoch
/// timestamp. First writer wins, never updated.
///
/// `day` is the ISO weekday (1 = Monday .. 7 = Sunday), `week` and `year`
/// come from the ISO week calendar, and `weekday` is the zero-based
/// Monday-first index (0 = Monday .. 6 = Sunday).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Milliseconds since the Unix epoch.
    pub start_time: i64,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

/// One row of the `songplays` fact table, append-only.
///
/// `song_id`/`artist_id` are `None` when the catalog lookup did not resolve
/// the event; the fact row is recorded either way.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongPlay {
    pub start_time: i64,
    pub user_id: i64,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// Row counts per table, for post-load reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MartCounts {
    pub artists: i64,
    pub songs: i64,
    pub users: i64,
    pub time_slots: i64,
    pub song_plays: i64,
}
