mod models;
mod schema;
mod store;

pub use models::*;
pub use schema::MART_VERSIONED_SCHEMAS;
pub use store::{ConflictPolicy, SqliteMartStore};

use thiserror::Error;

/// Errors surfaced by the mart store.
///
/// `Connection` and `Schema` are fatal for a run; `Write` and `Query` hit a
/// single row and the caller decides between aborting and skipping (the
/// pipeline skips and logs).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not open play mart database: {0}")]
    Connection(#[source] rusqlite::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("write to {table} failed: {source}")]
    Write {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A resolved `(song_id, artist_id)` pair from the catalog lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongRef {
    pub song_id: String,
    pub artist_id: String,
}

pub trait MartStore: Send + Sync {
    /// Insert an artist row; an existing row with the same id is left as is.
    fn insert_artist(&self, artist: &Artist) -> StoreResult<()>;

    /// Insert a song row; an existing row with the same id is left as is.
    /// The referenced artist must already exist.
    fn insert_song(&self, song: &Song) -> StoreResult<()>;

    /// Insert or update a user row. On conflict all four non-key fields are
    /// overwritten, so callers must feed events in chronological order for
    /// the stored row to reflect true recency.
    fn upsert_user(&self, user: &User) -> StoreResult<()>;

    /// Insert a time slot; first writer wins, re-insertion is a no-op.
    fn insert_time_slot(&self, slot: &TimeSlot) -> StoreResult<()>;

    /// Append a song play fact row. Returns the generated `songplay_id`.
    fn insert_song_play(&self, play: &SongPlay) -> StoreResult<i64>;

    /// Look up the song/artist pair matching the event's artist name, song
    /// title and duration, all by exact equality. `None` is the expected
    /// outcome for events outside the loaded catalog, not an error.
    fn resolve_song_ref(
        &self,
        artist_name: &str,
        title: &str,
        duration: f64,
    ) -> StoreResult<Option<SongRef>>;

    /// Row counts per table.
    fn counts(&self) -> StoreResult<MartCounts>;
}
