//! SQLite-backed implementation of the mart store.
//!
//! All writes go through one conflict-policy primitive: given a table, its
//! column list and a policy, insert a single row. The typed per-table
//! methods supply named-field structs so column order is fixed in exactly
//! one place.

use super::models::*;
use super::schema::MART_VERSIONED_SCHEMAS;
use super::{MartStore, SongRef, StoreError, StoreResult};
use rusqlite::{params, Connection, ToSql};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// How a row insert behaves when the primary key already exists.
pub enum ConflictPolicy {
    /// Keep the existing row untouched (first writer wins).
    Ignore { key: &'static str },
    /// Overwrite the listed non-key columns with the incoming values.
    Upsert {
        key: &'static str,
        update_columns: &'static [&'static str],
    },
    /// Always insert; the store generates the surrogate key.
    Plain,
}

pub struct SqliteMartStore {
    conn: Mutex<Connection>,
}

fn open_connection(db_path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
            | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
            | rusqlite::OpenFlags::SQLITE_OPEN_URI
            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(StoreError::Connection)?;
    conn.execute("PRAGMA foreign_keys = ON;", params![])
        .map_err(StoreError::Connection)?;
    Ok(conn)
}

fn latest_schema() -> &'static crate::sqlite_persistence::VersionedSchema {
    MART_VERSIONED_SCHEMAS
        .last()
        .expect("at least one schema version is declared")
}

impl SqliteMartStore {
    /// Open the database and (re)create the star schema from scratch,
    /// dropping any existing tables first. Destructive; used by the
    /// `create-tables` binary.
    pub fn create<P: AsRef<Path>>(db_path: P) -> StoreResult<Self> {
        let conn = open_connection(db_path.as_ref())?;
        let schema = latest_schema();
        schema
            .drop_all(&conn)
            .map_err(|e| StoreError::Schema(format!("dropping existing tables: {e:#}")))?;
        schema
            .create(&conn)
            .map_err(|e| StoreError::Schema(format!("creating tables: {e:#}")))?;
        schema
            .validate(&conn)
            .map_err(|e| StoreError::Schema(format!("{e:#}")))?;
        info!("Created play mart schema version {}", schema.version);
        Ok(SqliteMartStore {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing database and validate its schema. Fails with a
    /// schema error when the tables are missing or do not match the
    /// declared shape.
    pub fn open<P: AsRef<Path>>(db_path: P) -> StoreResult<Self> {
        let db_path = db_path.as_ref();
        if !db_path.exists() {
            return Err(StoreError::Schema(format!(
                "database {} does not exist, run create-tables first",
                db_path.display()
            )));
        }
        let conn = open_connection(db_path)?;
        latest_schema()
            .validate(&conn)
            .map_err(|e| StoreError::Schema(format!("{e:#}")))?;

        let store = SqliteMartStore {
            conn: Mutex::new(conn),
        };
        let counts = store.counts()?;
        info!(
            "Opened play mart: {} artists, {} songs, {} users, {} time slots, {} song plays",
            counts.artists, counts.songs, counts.users, counts.time_slots, counts.song_plays
        );
        Ok(store)
    }

    /// The conflict-policy insert primitive behind every typed method.
    fn insert_row(
        &self,
        table: &'static str,
        columns: &[&str],
        values: &[&dyn ToSql],
        policy: &ConflictPolicy,
    ) -> StoreResult<()> {
        debug_assert_eq!(columns.len(), values.len());

        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );
        match policy {
            ConflictPolicy::Ignore { key } => {
                sql.push_str(&format!(" ON CONFLICT({key}) DO NOTHING"));
            }
            ConflictPolicy::Upsert {
                key,
                update_columns,
            } => {
                let assignments = update_columns
                    .iter()
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!(" ON CONFLICT({key}) DO UPDATE SET {assignments}"));
            }
            ConflictPolicy::Plain => {}
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|source| StoreError::Write { table, source })?;
        stmt.execute(values)
            .map_err(|source| StoreError::Write { table, source })?;
        Ok(())
    }
}

impl MartStore for SqliteMartStore {
    fn insert_artist(&self, artist: &Artist) -> StoreResult<()> {
        self.insert_row(
            "artists",
            &["artist_id", "name", "location", "latitude", "longitude"],
            &[
                &artist.artist_id,
                &artist.name,
                &artist.location,
                &artist.latitude,
                &artist.longitude,
            ],
            &ConflictPolicy::Ignore { key: "artist_id" },
        )
    }

    fn insert_song(&self, song: &Song) -> StoreResult<()> {
        self.insert_row(
            "songs",
            &["song_id", "title", "artist_id", "year", "duration"],
            &[
                &song.song_id,
                &song.title,
                &song.artist_id,
                &song.year,
                &song.duration,
            ],
            &ConflictPolicy::Ignore { key: "song_id" },
        )
    }

    fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.insert_row(
            "users",
            &["user_id", "first_name", "last_name", "gender", "level"],
            &[
                &user.user_id,
                &user.first_name,
                &user.last_name,
                &user.gender,
                &user.level,
            ],
            &ConflictPolicy::Upsert {
                key: "user_id",
                update_columns: &["first_name", "last_name", "gender", "level"],
            },
        )
    }

    fn insert_time_slot(&self, slot: &TimeSlot) -> StoreResult<()> {
        self.insert_row(
            "time",
            &[
                "start_time",
                "hour",
                "day",
                "week",
                "month",
                "year",
                "weekday",
            ],
            &[
                &slot.start_time,
                &slot.hour,
                &slot.day,
                &slot.week,
                &slot.month,
                &slot.year,
                &slot.weekday,
            ],
            &ConflictPolicy::Ignore { key: "start_time" },
        )
    }

    fn insert_song_play(&self, play: &SongPlay) -> StoreResult<i64> {
        self.insert_row(
            "songplays",
            &[
                "start_time",
                "user_id",
                "level",
                "song_id",
                "artist_id",
                "session_id",
                "location",
                "user_agent",
            ],
            &[
                &play.start_time,
                &play.user_id,
                &play.level,
                &play.song_id,
                &play.artist_id,
                &play.session_id,
                &play.location,
                &play.user_agent,
            ],
            &ConflictPolicy::Plain,
        )?;
        let conn = self.conn.lock().unwrap();
        Ok(conn.last_insert_rowid())
    }

    fn resolve_song_ref(
        &self,
        artist_name: &str,
        title: &str,
        duration: f64,
    ) -> StoreResult<Option<SongRef>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT s.song_id, s.artist_id
             FROM songs s
             JOIN artists a ON s.artist_id = a.artist_id
             WHERE a.name = ?1 AND s.title = ?2 AND s.duration = ?3",
        )?;
        match stmt.query_row(params![artist_name, title, duration], |row| {
            Ok(SongRef {
                song_id: row.get(0)?,
                artist_id: row.get(1)?,
            })
        }) {
            Ok(song_ref) => Ok(Some(song_ref)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn counts(&self) -> StoreResult<MartCounts> {
        let conn = self.conn.lock().unwrap();
        let count = |table: &str| -> StoreResult<i64> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
        };
        Ok(MartCounts {
            artists: count("artists")?,
            songs: count("songs")?,
            users: count("users")?,
            time_slots: count("time")?,
            song_plays: count("songplays")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteMartStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteMartStore::create(dir.path().join("mart.db")).unwrap();
        (dir, store)
    }

    fn sample_artist() -> Artist {
        Artist {
            artist_id: "AR1".to_string(),
            name: "X".to_string(),
            location: Some("Rome, IT".to_string()),
            latitude: Some(41.9),
            longitude: Some(12.5),
        }
    }

    fn sample_song() -> Song {
        Song {
            song_id: "S1".to_string(),
            title: "Y".to_string(),
            artist_id: "AR1".to_string(),
            year: 2000,
            duration: 200.0,
        }
    }

    fn sample_time_slot() -> TimeSlot {
        TimeSlot {
            start_time: 1_542_241_826_796,
            hour: 0,
            day: 4,
            week: 46,
            month: 11,
            year: 2018,
            weekday: 3,
        }
    }

    #[test]
    fn test_open_fails_without_schema() {
        let dir = TempDir::new().unwrap();
        let result = SqliteMartStore::open(dir.path().join("missing.db"));
        assert!(matches!(result, Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_open_after_create_validates() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("mart.db");
        drop(SqliteMartStore::create(&db_path).unwrap());
        SqliteMartStore::open(&db_path).unwrap();
    }

    #[test]
    fn test_create_wipes_existing_rows() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("mart.db");
        let store = SqliteMartStore::create(&db_path).unwrap();
        store.insert_artist(&sample_artist()).unwrap();
        drop(store);

        let store = SqliteMartStore::create(&db_path).unwrap();
        assert_eq!(store.counts().unwrap().artists, 0);
    }

    #[test]
    fn test_ignore_policy_is_idempotent() {
        let (_dir, store) = test_store();

        store.insert_artist(&sample_artist()).unwrap();
        store.insert_song(&sample_song()).unwrap();
        store.insert_time_slot(&sample_time_slot()).unwrap();

        // Re-insert everything, including a variant artist row with the
        // same key; the original rows must survive untouched.
        let mut renamed = sample_artist();
        renamed.name = "Somebody Else".to_string();
        store.insert_artist(&renamed).unwrap();
        store.insert_song(&sample_song()).unwrap();
        store.insert_time_slot(&sample_time_slot()).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.artists, 1);
        assert_eq!(counts.songs, 1);
        assert_eq!(counts.time_slots, 1);

        let resolved = store.resolve_song_ref("X", "Y", 200.0).unwrap();
        assert!(resolved.is_some(), "first-written artist name must win");
    }

    #[test]
    fn test_upsert_user_overwrites_non_key_fields() {
        let (_dir, store) = test_store();

        store
            .upsert_user(&User {
                user_id: 7,
                first_name: Some("Ada".to_string()),
                last_name: Some("L".to_string()),
                gender: Some("F".to_string()),
                level: Some("free".to_string()),
            })
            .unwrap();
        store
            .upsert_user(&User {
                user_id: 7,
                first_name: Some("Ada".to_string()),
                last_name: Some("L".to_string()),
                gender: Some("F".to_string()),
                level: Some("paid".to_string()),
            })
            .unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.users, 1);

        let conn = store.conn.lock().unwrap();
        let level: String = conn
            .query_row("SELECT level FROM users WHERE user_id = 7", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(level, "paid");
    }

    #[test]
    fn test_plain_policy_appends_duplicates() {
        let (_dir, store) = test_store();
        store.insert_time_slot(&sample_time_slot()).unwrap();
        store
            .upsert_user(&User {
                user_id: 7,
                first_name: None,
                last_name: None,
                gender: None,
                level: None,
            })
            .unwrap();

        let play = SongPlay {
            start_time: sample_time_slot().start_time,
            user_id: 7,
            level: Some("free".to_string()),
            song_id: None,
            artist_id: None,
            session_id: 42,
            location: None,
            user_agent: None,
        };
        let first = store.insert_song_play(&play).unwrap();
        let second = store.insert_song_play(&play).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.counts().unwrap().song_plays, 2);
    }

    #[test]
    fn test_song_play_with_dangling_references_is_write_error() {
        let (_dir, store) = test_store();

        let play = SongPlay {
            start_time: 123,
            user_id: 7,
            level: None,
            song_id: None,
            artist_id: None,
            session_id: 42,
            location: None,
            user_agent: None,
        };
        let result = store.insert_song_play(&play);
        assert!(matches!(
            result,
            Err(StoreError::Write {
                table: "songplays",
                ..
            })
        ));
    }

    #[test]
    fn test_song_without_artist_is_write_error() {
        let (_dir, store) = test_store();
        let result = store.insert_song(&sample_song());
        assert!(matches!(
            result,
            Err(StoreError::Write { table: "songs", .. })
        ));
    }

    #[test]
    fn test_resolve_song_ref_exact_match_only() {
        let (_dir, store) = test_store();
        store.insert_artist(&sample_artist()).unwrap();
        store.insert_song(&sample_song()).unwrap();

        let hit = store.resolve_song_ref("X", "Y", 200.0).unwrap();
        assert_eq!(
            hit,
            Some(SongRef {
                song_id: "S1".to_string(),
                artist_id: "AR1".to_string(),
            })
        );

        // Any field off by a hair misses, duration included
        assert_eq!(store.resolve_song_ref("X", "Y", 200.001).unwrap(), None);
        assert_eq!(store.resolve_song_ref("X", "y", 200.0).unwrap(), None);
        assert_eq!(store.resolve_song_ref("Z", "Y", 200.0).unwrap(), None);
    }
}
