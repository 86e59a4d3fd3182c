//! SQLite schema definitions for the play mart database.
//!
//! One fact table (`songplays`) surrounded by four dimension tables
//! (`artists`, `songs`, `users`, `time`). Declaration order matters:
//! referenced tables come before the tables that reference them, and
//! `VersionedSchema::drop_all` relies on the reverse order for teardown.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

const SONGS_ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "artist_id",
    on_delete: ForeignKeyOnChange::NoAction,
};

const SONGPLAYS_TIME_FK: ForeignKey = ForeignKey {
    foreign_table: "time",
    foreign_column: "start_time",
    on_delete: ForeignKeyOnChange::NoAction,
};

const SONGPLAYS_USER_FK: ForeignKey = ForeignKey {
    foreign_table: "users",
    foreign_column: "user_id",
    on_delete: ForeignKeyOnChange::NoAction,
};

/// Artist dimension, keyed on the catalog artist id.
const ARTISTS_TABLE_V1: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("location", &SqlType::Text),
        sqlite_column!("latitude", &SqlType::Real),
        sqlite_column!("longitude", &SqlType::Real),
    ],
};

/// Song dimension, referencing its artist.
const SONGS_TABLE_V1: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("song_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&SONGS_ARTIST_FK)
        ),
        sqlite_column!("year", &SqlType::Integer),
        sqlite_column!("duration", &SqlType::Real),
    ],
};

/// User dimension. Non-key fields track the most recent activity record.
const USERS_TABLE_V1: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("user_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("first_name", &SqlType::Text),
        sqlite_column!("last_name", &SqlType::Text),
        sqlite_column!("gender", &SqlType::Text),
        sqlite_column!("level", &SqlType::Text),
    ],
};

/// Time dimension, keyed on the raw millisecond epoch timestamp.
const TIME_TABLE_V1: Table = Table {
    name: "time",
    columns: &[
        sqlite_column!("start_time", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("hour", &SqlType::Integer),
        sqlite_column!("day", &SqlType::Integer),
        sqlite_column!("week", &SqlType::Integer),
        sqlite_column!("month", &SqlType::Integer),
        sqlite_column!("year", &SqlType::Integer),
        sqlite_column!("weekday", &SqlType::Integer),
    ],
};

/// Song play fact table. `songplay_id` is the rowid alias, so SQLite
/// generates the surrogate key. `song_id`/`artist_id` carry no foreign key
/// because unresolved lookups store NULL there.
const SONGPLAYS_TABLE_V1: Table = Table {
    name: "songplays",
    columns: &[
        sqlite_column!("songplay_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "start_time",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONGPLAYS_TIME_FK)
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONGPLAYS_USER_FK)
        ),
        sqlite_column!("level", &SqlType::Text),
        sqlite_column!("song_id", &SqlType::Text),
        sqlite_column!("artist_id", &SqlType::Text),
        sqlite_column!("session_id", &SqlType::Integer, non_null = true),
        sqlite_column!("location", &SqlType::Text),
        sqlite_column!("user_agent", &SqlType::Text),
    ],
};

/// All versioned schemas for the play mart database.
///
/// Version 1: the full star schema.
pub const MART_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        ARTISTS_TABLE_V1,
        SONGS_TABLE_V1,
        USERS_TABLE_V1,
        TIME_TABLE_V1,
        SONGPLAYS_TABLE_V1,
    ],
    migration: None, // Initial version has no migration
}];
