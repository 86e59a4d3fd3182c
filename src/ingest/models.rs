//! Serde models for the two input file formats.

use serde::{Deserialize, Deserializer};

/// One song-metadata file: a single JSON object describing a song and its
/// artist.
#[derive(Clone, Debug, Deserialize)]
pub struct SongFileRecord {
    pub song_id: String,
    pub title: String,
    pub duration: f64,
    #[serde(default)]
    pub year: i64,
    pub artist_id: String,
    pub artist_name: String,
    #[serde(default)]
    pub artist_location: Option<String>,
    #[serde(default)]
    pub artist_latitude: Option<f64>,
    #[serde(default)]
    pub artist_longitude: Option<f64>,
}

/// One activity-log event, one JSON object per line in a log file.
///
/// `userId` arrives as an integer, a numeric string, or an empty string for
/// anonymous sessions; all three forms are folded into `Option<i64>`.
#[derive(Clone, Debug, Deserialize)]
pub struct ActivityEvent {
    /// Event timestamp in milliseconds since the Unix epoch.
    pub ts: i64,
    pub page: String,
    #[serde(rename = "userId", default, deserialize_with = "lenient_user_id")]
    pub user_id: Option<i64>,
    #[serde(rename = "firstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(rename = "sessionId")]
    pub session_id: i64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "userAgent", default)]
    pub user_agent: Option<String>,
}

impl ActivityEvent {
    /// Whether this event qualifies for time and fact derivation: a
    /// `NextSong` page action carrying artist, song and length.
    pub fn is_qualifying_play(&self) -> bool {
        self.page == "NextSong"
            && self.artist.is_some()
            && self.song.is_some()
            && self.length.is_some()
    }
}

fn lenient_user_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
        Null(Option<()>),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(id) => Ok(Some(id)),
        Raw::Str(s) if s.is_empty() => Ok(None),
        Raw::Str(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid userId: {s:?}"))),
        Raw::Null(_) => Ok(None),
    }
}
