//! Staging from local JSON files.
//!
//! Used where the warehouse cannot bulk-copy from object storage (SQLite,
//! vanilla PostgreSQL). Files hold one or more concatenated JSON objects;
//! activity logs are newline-delimited, catalog files hold a single object.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};
use sea_query::{Iden, InsertStatement, Query, SimpleExpr};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use walkdir::WalkDir;

use crate::schema::{StagingEvents, StagingSongs, Table};
use crate::warehouse::{Result, WarehouseError};

/// Rows per INSERT statement.
pub const BATCH_SIZE: usize = 500;

/// A raw record that maps onto one staging row.
pub trait StagingRecord: DeserializeOwned {
    type Column: Iden + 'static;

    const TABLE: Table;

    fn columns() -> Vec<Self::Column>;

    /// Column values, in [`columns`](Self::columns) order.
    fn into_values(self) -> Vec<SimpleExpr>;
}

/// One activity log record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingEventRecord {
    pub artist: Option<String>,
    pub auth: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<String>,
    pub item_in_session: Option<i32>,
    pub last_name: Option<String>,
    pub length: Option<f64>,
    pub level: Option<String>,
    pub location: Option<String>,
    pub method: Option<String>,
    pub page: Option<String>,
    pub registration: Option<f64>,
    pub session_id: Option<i32>,
    pub song: Option<String>,
    pub status: Option<i32>,
    /// Epoch milliseconds.
    pub ts: Option<i64>,
    pub user_agent: Option<String>,
    /// Logged-out events carry `""`.
    #[serde(default, deserialize_with = "lenient_user_id")]
    pub user_id: Option<i32>,
}

impl StagingEventRecord {
    /// `ts` as a UTC timestamp.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.ts
            .and_then(DateTime::from_timestamp_millis)
            .map(|t| t.naive_utc())
    }
}

impl StagingRecord for StagingEventRecord {
    type Column = StagingEvents;

    const TABLE: Table = Table::StagingEvents;

    fn columns() -> Vec<StagingEvents> {
        vec![
            StagingEvents::Artist,
            StagingEvents::Auth,
            StagingEvents::FirstName,
            StagingEvents::Gender,
            StagingEvents::ItemInSession,
            StagingEvents::LastName,
            StagingEvents::Length,
            StagingEvents::Level,
            StagingEvents::Location,
            StagingEvents::Method,
            StagingEvents::Page,
            StagingEvents::Registration,
            StagingEvents::SessionId,
            StagingEvents::Song,
            StagingEvents::Status,
            StagingEvents::Ts,
            StagingEvents::UserAgent,
            StagingEvents::UserId,
        ]
    }

    fn into_values(self) -> Vec<SimpleExpr> {
        let start_time = self.start_time();
        vec![
            self.artist.into(),
            self.auth.into(),
            self.first_name.into(),
            self.gender.into(),
            self.item_in_session.into(),
            self.last_name.into(),
            self.length.into(),
            self.level.into(),
            self.location.into(),
            self.method.into(),
            self.page.into(),
            self.registration.into(),
            self.session_id.into(),
            self.song.into(),
            self.status.into(),
            start_time.into(),
            self.user_agent.into(),
            self.user_id.into(),
        ]
    }
}

/// One song catalog record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StagingSongRecord {
    pub num_songs: Option<i32>,
    pub artist_id: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub artist_location: Option<String>,
    pub artist_name: Option<String>,
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub year: Option<i32>,
}

impl StagingRecord for StagingSongRecord {
    type Column = StagingSongs;

    const TABLE: Table = Table::StagingSongs;

    fn columns() -> Vec<StagingSongs> {
        vec![
            StagingSongs::NumSongs,
            StagingSongs::ArtistId,
            StagingSongs::ArtistLatitude,
            StagingSongs::ArtistLongitude,
            StagingSongs::ArtistLocation,
            StagingSongs::ArtistName,
            StagingSongs::SongId,
            StagingSongs::Title,
            StagingSongs::Duration,
            StagingSongs::Year,
        ]
    }

    fn into_values(self) -> Vec<SimpleExpr> {
        vec![
            self.num_songs.into(),
            self.artist_id.into(),
            self.artist_latitude.into(),
            self.artist_longitude.into(),
            self.artist_location.into(),
            self.artist_name.into(),
            self.song_id.into(),
            self.title.into(),
            self.duration.into(),
            self.year.into(),
        ]
    }
}

/// Accepts a number, a numeric string, `""` or null.
fn lenient_user_id<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => i32::try_from(n).map(Some).map_err(de::Error::custom),
        Some(Raw::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(de::Error::custom)
            }
        }
    }
}

/// `*.json` files under `path` (or `path` itself), in file name order.
pub fn json_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| WarehouseError::Io {
            path: path.to_path_buf(),
            source: io::Error::from(e),
        })?;
        let is_json = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Decode every record under `path`.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for file in json_files(path)? {
        let contents = fs::read_to_string(&file).map_err(|source| WarehouseError::Io {
            path: file.clone(),
            source,
        })?;
        for record in serde_json::Deserializer::from_str(&contents).into_iter::<T>() {
            let record = record.map_err(|source| WarehouseError::Json {
                path: file.clone(),
                source,
            })?;
            records.push(record);
        }
    }
    Ok(records)
}

/// Multi-row INSERTs of at most [`BATCH_SIZE`] rows each.
pub fn insert_statements<T: StagingRecord>(records: Vec<T>) -> Result<Vec<InsertStatement>> {
    let mut statements = Vec::new();
    let mut records = records.into_iter().peekable();
    while records.peek().is_some() {
        let mut insert = Query::insert();
        insert.into_table(T::TABLE).columns(T::columns());
        for record in records.by_ref().take(BATCH_SIZE) {
            insert.values(record.into_values())?;
        }
        statements.push(insert);
    }
    Ok(statements)
}
