//! Local JSON datasets for staging loads.

use std::fs;
use std::path::PathBuf;

use serde_json::{json, Value};
use tempfile::TempDir;

use songplay_warehouse::pipeline::{CopySource, StagingTable};

/// 2001-09-09 01:46:40 UTC, a Sunday.
pub const CANONICAL_TS: i64 = 1_000_000_000_000;

/// Temporary directory holding generated log and song files.
pub struct Dataset {
    dir: TempDir,
    written: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
            written: 0,
        }
    }

    fn next_dir(&mut self, prefix: &str) -> PathBuf {
        self.written += 1;
        let dir = self.dir.path().join(format!("{}_{}", prefix, self.written));
        fs::create_dir_all(&dir).expect("Failed to create dataset dir");
        dir
    }

    /// Write `records` as one newline-delimited log file.
    pub fn events(&mut self, records: &[Value]) -> CopySource {
        let dir = self.next_dir("log_data");
        let lines: Vec<String> = records.iter().map(Value::to_string).collect();
        fs::write(dir.join("events.json"), lines.join("\n")).expect("Failed to write events");
        CopySource::local(StagingTable::Events, dir)
    }

    /// Write each record to its own file in a nested layout.
    pub fn songs(&mut self, records: &[Value]) -> CopySource {
        let dir = self.next_dir("song_data");
        for (i, record) in records.iter().enumerate() {
            let nested = dir.join("A").join(format!("{}", i % 3));
            fs::create_dir_all(&nested).expect("Failed to create song dir");
            fs::write(nested.join(format!("song_{}.json", i)), record.to_string())
                .expect("Failed to write song");
        }
        CopySource::local(StagingTable::Songs, dir)
    }
}

/// An activity log record.
pub fn event(page: &str, user_id: Value, song: &str, artist: &str, ts: i64) -> Value {
    json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Ada",
        "gender": "F",
        "itemInSession": 0,
        "lastName": "Lovelace",
        "length": 215.5,
        "level": "paid",
        "location": "London, UK",
        "method": "PUT",
        "page": page,
        "registration": 1540919166796.0,
        "sessionId": 42,
        "song": song,
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user_id,
    })
}

/// A `NextSong` event for a numeric user.
pub fn next_song(user_id: i32, song: &str, artist: &str, ts: i64) -> Value {
    event("NextSong", json!(user_id), song, artist, ts)
}

/// A song catalog record.
pub fn song(song_id: &str, title: &str, artist_id: &str, artist_name: &str) -> Value {
    json!({
        "num_songs": 1,
        "artist_id": artist_id,
        "artist_latitude": 51.5,
        "artist_longitude": -0.12,
        "artist_location": "London",
        "artist_name": artist_name,
        "song_id": song_id,
        "title": title,
        "duration": 215.5,
        "year": 2001,
    })
}
