//! Track model and the validation step that turns raw catalog JSON into it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// The loaded catalog: server order, immutable, cheap to clone.
pub type Catalog = Arc<[Track]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub artist: String,
    /// Asset key as delivered by the server.
    pub cover: String,
    /// `asset_base` + `cover`.
    pub cover_url: String,
    /// Audio source handed to the engine.
    pub url: String,
    pub duration_secs: f64,
    /// `M:SS`, computed once from `duration_secs`.
    pub duration: String,
}

impl Track {
    pub fn new(record: TrackRecord, asset_base: &str, duration_secs: f64) -> Self {
        let cover = record.cover.unwrap_or_default();
        Self {
            id: TrackId(record.id),
            name: record.name.unwrap_or_default(),
            artist: record.artist.unwrap_or_default(),
            cover_url: format!("{}{}", asset_base, cover),
            cover,
            url: record.url,
            duration_secs,
            duration: format_duration(duration_secs),
        }
    }
}

/// One record of the catalog response, before it becomes a `Track`.
///
/// Optional text fields tolerate `null`; `id` and `url` are required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackRecord {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    pub url: String,
}

/// The endpoint answers either with a bare array or with `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogBody {
    Wrapped { data: Vec<Value> },
    Bare(Vec<Value>),
}

/// Decode a catalog response body into validated records, in server order.
///
/// The body as a whole must be well-formed; individual records that fail
/// validation are logged and skipped. A repeated id keeps its first record.
pub fn decode_records(body: &[u8]) -> Result<Vec<TrackRecord>, serde_json::Error> {
    let values = match serde_json::from_slice::<CatalogBody>(body)? {
        CatalogBody::Wrapped { data } => data,
        CatalogBody::Bare(data) => data,
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(values.len());
    for (pos, value) in values.into_iter().enumerate() {
        let record: TrackRecord = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!("catalog: rejecting record #{}: {}", pos, e);
                continue;
            }
        };
        if record.url.trim().is_empty() {
            warn!("catalog: rejecting record id={}: empty url", record.id);
            continue;
        }
        if !seen.insert(record.id) {
            warn!("catalog: rejecting record id={}: duplicate id", record.id);
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

/// `floor(secs / 60)` minutes and `floor(secs % 60)` zero-padded seconds.
pub fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "0:00".to_string();
    }
    let minutes = (secs / 60.0).floor() as u64;
    let seconds = (secs % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(9.99), "0:09");
        assert_eq!(format_duration(61.0), "1:01");
        assert_eq!(format_duration(185.4), "3:05");
        assert_eq!(format_duration(600.0), "10:00");
        assert_eq!(format_duration(3725.0), "62:05");
    }

    #[test]
    fn test_format_duration_rejects_garbage() {
        assert_eq!(format_duration(f64::NAN), "0:00");
        assert_eq!(format_duration(f64::INFINITY), "0:00");
        assert_eq!(format_duration(-3.0), "0:00");
    }

    #[test]
    fn test_decode_wrapped_body() {
        let body = br##"{"data":[
            {"id":1,"name":"Colors","artist":"William King","cover":"4f718272","url":"https://cdn/a.mp3","accent":"#331E00"},
            {"id":2,"name":"Sunset","artist":null,"cover":null,"url":"https://cdn/b.mp3"}
        ]}"##;
        let records = decode_records(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[0].name.as_deref(), Some("Colors"));
        assert_eq!(records[1].artist, None);
    }

    #[test]
    fn test_decode_bare_array() {
        let body = br#"[{"id":7,"name":"x","artist":"y","cover":"c","url":"u"}]"#;
        let records = decode_records(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 7);
    }

    #[test]
    fn test_decode_skips_invalid_records() {
        let body = br#"[
            {"id":1,"url":"a"},
            {"id":"two","url":"b"},
            {"id":3},
            {"id":4,"url":"   "},
            {"id":1,"url":"dup"},
            {"id":5,"url":"e"}
        ]"#;
        let ids: Vec<u64> = decode_records(body).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn test_decode_rejects_non_list_body() {
        assert!(decode_records(br#"{"errors":[{"message":"forbidden"}]}"#).is_err());
        assert!(decode_records(b"not json").is_err());
    }

    #[test]
    fn test_track_from_record() {
        let record = TrackRecord {
            id: 9,
            name: Some("Name".into()),
            artist: None,
            cover: Some("abc".into()),
            url: "https://cdn/x.mp3".into(),
        };
        let track = Track::new(record, "https://cms.example/assets/", 125.7);
        assert_eq!(track.id, TrackId(9));
        assert_eq!(track.artist, "");
        assert_eq!(track.cover_url, "https://cms.example/assets/abc");
        assert_eq!(track.duration, "2:05");
    }
}
