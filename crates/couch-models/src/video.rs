//! Playlist catalog models.

use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use url::Url;

use crate::error::{ModelError, ModelResult};

/// Base URL for canonical watch links.
pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch";

/// Short unique token YouTube assigns to a video.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this video.
    pub fn watch_url(&self) -> ModelResult<String> {
        Url::parse_with_params(WATCH_URL_BASE, &[("v", self.as_str())])
            .map(String::from)
            .map_err(|e| ModelError::InvalidUrl(e.to_string()))
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One entry of the playlist catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Video title as reported by the playlist listing
    pub title: Option<String>,

    /// Canonical watch URL
    pub url: String,

    /// Remote URL of the largest thumbnail
    pub thumbnail_url: Option<String>,

    /// Local path of the downloaded thumbnail
    pub thumbnail_path: Option<String>,

    /// Natural key
    pub id: VideoId,

    /// Upload date (YYYYMMDD) when the listing provides one
    pub upload_date: Option<String>,

    /// Local time the record was first added to the catalog
    pub date_added: NaiveDateTime,
}

impl VideoRecord {
    /// Create a record for a newly listed video.
    pub fn new(id: VideoId, title: Option<String>, date_added: NaiveDateTime) -> ModelResult<Self> {
        let url = id.watch_url()?;
        Ok(Self {
            title,
            url,
            thumbnail_url: None,
            thumbnail_path: None,
            id,
            upload_date: None,
            date_added,
        })
    }

    pub fn with_thumbnail(mut self, url: Option<String>, path: Option<String>) -> Self {
        self.thumbnail_url = url;
        self.thumbnail_path = path;
        self
    }

    pub fn with_upload_date(mut self, upload_date: Option<String>) -> Self {
        self.upload_date = upload_date;
        self
    }
}

/// Select the fetched records whose ids are not already in the catalog.
///
/// Duplicates inside `fetched` are dropped too; the first occurrence wins.
pub fn merge_new_videos(existing: &[VideoRecord], fetched: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let mut seen: HashSet<VideoId> = existing.iter().map(|v| v.id.clone()).collect();
    fetched
        .into_iter()
        .filter(|v| seen.insert(v.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn added() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 1)
            .unwrap()
            .and_hms_micro_opt(12, 30, 0, 123456)
            .unwrap()
    }

    fn record(id: &str) -> VideoRecord {
        VideoRecord::new(VideoId::from(id), Some(format!("Video {}", id)), added()).unwrap()
    }

    #[test]
    fn test_watch_url() {
        let id = VideoId::from("yuPhS__2SMs");
        assert_eq!(
            id.watch_url().unwrap(),
            "https://www.youtube.com/watch?v=yuPhS__2SMs"
        );
    }

    #[test]
    fn test_merge_appends_only_unseen() {
        let existing = vec![record("a"), record("b")];
        let fetched = vec![record("b"), record("c"), record("c"), record("d")];

        let new = merge_new_videos(&existing, fetched);
        let ids: Vec<&str> = new.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn test_record_json_shape() {
        let rec = record("abc")
            .with_thumbnail(
                Some("https://i.ytimg.com/vi/abc/maxresdefault.jpg".to_string()),
                Some("data/thumbnails/abc.png".to_string()),
            )
            .with_upload_date(Some("20240105".to_string()));

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["url"], "https://www.youtube.com/watch?v=abc");
        assert_eq!(json["thumbnail_path"], "data/thumbnails/abc.png");
        assert_eq!(json["date_added"], "2024-10-01T12:30:00.123456");

        let back: VideoRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_missing_optional_fields_are_null() {
        let json = serde_json::to_value(record("x")).unwrap();
        assert!(json["thumbnail_url"].is_null());
        assert!(json["upload_date"].is_null());
    }
}
