//! Playlist catalog: a JSON array of video records.

use couch_models::{merge_new_videos, VideoRecord};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::StorageResult;
use crate::fs_utils::{read_json, write_json_atomic};

pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records; empty when the file does not exist yet.
    pub async fn load(&self) -> StorageResult<Vec<VideoRecord>> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    pub async fn save(&self, records: &[VideoRecord]) -> StorageResult<()> {
        write_json_atomic(&self.path, records).await
    }

    /// Append fetched records whose ids are not stored yet.
    ///
    /// Returns the records that were added. The file is rewritten only when
    /// something new arrived.
    pub async fn append_new(&self, fetched: Vec<VideoRecord>) -> StorageResult<Vec<VideoRecord>> {
        let mut existing = self.load().await?;
        let added = merge_new_videos(&existing, fetched);

        if !added.is_empty() {
            existing.extend(added.iter().cloned());
            self.save(&existing).await?;
        }

        info!(
            path = %self.path.display(),
            added = added.len(),
            total = existing.len(),
            "Catalog updated"
        );
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use chrono::NaiveDate;
    use couch_models::VideoId;
    use tempfile::TempDir;

    fn record(id: &str) -> VideoRecord {
        let added = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        VideoRecord::new(VideoId::from(id), None, added).unwrap()
    }

    #[tokio::test]
    async fn test_append_keeps_existing_and_skips_seen() {
        let dir = TempDir::new().unwrap();
        let store = CatalogStore::new(dir.path().join("catalog.json"));

        let added = store.append_new(vec![record("a"), record("b")]).await.unwrap();
        assert_eq!(added.len(), 2);

        let added = store.append_new(vec![record("b"), record("c")]).await.unwrap();
        assert_eq!(added.len(), 1);

        let ids: Vec<String> = store
            .load()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_corrupt_catalog_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        tokio::fs::write(&path, b"[{\"id\": 1}]").await.unwrap();

        let store = CatalogStore::new(&path);
        assert!(matches!(
            store.append_new(vec![record("a")]).await,
            Err(StorageError::Corrupt { .. })
        ));
        // Untouched
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"[{\"id\": 1}]");
    }
}
