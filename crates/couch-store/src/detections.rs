//! Detection store: a JSON object mapping video id to detection record.

use couch_models::{DetectionIndex, DetectionRecord};
use std::path::{Path, PathBuf};

use crate::error::StorageResult;
use crate::fs_utils::{read_json, write_json_atomic};

pub struct DetectionStore {
    path: PathBuf,
}

impl DetectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> StorageResult<DetectionIndex> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    pub async fn save(&self, index: &DetectionIndex) -> StorageResult<()> {
        write_json_atomic(&self.path, index).await
    }

    /// Insert or replace one record in memory and persist the whole index.
    pub async fn upsert(
        &self,
        index: &mut DetectionIndex,
        record: DetectionRecord,
    ) -> StorageResult<()> {
        index.insert(record.video_id.clone(), record);
        self.save(index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use couch_models::VideoId;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upsert_persists_each_record() {
        let dir = TempDir::new().unwrap();
        let store = DetectionStore::new(dir.path().join("couch_info.json"));

        let mut index = store.load().await.unwrap();
        assert!(index.is_empty());

        store
            .upsert(&mut index, DetectionRecord::not_detected(VideoId::from("b")))
            .await
            .unwrap();
        store
            .upsert(
                &mut index,
                DetectionRecord::detected(VideoId::from("a"), "data/couch_images/a_couch.jpg"),
            )
            .await
            .unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, index);
        let ids: Vec<&str> = reloaded.keys().map(VideoId::as_str).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
