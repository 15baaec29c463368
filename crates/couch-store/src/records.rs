//! Directory of one JSON file per video (`<dir>/<id>.json`).

use couch_models::VideoId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::StorageResult;
use crate::fs_utils::{read_json, write_json_atomic};

pub struct RecordDir<T> {
    dir: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> RecordDir<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _record: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &VideoId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn exists(&self, id: &VideoId) -> bool {
        self.path_for(id).exists()
    }

    pub async fn read(&self, id: &VideoId) -> StorageResult<Option<T>> {
        read_json(self.path_for(id)).await
    }

    pub async fn write(&self, id: &VideoId, record: &T) -> StorageResult<()> {
        write_json_atomic(self.path_for(id), record).await
    }

    /// Every record in the directory, sorted by id. Missing directory is empty.
    pub async fn list(&self) -> StorageResult<Vec<(VideoId, T)>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(VideoId::from(stem));
            }
        }
        ids.sort();

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.read(&id).await? {
                records.push((id, record));
            }
        }

        debug!(dir = %self.dir.display(), count = records.len(), "Listed records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use couch_models::{ColorClassification, CouchColourLabel};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_exists() {
        let dir = TempDir::new().unwrap();
        let records: RecordDir<ColorClassification> = RecordDir::new(dir.path().join("labels"));
        let id = VideoId::from("abc");

        assert!(!records.exists(&id));
        assert!(records.read(&id).await.unwrap().is_none());

        let label = ColorClassification::new(
            id.clone(),
            CouchColourLabel {
                couch_colour: "grey".into(),
            },
        );
        records.write(&id, &label).await.unwrap();

        assert!(records.exists(&id));
        assert_eq!(records.read(&id).await.unwrap().unwrap(), label);
    }

    #[tokio::test]
    async fn test_list_sorted_and_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        let hex: RecordDir<Vec<String>> = RecordDir::new(dir.path());
        hex.write(&VideoId::from("b"), &vec!["#000001".to_string()]).await.unwrap();
        hex.write(&VideoId::from("a"), &vec!["#000002".to_string()]).await.unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignore").await.unwrap();

        let listed = hex.list().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let hex: RecordDir<Vec<String>> = RecordDir::new(dir.path().join("absent"));
        assert!(hex.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record_surfaces() {
        let dir = TempDir::new().unwrap();
        let hex: RecordDir<Vec<String>> = RecordDir::new(dir.path());
        fs::write(dir.path().join("x.json"), b"oops").await.unwrap();
        assert!(matches!(hex.list().await, Err(StorageError::Corrupt { .. })));
    }
}
