//! Atomic file writes and tolerant JSON reads.
//!
//! Every output goes to a sibling `.tmp` file first and is renamed into
//! place, so a crash never leaves a partial file at the final path.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

use crate::error::{StorageError, StorageResult};

/// Sibling temp path: `name.ext` becomes `name.ext.tmp`.
fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to `path` via a temp file and rename.
pub async fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> StorageResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)
        .await
        .map_err(|e| StorageError::write_failed(&tmp, e))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        // Clean up temp file on failure
        let _ = fs::remove_file(&tmp).await;
        tracing::error!(
            "Failed to rename temp file: {} -> {}: {}",
            tmp.display(),
            path.display(),
            e
        );
        return Err(StorageError::write_failed(path, e));
    }

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
}

/// Serialize as pretty JSON and write atomically.
pub async fn write_json_atomic<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
) -> StorageResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    write_atomic(path, &bytes).await
}

/// Read JSON from `path`; a missing file is `None`, a malformed one is corrupt.
pub async fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> StorageResult<Option<T>> {
    let path = path.as_ref();
    let bytes = match fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::Io(e)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::corrupt(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_creates_parents_and_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.json");

        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "second");
        assert!(!tmp_path(&path).exists(), "temp file should be renamed away");
    }

    #[tokio::test]
    async fn test_read_json_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let value: Option<Vec<String>> = read_json(dir.path().join("absent.json")).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_read_json_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{not json").await.unwrap();

        let result: StorageResult<Option<Vec<String>>> = read_json(&path).await;
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hex.json");
        let colors = vec!["#aabbcc".to_string(), "#010203".to_string()];

        write_json_atomic(&path, &colors).await.unwrap();
        let back: Vec<String> = read_json(&path).await.unwrap().unwrap();
        assert_eq!(back, colors);
    }

    #[test]
    fn test_tmp_path_keeps_extension() {
        assert_eq!(
            tmp_path(Path::new("data/a_couch.jpg")),
            Path::new("data/a_couch.jpg.tmp")
        );
    }
}
