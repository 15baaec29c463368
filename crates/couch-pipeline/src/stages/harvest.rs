//! Harvest: list the playlist, catalogue unseen videos, fetch thumbnails.

use std::path::Path;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use couch_media::{list_playlist, PlaylistEntry};
use couch_models::{VideoId, VideoRecord};
use couch_store::{write_atomic, CatalogStore, DataLayout};
use reqwest::Client;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::StageLogger;
use crate::stages::StageReport;

const STAGE: &str = "harvest";

pub async fn run_harvest(config: &PipelineConfig) -> PipelineResult<StageReport> {
    let layout = config.layout();

    // Fail on a corrupt catalog before touching the network
    CatalogStore::new(layout.catalog()).load().await?;

    info!(playlist = %config.playlist_url, "Listing playlist");
    let entries = list_playlist(&config.playlist_url).await?;

    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| PipelineError::config_error(format!("HTTP client: {}", e)))?;

    harvest_entries(&layout, &client, entries, Local::now().naive_local()).await
}

/// Build catalog records from listed entries and append the unseen ones.
///
/// Thumbnails are fetched for every listed entry whose file is missing; a
/// failed fetch is logged and the record keeps its intended path.
pub async fn harvest_entries(
    layout: &DataLayout,
    client: &Client,
    entries: Vec<PlaylistEntry>,
    date_added: NaiveDateTime,
) -> PipelineResult<StageReport> {
    let mut report = StageReport::default();
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let id = VideoId::from(entry.id.as_str());
        let logger = StageLogger::new(&id, STAGE);

        let thumbnail_url = entry.largest_thumbnail().map(|t| t.url.clone());
        let thumbnail_path = match &thumbnail_url {
            Some(url) => {
                let path = layout.thumbnail(&id);
                match fetch_thumbnail(client, url, &path).await {
                    Ok(true) => logger.log_progress("thumbnail saved"),
                    Ok(false) => logger.log_skip("thumbnail already exists"),
                    Err(e) => {
                        report.failed += 1;
                        logger.log_warning(&format!("thumbnail fetch failed: {}", e));
                    }
                }
                Some(DataLayout::display_path(&path))
            }
            None => None,
        };

        let record = VideoRecord::new(id, entry.title, date_added)?
            .with_thumbnail(thumbnail_url, thumbnail_path)
            .with_upload_date(entry.upload_date);
        records.push(record);
    }

    let fetched = records.len();
    let added = CatalogStore::new(layout.catalog()).append_new(records).await?;
    report.processed = added.len();
    report.skipped = fetched - added.len();

    info!(
        fetched,
        added = added.len(),
        thumbnail_failures = report.failed,
        "Harvest finished"
    );
    Ok(report)
}

/// Download one thumbnail unless the file exists. Returns whether it was written.
pub async fn fetch_thumbnail(client: &Client, url: &str, path: &Path) -> PipelineResult<bool> {
    if path.exists() {
        return Ok(false);
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::thumbnail_failed(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(PipelineError::thumbnail_failed(format!(
            "{}: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PipelineError::thumbnail_failed(format!("{}: {}", url, e)))?;
    write_atomic(path, &bytes).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use couch_media::Thumbnail;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn added() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn entry(id: &str, thumbs: Vec<Thumbnail>) -> PlaylistEntry {
        PlaylistEntry {
            id: id.to_string(),
            title: Some(format!("Apartment {}", id)),
            upload_date: None,
            thumbnails: thumbs,
        }
    }

    fn thumb(url: String, w: u32, h: u32) -> Thumbnail {
        Thumbnail {
            url,
            width: Some(w),
            height: Some(h),
        }
    }

    #[tokio::test]
    async fn test_harvest_fetches_largest_thumbnail_and_catalogs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"JPEGDATA".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path().join("data"), dir.path().join("assets"));
        let client = Client::new();

        let entries = vec![
            entry(
                "a",
                vec![
                    thumb(format!("{}/small.jpg", server.uri()), 120, 90),
                    thumb(format!("{}/big.jpg", server.uri()), 1280, 720),
                ],
            ),
            entry("b", vec![]),
        ];

        let report = harvest_entries(&layout, &client, entries, added()).await.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 0);

        let thumb_path = layout.thumbnail(&VideoId::from("a"));
        assert_eq!(tokio::fs::read(&thumb_path).await.unwrap(), b"JPEGDATA");

        let catalog = CatalogStore::new(layout.catalog()).load().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog[0].thumbnail_url.as_deref(),
            Some(format!("{}/big.jpg", server.uri()).as_str())
        );
        assert!(catalog[1].thumbnail_path.is_none());
    }

    #[tokio::test]
    async fn test_existing_thumbnail_not_refetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"NEW".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path(), dir.path().join("assets"));
        let thumb_path = layout.thumbnail(&VideoId::from("a"));
        write_atomic(&thumb_path, b"OLD").await.unwrap();

        let entries = vec![entry("a", vec![thumb(format!("{}/t.jpg", server.uri()), 10, 10)])];
        harvest_entries(&layout, &Client::new(), entries, added()).await.unwrap();

        assert_eq!(tokio::fs::read(&thumb_path).await.unwrap(), b"OLD");
    }

    #[tokio::test]
    async fn test_failed_thumbnail_still_catalogs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path(), dir.path().join("assets"));
        let entries = vec![entry("a", vec![thumb(format!("{}/t.jpg", server.uri()), 10, 10)])];

        let report = harvest_entries(&layout, &Client::new(), entries, added()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 1);
        assert!(!layout.thumbnail(&VideoId::from("a")).exists());
    }

    #[tokio::test]
    async fn test_rerun_appends_nothing() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path(), dir.path().join("assets"));
        let client = Client::new();

        harvest_entries(&layout, &client, vec![entry("a", vec![])], added()).await.unwrap();
        let report = harvest_entries(&layout, &client, vec![entry("a", vec![]), entry("c", vec![])], added())
            .await
            .unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
    }
}
