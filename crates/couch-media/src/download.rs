//! Playlist listing and video download using yt-dlp.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// YouTube format selector: 1080p H.264 video (137) merged with AAC audio (140).
pub const DEFAULT_VIDEO_FORMAT: &str = "137+140";

/// One thumbnail variant from a playlist listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl Thumbnail {
    /// Pixel area, zero when a dimension is unknown.
    pub fn area(&self) -> u64 {
        self.width.unwrap_or(0) as u64 * self.height.unwrap_or(0) as u64
    }
}

/// One video entry from a flat playlist listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

impl PlaylistEntry {
    /// Largest thumbnail by pixel area; the first one wins on ties.
    pub fn largest_thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnails.iter().fold(None, |best: Option<&Thumbnail>, t| match best {
            Some(b) if b.area() >= t.area() => Some(b),
            _ => Some(t),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistDump {
    #[serde(default)]
    entries: Vec<Option<serde_json::Value>>,
}

/// Parse the JSON document printed by `yt-dlp --flat-playlist -J`.
///
/// Unavailable entries (null or missing an id) are skipped.
pub fn parse_playlist_json(bytes: &[u8]) -> MediaResult<Vec<PlaylistEntry>> {
    let dump: PlaylistDump = serde_json::from_slice(bytes)?;
    let mut entries = Vec::with_capacity(dump.entries.len());
    for value in dump.entries.into_iter().flatten() {
        match serde_json::from_value::<PlaylistEntry>(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => debug!("Skipping unreadable playlist entry: {}", e),
        }
    }
    Ok(entries)
}

/// List every video of a playlist without downloading anything.
pub async fn list_playlist(playlist_url: &str) -> MediaResult<Vec<PlaylistEntry>> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    info!(playlist = %playlist_url, "Listing playlist");

    let output = Command::new("yt-dlp")
        .args(["--flat-playlist", "-J", "--no-warnings"])
        .arg(playlist_url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        let error_msg = stderr.lines().last().unwrap_or("Unknown error");
        return Err(MediaError::download_failed(format!(
            "yt-dlp playlist listing failed: {}",
            error_msg
        )));
    }

    let entries = parse_playlist_json(&output.stdout)?;
    info!(count = entries.len(), "Playlist listed");
    Ok(entries)
}

/// Download a video with the given yt-dlp format selector.
///
/// An existing non-empty file at `output_path` is reused.
pub async fn download_video(
    url: &str,
    output_path: impl AsRef<Path>,
    format: &str,
) -> MediaResult<()> {
    let output_path = output_path.as_ref();

    if let Ok(metadata) = tokio::fs::metadata(output_path).await {
        if metadata.len() > 0 {
            info!("Using existing video file: {}", output_path.display());
            return Ok(());
        }
        warn!(
            "Existing file {} is empty, re-downloading",
            output_path.display()
        );
        tokio::fs::remove_file(output_path).await?;
    }

    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!(
        "Downloading video from {} to {}",
        url,
        output_path.display()
    );

    let output = Command::new("yt-dlp")
        .args([
            "--no-playlist",
            "--no-warnings",
            "-f",
            format,
            "--merge-output-format",
            "mp4",
            "-o",
        ])
        .arg(output_path)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);

        let error_msg = stderr.lines().last().unwrap_or("Unknown error");
        if stderr.contains("429") || stderr.contains("Too Many Requests") {
            warn!(url = %url, "YouTube rate limit detected");
        }

        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {}",
            error_msg
        )));
    }

    if !output_path.exists() {
        return Err(MediaError::download_failed("Output file not created"));
    }

    let file_size = output_path.metadata()?.len();
    info!(
        output = %output_path.display(),
        size_mb = file_size as f64 / (1024.0 * 1024.0),
        "Downloaded video successfully"
    );

    Ok(())
}
