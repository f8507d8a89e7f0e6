//! `.info.json` sidecar files written next to downloaded media

use crate::extractor::models::{Format, VideoInfo};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Metadata recorded for a finished download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub extractor: Option<String>,
    pub uploader: Option<String>,
    pub description: Option<String>,
    pub timestamp: Option<i64>,
    pub upload_date: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail_url: Option<String>,
    pub format_id: String,
    pub resolution: Option<String>,
    pub file_size: u64,
    pub download_date: DateTime<Utc>,
}

impl VideoMetadata {
    pub fn new(video: &VideoInfo, format: &Format, file_size: u64) -> Self {
        Self {
            video_id: video.id.clone(),
            title: video.title.clone(),
            url: video.url.clone(),
            extractor: video.extractor.clone(),
            uploader: video.uploader.clone(),
            description: video.description.clone(),
            timestamp: video.timestamp,
            upload_date: video.upload_date.clone(),
            duration: video.duration,
            thumbnail_url: video.thumbnail.clone(),
            format_id: format.format_id.clone(),
            resolution: format.resolution.clone(),
            file_size,
            download_date: Utc::now(),
        }
    }
}

/// `/x/name.mp4` -> `/x/name.info.json`
pub fn sidecar_path(media_path: &Path) -> PathBuf {
    media_path.with_extension("info.json")
}

/// Write the sidecar for `media_path` and return its location
pub async fn write_sidecar(media_path: &Path, metadata: &VideoMetadata) -> Result<PathBuf> {
    let path = sidecar_path(media_path);
    let json = serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
    fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write metadata to {:?}", path))?;
    debug!("Metadata written to {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/a/clip.mp4")),
            PathBuf::from("/a/clip.info.json")
        );
    }

    #[tokio::test]
    async fn test_write_sidecar_roundtrips_fields() {
        let temp = TempDir::new().unwrap();
        let media = temp.path().join("clip.mp4");

        let video = VideoInfo {
            id: "abc123".to_string(),
            title: "Clip".to_string(),
            uploader: Some("shujun".to_string()),
            timestamp: Some(1454677291),
            ..VideoInfo::default()
        };
        let format = Format {
            format_id: "http".to_string(),
            ext: "mp4".to_string(),
            ..Format::default()
        };

        let written = write_sidecar(&media, &VideoMetadata::new(&video, &format, 42))
            .await
            .unwrap();
        let loaded: VideoMetadata =
            serde_json::from_str(&std::fs::read_to_string(written).unwrap()).unwrap();

        assert_eq!(loaded.video_id, "abc123");
        assert_eq!(loaded.uploader.as_deref(), Some("shujun"));
        assert_eq!(loaded.file_size, 42);
        assert_eq!(loaded.format_id, "http");
    }
}
