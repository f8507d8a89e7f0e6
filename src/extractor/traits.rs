use crate::extractor::models::{Format, PlaylistInfo, VideoInfo};
use crate::utils::error::CctvError;
use anyhow::Result;
use async_trait::async_trait;

/// Core trait for all site extractors
///
/// Extractors hold no per-call mutable state, so one instance can serve
/// many URLs concurrently.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns a unique identifier for this extractor (e.g., "cctv", "cctv:list")
    fn id(&self) -> &'static str;

    /// Checks if this extractor claims the given URL
    ///
    /// For URLs on the same site at most one extractor may return true.
    fn supports(&self, url: &str) -> bool;

    /// Extracts video information
    async fn extract_info(&self, url: &str) -> Result<VideoInfo> {
        Err(CctvError::UnsupportedUrl(format!("{} (by {})", url, self.id())).into())
    }

    /// Extracts playlist information (optional, default implementation returns an error)
    async fn extract_playlist(&self, url: &str) -> Result<PlaylistInfo> {
        Err(CctvError::UnsupportedUrl(format!("{} (by {})", url, self.id())).into())
    }

    /// Whether `extract_playlist` is the entry point for this extractor
    fn is_playlist(&self) -> bool {
        false
    }

    /// Gets available formats (usually calls extract_info internally)
    async fn get_formats(&self, url: &str) -> Result<Vec<Format>> {
        let info = self.extract_info(url).await?;
        Ok(info.formats)
    }
}
