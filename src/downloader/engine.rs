//! Download engine for progressive files and native HLS streams

use crate::downloader::progress::DownloadProgress;
use crate::extractor::hls::{is_master_playlist, parse_master_playlist, parse_media_playlist};
use crate::extractor::models::{Format, Protocol};
use crate::utils::config::AppSettings;
use crate::utils::error::CctvError;
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::stream::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// Download configuration
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub chunk_size: usize,     // Write buffer size
    pub retry_attempts: usize, // Retry attempts per HLS fragment
    pub retry_delay: Duration, // Delay between retries
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self::from(&AppSettings::default())
    }
}

impl From<&AppSettings> for DownloadConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            timeout: Duration::from_secs(settings.request_timeout_secs),
            chunk_size: settings.chunk_size.max(1024),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Streams a selected [`Format`] to disk
pub struct DownloadEngine {
    client: Client,
    config: DownloadConfig,
}

impl DownloadEngine {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        // No overall request timeout: a long progressive body is one request
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Download `format` into `output_path`, returning the bytes written.
    ///
    /// `on_progress` runs after every chunk (progressive) or fragment (HLS),
    /// and once more with an error status when the download fails. Returning
    /// an error from it aborts the download with that error. The partial file
    /// is removed whenever the download fails.
    pub async fn download<F>(
        &self,
        format: &Format,
        output_path: &Path,
        mut on_progress: F,
    ) -> Result<u64>
    where
        F: FnMut(&DownloadProgress) -> Result<()> + Send,
    {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        info!(
            "Downloading format {} ({:?}) to {:?}",
            format.format_id, format.protocol, output_path
        );

        let result = match format.protocol {
            Protocol::Http => {
                self.download_progressive(&format.url, output_path, &mut on_progress)
                    .await
            }
            Protocol::M3u8Native => {
                self.download_hls(&format.url, output_path, &mut on_progress)
                    .await
            }
        };

        if let Err(e) = &result {
            if !CctvError::is_cancelled(e) {
                let mut failed = DownloadProgress::new(None, 0);
                failed.failed(format!("{:#}", e));
                let _ = on_progress(&failed);
            }
            if tokio::fs::try_exists(output_path).await.unwrap_or(false) {
                if let Err(e) = tokio::fs::remove_file(output_path).await {
                    warn!("Failed to remove partial file {:?}: {}", output_path, e);
                }
            }
        }

        result
    }

    /// Save a thumbnail next to `media_path`, keeping the image's extension
    pub async fn download_thumbnail(&self, url: &str, media_path: &Path) -> Result<PathBuf> {
        let ext = Url::parse(url)
            .ok()
            .and_then(|u| {
                Path::new(u.path())
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_lowercase)
            })
            .filter(|e| matches!(e.as_str(), "jpg" | "jpeg" | "png" | "webp" | "gif"))
            .unwrap_or_else(|| "jpg".to_string());
        let path = media_path.with_extension(ext);

        let bytes = self.get_bytes(url).await?;
        tokio::fs::write(&path, &bytes).await?;
        debug!("Wrote thumbnail {:?}", path);
        Ok(path)
    }

    async fn download_progressive<F>(
        &self,
        url: &str,
        output_path: &Path,
        on_progress: &mut F,
    ) -> Result<u64>
    where
        F: FnMut(&DownloadProgress) -> Result<()> + Send,
    {
        debug!("Using progressive download for URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(CctvError::Network)?;
        if !response.status().is_success() {
            return Err(CctvError::Download(format!("HTTP {} for {}", response.status(), url)).into());
        }

        let mut progress = DownloadProgress::new(response.content_length(), 0);
        on_progress(&progress)?;

        let mut file = BufWriter::with_capacity(self.config.chunk_size, File::create(output_path).await?);
        let mut downloaded = 0u64;
        let start_time = Instant::now();

        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(CctvError::Network)?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            progress.update(downloaded, speed(downloaded, start_time));
            on_progress(&progress)?;
        }

        file.flush().await?;

        progress.update(downloaded, speed(downloaded, start_time));
        progress.complete();
        on_progress(&progress)?;

        Ok(downloaded)
    }

    async fn download_hls<F>(
        &self,
        manifest_url: &str,
        output_path: &Path,
        on_progress: &mut F,
    ) -> Result<u64>
    where
        F: FnMut(&DownloadProgress) -> Result<()> + Send,
    {
        let (playlist_url, content) = self.resolve_media_playlist(manifest_url).await?;
        let playlist = parse_media_playlist(&content, &playlist_url);

        if playlist.encrypted {
            return Err(CctvError::Download("encrypted HLS streams are not supported".to_string()).into());
        }
        if playlist.segments.is_empty() {
            return Err(CctvError::Download(format!("no segments in {}", playlist_url)).into());
        }

        info!(
            "HLS playlist has {} fragments ({:.0}s)",
            playlist.segments.len(),
            playlist.duration
        );

        let mut progress = DownloadProgress::new(None, playlist.segments.len());
        on_progress(&progress)?;

        let mut file = BufWriter::with_capacity(self.config.chunk_size, File::create(output_path).await?);
        let mut downloaded = 0u64;
        let start_time = Instant::now();

        for (i, segment_url) in playlist.segments.iter().enumerate() {
            let bytes = self.fetch_fragment(segment_url, i).await?;
            file.write_all(&bytes).await?;
            downloaded += bytes.len() as u64;

            progress.update(downloaded, speed(downloaded, start_time));
            progress.update_fragment(i + 1);
            on_progress(&progress)?;
        }

        file.flush().await?;

        progress.complete();
        on_progress(&progress)?;

        Ok(downloaded)
    }

    /// Follow a master playlist to its highest-bandwidth variant
    async fn resolve_media_playlist(&self, manifest_url: &str) -> Result<(Url, String)> {
        let url = Url::parse(manifest_url)
            .map_err(|e| CctvError::Download(format!("invalid manifest URL {}: {}", manifest_url, e)))?;
        let content = self.get_text(url.as_str()).await?;

        if !is_master_playlist(&content) {
            return Ok((url, content));
        }

        let best = parse_master_playlist(&content, &url)
            .into_iter()
            .max_by_key(|v| v.bandwidth.unwrap_or(0))
            .ok_or_else(|| CctvError::Download(format!("no variants in {}", url)))?;
        debug!("Selected HLS variant {} ({:?} bps)", best.uri, best.bandwidth);

        let variant_url = Url::parse(&best.uri)
            .map_err(|e| CctvError::Download(format!("invalid variant URL {}: {}", best.uri, e)))?;
        let variant = self.get_text(variant_url.as_str()).await?;
        Ok((variant_url, variant))
    }

    async fn fetch_fragment(&self, url: &str, index: usize) -> Result<Bytes> {
        let mut attempts = 0;
        loop {
            match self.get_bytes(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempts < self.config.retry_attempts => {
                    attempts += 1;
                    warn!("Fragment {} failed (attempt {}): {}", index, attempts, e);
                    sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(CctvError::Network)?;
        if !response.status().is_success() {
            return Err(CctvError::Download(format!("HTTP {} for {}", response.status(), url)).into());
        }
        Ok(response.bytes().await.map_err(CctvError::Network)?)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let bytes = self.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn speed(downloaded: u64, start_time: Instant) -> f64 {
    let elapsed = start_time.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        downloaded as f64 / elapsed
    } else {
        0.0
    }
}
