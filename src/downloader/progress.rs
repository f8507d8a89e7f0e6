//! Progress tracking for downloads

use serde::Serialize;
use std::time::Duration;

/// Progress snapshot passed to the progress callback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub status: DownloadStatus,
    pub downloaded_bytes: u64,
    /// Exact size for progressive downloads, an estimate for HLS, `None` when unknown
    pub total_bytes: Option<u64>,
    pub speed: f64, // bytes per second
    pub eta: Option<Duration>,
    /// HLS fragments done / total (zero for progressive downloads)
    pub fragments_completed: usize,
    pub total_fragments: usize,
}

impl DownloadProgress {
    /// Create a new progress tracker
    pub fn new(total_bytes: Option<u64>, total_fragments: usize) -> Self {
        Self {
            status: DownloadStatus::Downloading,
            downloaded_bytes: 0,
            total_bytes,
            speed: 0.0,
            eta: None,
            fragments_completed: 0,
            total_fragments,
        }
    }

    /// Update progress with new data
    pub fn update(&mut self, downloaded_bytes: u64, speed: f64) {
        self.downloaded_bytes = downloaded_bytes;
        self.speed = speed;

        self.eta = match self.total_bytes {
            Some(total) if downloaded_bytes >= total => Some(Duration::from_secs(0)),
            Some(total) if speed > 0.0 => Some(Duration::from_secs_f64(
                (total - downloaded_bytes) as f64 / speed,
            )),
            _ => None,
        };
    }

    /// Record a finished HLS fragment and re-estimate the total size from the average fragment
    pub fn update_fragment(&mut self, completed: usize) {
        self.fragments_completed = completed;
        if completed > 0 && self.total_fragments > 0 {
            let average = self.downloaded_bytes / completed as u64;
            self.total_bytes = Some(average * self.total_fragments as u64);
        }
    }

    /// Mark as finished
    pub fn complete(&mut self) {
        self.status = DownloadStatus::Finished;
        self.total_bytes = Some(self.downloaded_bytes);
        self.eta = Some(Duration::from_secs(0));
    }

    /// Mark as failed
    pub fn failed(&mut self, error: String) {
        self.status = DownloadStatus::Error(error);
    }

    /// Get progress percentage (0.0 to 1.0)
    pub fn percentage(&self) -> f64 {
        match self.total_bytes {
            Some(total) if total > 0 => (self.downloaded_bytes as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }
}

/// Download status
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Downloading,
    Finished,
    Error(String),
}

/// Human readable byte size, e.g. `12.34MiB`
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", value, UNITS[unit])
}

/// `MM:SS` or `H:MM:SS`
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs >= 3600 {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else {
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}
