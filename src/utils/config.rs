//! Application configuration

use crate::utils::platform;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "settings.json";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Download location
    pub download_location: PathBuf,

    /// Format selection string, e.g. `best` or `best[height<=720]`
    pub format: String,

    /// Output path template relative to `download_location`
    pub output_template: String,

    pub write_subtitles: bool,
    pub write_thumbnail: bool,

    /// Write a `.info.json` sidecar next to the media
    pub add_metadata: bool,

    /// Explicit FFmpeg binary; looked up on PATH when unset
    pub ffmpeg_location: Option<PathBuf>,

    /// Timeout for every HTTP request (seconds)
    pub request_timeout_secs: u64,

    pub user_agent: String,

    /// Write buffer size for downloads (bytes)
    pub chunk_size: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            download_location: platform::default_download_dir(),
            format: "best".to_string(),
            output_template: "%(title)s/%(title)s.%(ext)s".to_string(),
            write_subtitles: false,
            write_thumbnail: false,
            add_metadata: false,
            ffmpeg_location: None,
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
            chunk_size: 64 * 1024,
        }
    }
}

impl AppSettings {
    /// Path of the settings file inside the platform config directory
    pub fn default_path() -> PathBuf {
        platform::config_dir().join(SETTINGS_FILE)
    }

    /// Load settings, falling back to defaults when the file is missing or broken
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No settings at {:?} ({}), using defaults", path, e);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }
}
