//! Platform-specific utilities for cctvloader
//!
//! This module provides cross-platform abstractions for:
//! - Application directories (config, downloads)
//! - External tool discovery (FFmpeg)
//! - Write-permission probing for user-chosen folders

use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Returns the configuration directory
/// - macOS: ~/Library/Application Support/cctvloader
/// - Windows: %APPDATA%\cctvloader
/// - Linux: ~/.config/cctvloader
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cctvloader")
}

/// Returns the default download directory: ~/Downloads, or the home
/// directory when no Downloads folder exists
pub fn default_download_dir() -> PathBuf {
    if let Some(downloads) = dirs::download_dir() {
        if downloads.exists() {
            return downloads;
        }
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Checks that files can be created in `dir` by writing and removing a probe file
pub fn check_write_permission(dir: &Path) -> bool {
    let probe = dir.join(".cctvloader_write_test");
    match std::fs::write(&probe, b"test") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(e) => {
            warn!("Directory {:?} is not writable: {}", dir, e);
            false
        }
    }
}

/// Platform-specific executable extension
pub fn exe_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        ".exe"
    }
    #[cfg(not(target_os = "windows"))]
    {
        ""
    }
}

/// Location and version of the FFmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegInfo {
    pub path: PathBuf,
    pub version: Option<String>,
}

static FFMPEG_ON_PATH: OnceCell<Option<FfmpegInfo>> = OnceCell::new();

/// Locate FFmpeg.
///
/// An explicit `location` (file or directory) is checked on every call and
/// wins when it exists. The PATH search runs once per process.
pub fn ffmpeg(location: Option<&Path>) -> Option<FfmpegInfo> {
    if let Some(path) = location.and_then(configured_ffmpeg) {
        return Some(probe_ffmpeg(path));
    }

    FFMPEG_ON_PATH
        .get_or_init(|| which::which("ffmpeg").ok().map(probe_ffmpeg))
        .clone()
}

fn configured_ffmpeg(location: &Path) -> Option<PathBuf> {
    let candidate = if location.is_dir() {
        location.join(format!("ffmpeg{}", exe_extension()))
    } else {
        location.to_path_buf()
    };
    if candidate.exists() {
        return Some(candidate);
    }
    warn!("Configured FFmpeg location {:?} does not exist", location);
    None
}

fn probe_ffmpeg(path: PathBuf) -> FfmpegInfo {
    let version = ffmpeg_version(&path);
    debug!("FFmpeg at {:?} ({:?})", path, version);
    FfmpegInfo { path, version }
}

fn ffmpeg_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_ffmpeg_version(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the version token from the first line of `ffmpeg -version`
fn parse_ffmpeg_version(banner: &str) -> Option<String> {
    banner
        .lines()
        .next()?
        .strip_prefix("ffmpeg version ")?
        .split_whitespace()
        .next()
        .map(str::to_string)
}
