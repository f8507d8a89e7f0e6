//! Data structures for video information

use serde::{Deserialize, Serialize};

/// Video information structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    #[serde(alias = "webpage_url")]
    pub url: String,
    pub description: Option<String>,
    pub uploader: Option<String>,
    /// UNIX timestamp (seconds)
    pub timestamp: Option<i64>,
    /// `YYYYMMDD`, derived from `timestamp`
    pub upload_date: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    /// Ordered as assembled; callers rank with `quality`/`preference`
    #[serde(default)]
    pub formats: Vec<Format>,
    pub extractor: Option<String>,
}

/// Delivery mechanism of a format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Single file over HTTP(S)
    #[default]
    Http,
    /// HLS media playlist downloaded segment by segment
    M3u8Native,
}

/// Video format information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub format_id: String,
    pub ext: String,
    pub url: String,
    #[serde(default)]
    pub protocol: Protocol,
    /// Tier rank among progressive candidates (0 = low, 1 = standard)
    pub quality: Option<i32>,
    /// More negative = less preferred; `-10` marks sample clips
    pub preference: Option<i32>,
    pub resolution: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub format_note: Option<String>,
    pub tbr: Option<f32>, // Total bitrate (kbit/s)
}

impl Format {
    /// Audio-only when the manifest declares no video codec
    pub fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none")
    }

    pub fn has_video(&self) -> bool {
        !self.is_audio_only()
    }
}

/// One item of a list page, resolved lazily by the single-video path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub url: String,
    pub title: String,
    pub thumbnail: Option<String>,
    /// Seconds
    pub duration: Option<u64>,
}

/// A list page and its entries in page order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub entries: Vec<PlaylistEntry>,
}
