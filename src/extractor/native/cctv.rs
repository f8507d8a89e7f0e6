//! Single-video extractor for CCTV / CNTV / NCPA pages

use crate::extractor::client::{build_url, Fetcher};
use crate::extractor::hls::extract_m3u8_formats;
use crate::extractor::html::{absolutize_protocol, MetaTags};
use crate::extractor::models::{Format, Protocol, VideoInfo};
use crate::extractor::parse::{float_or_none, parse_timestamp, str_or_none, upload_date};
use crate::extractor::traits::Extractor;
use crate::utils::error::CctvError;
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const API_URL: &str = "http://vdn.apps.cntv.cn/api/getHttpVideoInfo.do";

/// Preference of progressive tier formats; they are usually truncated previews
pub const SAMPLE_CLIP_PREFERENCE: i32 = -10;

static VALID_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(?:[^/]+\.(?:cntv|cctv)\.(?:com|cn)|(?:www\.)?ncpa-classic\.com)/(?:[^/]+/)*?(?P<id>[^/?#&]+?)(?:/index)?(?:\.s?html|[?#&]|$)",
    )
    .expect("valid URL pattern")
});

/// List pages (`VIDA…` / `VIDAL…` leaves) belong to the list extractor
static LIST_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:tv\.cctv\.com|tv\.cntv\.cn)/\d{4}/\d{2}/\d{2}/(?:VIDAL|VIDA)")
        .expect("list page pattern")
});

static BITRATE_CAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"maxbr=\d+&?").expect("maxbr pattern"));

/// One way a page template embeds the video id
pub struct IdMatcher {
    pub name: &'static str,
    regex: Regex,
}

impl IdMatcher {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("id pattern"),
        }
    }

    pub fn find(&self, html: &str) -> Option<String> {
        self.regex
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Id matchers in priority order; the first hit wins
pub static ID_MATCHERS: Lazy<Vec<IdMatcher>> = Lazy::new(|| {
    vec![
        IdMatcher::new("guid", r#"var\s+guid\s*=\s*["']([\da-fA-F]+)"#),
        IdMatcher::new("videoCenterId", r#"videoCenterId(?:["']\s*,|:)\s*["']([\da-fA-F]+)"#),
        IdMatcher::new("changePlayer", r#"changePlayer\s*\(\s*["']([\da-fA-F]+)"#),
        IdMatcher::new("loadVideo", r#"load[Vv]ideo\s*\(\s*["']([\da-fA-F]+)"#),
        IdMatcher::new("initMyAray", r#"var\s+initMyAray\s*=\s*["']([\da-fA-F]+)"#),
        IdMatcher::new("ids", r#"var\s+ids\s*=\s*\[["']([\da-fA-F]+)"#),
    ]
});

/// Recover the internal video id from page markup
pub fn resolve_id(html: &str) -> Result<String, CctvError> {
    for matcher in ID_MATCHERS.iter() {
        if let Some(id) = matcher.find(html) {
            debug!("Video id {} matched by `{}`", id, matcher.name);
            return Ok(id);
        }
    }
    Err(CctvError::NotFound("video id".to_string()))
}

/// Whether `url` is a single-video page handled by [`CctvExtractor`]
pub fn is_suitable(url: &str) -> bool {
    !LIST_PAGE.is_match(url) && VALID_URL.is_match(url)
}

/// Remove `maxbr=<n>` caps (and the `&` after them) from an HLS URL
pub fn strip_bitrate_cap(url: &str) -> String {
    BITRATE_CAP.replace_all(url, "").into_owned()
}

/// One entry of a chapter list
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub url: Option<String>,
}

/// The `video` object of a metadata response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterSet {
    pub low_chapters: Vec<Chapter>,
    pub chapters: Vec<Chapter>,
    /// Seconds
    pub total_length: Option<f64>,
}

impl ChapterSet {
    fn from_value(video: &serde_json::Map<String, Value>) -> Self {
        let chapters = |key: &str| -> Vec<Chapter> {
            video
                .get(key)
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .map(|entry| Chapter {
                            url: entry.get("url").and_then(str_or_none).map(str::to_string),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            low_chapters: chapters("lowChapters"),
            chapters: chapters("chapters"),
            total_length: video.get("totalLength").and_then(float_or_none),
        }
    }

    /// (quality, first chapter URL) for the low tier then the standard tier
    pub fn tiers(&self) -> [(i32, Option<&str>); 2] {
        [
            (0, first_url(&self.low_chapters)),
            (1, first_url(&self.chapters)),
        ]
    }
}

fn first_url(chapters: &[Chapter]) -> Option<&str> {
    chapters.first().and_then(|c| c.url.as_deref())
}

/// Metadata endpoint response
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub title: String,
    /// Present only when the response's `video` is an object
    pub video: Option<ChapterSet>,
    pub hls_url: Option<String>,
    pub editer_name: Option<String>,
    pub f_pgmtime: Option<String>,
}

impl StreamRecord {
    /// Build from raw JSON; only `title` is mandatory
    pub fn from_value(value: &Value) -> Result<Self, CctvError> {
        let data = value
            .as_object()
            .ok_or_else(|| CctvError::Upstream("metadata response is not an object".to_string()))?;

        let title = data
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| CctvError::MissingField("title".to_string()))?
            .to_string();

        let string = |key: &str| data.get(key).and_then(str_or_none).map(str::to_string);

        Ok(Self {
            title,
            video: data
                .get("video")
                .and_then(Value::as_object)
                .map(ChapterSet::from_value),
            hls_url: string("hls_url"),
            editer_name: string("editer_name"),
            f_pgmtime: string("f_pgmtime"),
        })
    }
}

/// Progressive-HTTP candidates, low tier first
pub fn progressive_formats(record: &StreamRecord) -> Vec<Format> {
    let Some(video) = &record.video else {
        return Vec::new();
    };

    video
        .tiers()
        .into_iter()
        .filter_map(|(quality, url)| {
            url.map(|url| Format {
                format_id: "http".to_string(),
                ext: "mp4".to_string(),
                url: url.to_string(),
                protocol: Protocol::Http,
                quality: Some(quality),
                preference: Some(SAMPLE_CLIP_PREFERENCE),
                ..Format::default()
            })
        })
        .collect()
}

/// Progressive candidates followed by the expanded HLS manifest.
///
/// Manifest failures are logged and contribute nothing.
pub async fn assemble_formats(fetcher: &dyn Fetcher, record: &StreamRecord) -> Vec<Format> {
    let mut formats = progressive_formats(record);

    if let Some(hls_url) = &record.hls_url {
        let hls_url = strip_bitrate_cap(hls_url);
        match extract_m3u8_formats(fetcher, &hls_url, "mp4", "hls").await {
            Ok(hls) => formats.extend(hls),
            Err(e) => warn!("Failed to download m3u8 information from {}: {:#}", hls_url, e),
        }
    }

    formats
}

fn page_details(html: &str) -> (Option<String>, Option<String>) {
    let meta = MetaTags::parse(html);
    (
        meta.get("description").map(str::to_string),
        meta.get("og:image").map(absolutize_protocol),
    )
}

pub struct CctvExtractor {
    fetcher: Arc<dyn Fetcher>,
}

impl CctvExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Query the metadata endpoint for `video_id`
    pub async fn fetch_streams(&self, video_id: &str, page_url: &str) -> Result<StreamRecord> {
        let api = build_url(
            API_URL,
            &[
                ("pid", video_id),
                ("url", page_url),
                ("idl", "32"),
                ("idlr", "32"),
                ("modifyed", "false"),
            ],
        )?;

        let value = self
            .fetcher
            .fetch_json(&api)
            .await
            .map_err(|e| CctvError::Upstream(format!("{:#}", e)))?;

        Ok(StreamRecord::from_value(&value)?)
    }
}

#[async_trait]
impl Extractor for CctvExtractor {
    fn id(&self) -> &'static str {
        "cctv"
    }

    fn supports(&self, url: &str) -> bool {
        is_suitable(url)
    }

    async fn extract_info(&self, url: &str) -> Result<VideoInfo> {
        info!("Extracting CCTV video: {}", url);

        let page_url = build_url(url, &[])?;
        let webpage = self.fetcher.fetch_text(&page_url).await?;
        let video_id = resolve_id(&webpage)?;
        let (description, thumbnail) = page_details(&webpage);

        let record = self.fetch_streams(&video_id, url).await?;
        let formats = assemble_formats(self.fetcher.as_ref(), &record).await;
        debug!("{} formats for {}", formats.len(), video_id);

        let timestamp = record.f_pgmtime.as_deref().and_then(parse_timestamp);

        Ok(VideoInfo {
            id: video_id,
            title: record.title,
            url: url.to_string(),
            description,
            uploader: record.editer_name,
            timestamp,
            upload_date: timestamp.and_then(upload_date),
            duration: record.video.as_ref().and_then(|v| v.total_length),
            thumbnail,
            formats,
            extractor: Some(self.id().to_string()),
        })
    }
}
