//! HLS manifest handling
//!
//! Expands master playlists into [`Format`]s for extraction and parses
//! media playlists into segment lists for the native downloader.

use crate::extractor::client::Fetcher;
use crate::extractor::models::{Format, Protocol};
use crate::utils::error::CctvError;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use url::Url;

/// One `#EXT-X-STREAM-INF` entry of a master playlist
#[derive(Debug, Clone, PartialEq)]
pub struct HlsVariant {
    pub uri: String,
    pub bandwidth: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codecs: Option<String>,
    pub frame_rate: Option<f32>,
}

/// Parsed media playlist
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    pub segments: Vec<String>,
    /// Sum of `#EXTINF` durations
    pub duration: f64,
    pub encrypted: bool,
}

pub fn is_master_playlist(content: &str) -> bool {
    content.contains("#EXT-X-STREAM-INF")
}

/// Fetch `manifest_url` and expand it into formats tagged with `group_id`.
///
/// A master playlist yields one format per variant (plus alternative audio
/// renditions); a media playlist yields a single format pointing at itself.
pub async fn extract_m3u8_formats(
    fetcher: &dyn Fetcher,
    manifest_url: &str,
    ext: &str,
    group_id: &str,
) -> Result<Vec<Format>> {
    let url = Url::parse(manifest_url)
        .map_err(|e| CctvError::Request(format!("invalid manifest URL {}: {}", manifest_url, e)))?;
    let content = fetcher.fetch_text(&url).await?;

    if !content.trim_start().starts_with("#EXTM3U") {
        return Err(CctvError::Request(format!("{} is not an M3U8 playlist", url)).into());
    }

    let formats = parse_m3u8_formats(&content, &url, ext, group_id);
    debug!("Expanded {} into {} formats", url, formats.len());
    Ok(formats)
}

/// Turn manifest text into formats; `base` resolves relative URIs
pub fn parse_m3u8_formats(content: &str, base: &Url, ext: &str, group_id: &str) -> Vec<Format> {
    if !is_master_playlist(content) {
        return vec![Format {
            format_id: group_id.to_string(),
            ext: ext.to_string(),
            url: base.to_string(),
            protocol: Protocol::M3u8Native,
            ..Format::default()
        }];
    }

    let mut formats = Vec::new();
    let mut seen_ids = HashSet::new();

    for (index, rendition) in parse_audio_renditions(content, base).into_iter().enumerate() {
        let name = rendition.name.unwrap_or_else(|| index.to_string());
        let format_id = unique_id(&mut seen_ids, format!("{}-audio-{}", group_id, name));
        formats.push(Format {
            format_id,
            ext: ext.to_string(),
            url: rendition.uri,
            protocol: Protocol::M3u8Native,
            vcodec: Some("none".to_string()),
            format_note: rendition.language,
            ..Format::default()
        });
    }

    for (index, variant) in parse_master_playlist(content, base).into_iter().enumerate() {
        let tbr = variant.bandwidth.map(|b| b as f32 / 1000.0);
        let suffix = tbr
            .map(|t| format!("{}", t.round() as u64))
            .unwrap_or_else(|| index.to_string());
        let format_id = unique_id(&mut seen_ids, format!("{}-{}", group_id, suffix));
        let (vcodec, acodec) = split_codecs(variant.codecs.as_deref());

        formats.push(Format {
            format_id,
            ext: ext.to_string(),
            url: variant.uri,
            protocol: Protocol::M3u8Native,
            resolution: match (variant.width, variant.height) {
                (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
                _ => None,
            },
            width: variant.width,
            height: variant.height,
            fps: variant.frame_rate,
            vcodec,
            acodec,
            tbr,
            ..Format::default()
        });
    }

    formats
}

fn unique_id(seen: &mut HashSet<String>, id: String) -> String {
    if seen.insert(id.clone()) {
        return id;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}-{}", id, n);
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Parse the `#EXT-X-STREAM-INF` variants of a master playlist
pub fn parse_master_playlist(content: &str, base: &Url) -> Vec<HlsVariant> {
    let mut variants = Vec::new();
    let mut lines = content.lines().map(str::trim).peekable();

    while let Some(line) = lines.next() {
        let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF:") else {
            continue;
        };
        let attrs = parse_attributes(rest);

        // The URI is the next non-empty, non-tag line
        let uri_line = loop {
            match lines.peek().copied() {
                Some("") => {
                    lines.next();
                }
                Some(next) if next.starts_with('#') => break None,
                Some(_) => break lines.next(),
                None => break None,
            }
        };
        let Some(uri_line) = uri_line else {
            continue;
        };

        let (width, height) = attrs
            .get("RESOLUTION")
            .and_then(|r| r.split_once('x'))
            .map(|(w, h)| (w.parse().ok(), h.parse().ok()))
            .unwrap_or((None, None));

        variants.push(HlsVariant {
            uri: resolve_url(base, uri_line),
            bandwidth: attrs
                .get("AVERAGE-BANDWIDTH")
                .or_else(|| attrs.get("BANDWIDTH"))
                .and_then(|v| v.parse().ok()),
            width,
            height,
            codecs: attrs.get("CODECS").cloned(),
            frame_rate: attrs.get("FRAME-RATE").and_then(|v| v.parse().ok()),
        });
    }

    variants
}

struct AudioRendition {
    uri: String,
    name: Option<String>,
    language: Option<String>,
}

fn parse_audio_renditions(content: &str, base: &Url) -> Vec<AudioRendition> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("#EXT-X-MEDIA:"))
        .map(parse_attributes)
        .filter(|attrs| attrs.get("TYPE").map(String::as_str) == Some("AUDIO"))
        .filter_map(|mut attrs| {
            let uri = attrs.remove("URI")?;
            Some(AudioRendition {
                uri: resolve_url(base, &uri),
                name: attrs.remove("NAME"),
                language: attrs.remove("LANGUAGE"),
            })
        })
        .collect()
}

/// Parse a media playlist into absolute segment URLs
pub fn parse_media_playlist(content: &str, base: &Url) -> MediaPlaylist {
    let mut segments = Vec::new();
    let mut duration = 0.0;
    let mut encrypted = false;

    for line in content.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            duration += rest
                .split(',')
                .next()
                .and_then(|d| d.trim().parse::<f64>().ok())
                .unwrap_or(0.0);
        } else if let Some(rest) = line.strip_prefix("#EXT-X-KEY:") {
            let method = parse_attributes(rest).remove("METHOD").unwrap_or_default();
            if method != "NONE" {
                encrypted = true;
            }
        } else if !line.is_empty() && !line.starts_with('#') {
            segments.push(resolve_url(base, line));
        }
    }

    MediaPlaylist {
        segments,
        duration,
        encrypted,
    }
}

/// Parse `KEY=VALUE,KEY="quoted,value"` attribute lists
pub fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut chars = attr_str.chars().peekable();

    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|&c| c != '=').collect();
        let key = key.trim().trim_start_matches(',').trim().to_string();
        if key.is_empty() {
            break;
        }

        let value: String = if chars.peek() == Some(&'"') {
            chars.next();
            let v = chars.by_ref().take_while(|&c| c != '"').collect();
            // Skip up to and including the separating comma
            for c in chars.by_ref() {
                if c == ',' {
                    break;
                }
            }
            v
        } else {
            chars.by_ref().take_while(|&c| c != ',').collect()
        };

        attrs.insert(key, value.trim().to_string());
    }

    attrs
}

fn resolve_url(base: &Url, reference: &str) -> String {
    base.join(reference)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| reference.to_string())
}

/// Split an RFC 6381 codec list into (video, audio); audio-only lists get `vcodec = "none"`
fn split_codecs(codecs: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(codecs) = codecs else {
        return (None, None);
    };

    let mut vcodec = None;
    let mut acodec = None;
    for codec in codecs.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let family = codec.split('.').next().unwrap_or(codec);
        match family {
            "avc1" | "avc3" | "hvc1" | "hev1" | "vp09" | "vp9" | "av01" => {
                vcodec.get_or_insert_with(|| codec.to_string());
            }
            "mp4a" | "ac-3" | "ec-3" | "opus" | "mp3" | "flac" => {
                acodec.get_or_insert_with(|| codec.to_string());
            }
            _ => {}
        }
    }

    if vcodec.is_none() && acodec.is_some() {
        vcodec = Some("none".to_string());
    }
    (vcodec, acodec)
}
