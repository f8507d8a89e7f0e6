//! List-page extractor for `tv.cctv.com/YYYY/MM/DD/VIDA…` pages
//!
//! Entries come from the page's `jsonData*` array when it has one; pages
//! without it fall back to scraping video links out of the markup. Entries
//! are URL references only, each resolved later by the single-video path.

use crate::extractor::client::{build_url, Fetcher};
use crate::extractor::html::{absolutize_protocol, MetaTags};
use crate::extractor::models::{PlaylistEntry, PlaylistInfo};
use crate::extractor::parse::str_or_none;
use crate::extractor::traits::Extractor;
use crate::utils::error::CctvError;
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

static VALID_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(?:tv\.cctv\.com|tv\.cntv\.cn)/\d{4}/\d{2}/\d{2}/(?P<id>(?:VIDAL|VIDA)[^/]+)\.shtml",
    )
    .expect("list URL pattern")
});

static JSON_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"var\s+jsonData\w*\s*=\s*(\[[\s\S]*?\]);").expect("jsonData pattern")
});

static FLV_IMG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"flvImgUrl\s*=\s*"([^"]+)""#).expect("flvImgUrl pattern"));

static VIDEO_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href="(https?://(?:tv\.cctv\.com|tv\.cntv\.cn)/[^"]*VIDE\w+\.shtml)""#)
        .expect("video link pattern")
});

/// Playlist id: the leaf token of a list URL, e.g. `VIDALOmjxOZe51NjntPvOI00161228`
pub fn playlist_id(url: &str) -> Option<String> {
    if let Some(caps) = VALID_URL.captures(url) {
        return caps.name("id").map(|m| m.as_str().to_string());
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(|leaf| leaf.split('.').next().unwrap_or(leaf).to_string())
}

/// Clock string (`H:MM:SS` or `M:SS`) to seconds.
///
/// Anything else, including values too large for `u64`, is `None`.
pub fn parse_duration(raw: &str) -> Option<u64> {
    let parts = raw
        .trim()
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    match parts.as_slice() {
        [h, m, s] => h
            .checked_mul(3600)?
            .checked_add(m.checked_mul(60)?)?
            .checked_add(*s),
        [m, s] => m.checked_mul(60)?.checked_add(*s),
        _ => None,
    }
}

/// Page-level title, description and thumbnail
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

impl PageMetadata {
    pub fn parse(html: &str) -> Self {
        let meta = MetaTags::parse(html);

        let thumbnail = FLV_IMG
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .or_else(|| meta.get("og:image"))
            .map(absolutize_protocol);

        Self {
            title: meta.title().map(str::to_string),
            description: meta.description().map(str::to_string),
            thumbnail,
        }
    }
}

/// Entries from the embedded `jsonData*` array; empty when absent or malformed
pub fn entries_from_json_data(html: &str, default_thumbnail: Option<&str>) -> Vec<PlaylistEntry> {
    let Some(raw) = JSON_DATA.captures(html).and_then(|c| c.get(1)) else {
        return Vec::new();
    };

    let items: Vec<Value> = match serde_json::from_str(raw.as_str()) {
        Ok(items) => items,
        Err(e) => {
            warn!("Ignoring malformed jsonData block: {}", e);
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| json_entry(item, default_thumbnail))
        .collect()
}

fn json_entry(item: &Value, default_thumbnail: Option<&str>) -> Option<PlaylistEntry> {
    let url = item.get("url").and_then(str_or_none).and_then(playable_url);
    let Some(url) = url else {
        debug!("Skipping jsonData entry without usable url");
        return None;
    };

    let title = item
        .get("title")
        .and_then(str_or_none)
        .or_else(|| item.get("brief").and_then(str_or_none));
    let Some(title) = title else {
        debug!("Skipping jsonData entry without title: {}", url);
        return None;
    };

    let thumbnail = item
        .get("img")
        .and_then(str_or_none)
        .map(absolutize_protocol)
        .or_else(|| default_thumbnail.map(str::to_string));

    Some(PlaylistEntry {
        url,
        title: title.to_string(),
        thumbnail,
        duration: item
            .get("length")
            .and_then(Value::as_str)
            .and_then(parse_duration),
    })
}

fn playable_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("//") {
        Some(absolutize_protocol(raw))
    } else {
        None
    }
}

/// Entries scraped from video links in the raw markup, first occurrence wins
pub fn entries_from_links(html: &str, default_thumbnail: Option<&str>) -> Vec<PlaylistEntry> {
    let mut seen = HashSet::new();

    VIDEO_LINK
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|url| seen.insert(*url))
        .map(|url| PlaylistEntry {
            url: url.to_string(),
            title: link_title(html, url).unwrap_or_else(|| url.to_string()),
            thumbnail: default_thumbnail.map(str::to_string),
            duration: None,
        })
        .collect()
}

/// Title of the anchor pointing at `url`: its `title` attribute, else its text
fn link_title(html: &str, url: &str) -> Option<String> {
    let href = regex::escape(url);

    let by_attribute = Regex::new(&format!(r#"<a[^>]*href="{}"[^>]*title="([^"]+)""#, href)).ok()?;
    if let Some(m) = by_attribute.captures(html).and_then(|c| c.get(1)) {
        return Some(m.as_str().to_string());
    }

    let by_text = Regex::new(&format!(r#"<a[^>]*href="{}"[^>]*>([^<]+)</a>"#, href)).ok()?;
    by_text
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Discover the entries of a list page.
///
/// The `jsonData*` array is authoritative; link scraping runs only when it
/// yields nothing.
pub fn discover_playlist(html: &str, page_url: &str) -> Result<PlaylistInfo, CctvError> {
    let page = PageMetadata::parse(html);
    let thumbnail = page.thumbnail.as_deref();

    let mut entries = entries_from_json_data(html, thumbnail);
    if entries.is_empty() {
        debug!("No jsonData entries on {}, scraping links", page_url);
        entries = entries_from_links(html, thumbnail);
    }

    if entries.is_empty() {
        return Err(CctvError::EmptyPlaylist);
    }

    Ok(PlaylistInfo {
        id: playlist_id(page_url).unwrap_or_default(),
        title: page.title,
        description: page.description,
        thumbnail: page.thumbnail,
        entries,
    })
}

pub struct CctvListExtractor {
    fetcher: Arc<dyn Fetcher>,
}

impl CctvListExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Extractor for CctvListExtractor {
    fn id(&self) -> &'static str {
        "cctv:list"
    }

    fn supports(&self, url: &str) -> bool {
        VALID_URL.is_match(url)
    }

    fn is_playlist(&self) -> bool {
        true
    }

    async fn extract_playlist(&self, url: &str) -> Result<PlaylistInfo> {
        info!("Downloading playlist page: {}", url);

        let page_url = build_url(url, &[])?;
        let webpage = self.fetcher.fetch_text(&page_url).await?;
        let playlist = discover_playlist(&webpage, url)?;

        info!(
            "Playlist {} has {} entries",
            playlist.id,
            playlist.entries.len()
        );
        Ok(playlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LIST_URL: &str = "https://tv.cctv.com/2016/12/28/VIDALOmjxOZe51NjntPvOI00161228.shtml";

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("00:28:50"), Some(1730));
        assert_eq!(parse_duration("5:09"), Some(309));
        assert_eq!(parse_duration(" 1:00:00 "), Some(3600));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("45"), None);
        assert_eq!(parse_duration("aa:bb"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
    }

    #[test]
    fn test_parse_duration_overflow_is_none() {
        assert_eq!(parse_duration("9999999999999999:00:00"), None);
        assert_eq!(parse_duration("0:18446744073709551615:00"), None);
        assert_eq!(parse_duration("0:00:18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_duration("1:18446744073709551615"), None);
        assert_eq!(parse_duration("99999999999999999999:00"), None);
    }

    #[test]
    fn test_oversized_length_leaves_entry_without_duration() {
        let html = r#"<script>var jsonData1 = [
            {"url": "http://tv.cctv.com/2016/12/28/VIDE1.shtml", "title": "第1集", "length": "9999999999999999:00:00"}
        ];</script>"#;

        let playlist = discover_playlist(html, LIST_URL).unwrap();
        assert_eq!(playlist.entries.len(), 1);
        assert_eq!(playlist.entries[0].duration, None);
    }

    proptest! {
        #[test]
        fn prop_clock_strings_roundtrip(h in 0u64..100, m in 0u64..60, s in 0u64..60) {
            let raw = format!("{:02}:{:02}:{:02}", h, m, s);
            prop_assert_eq!(parse_duration(&raw), Some(h * 3600 + m * 60 + s));
        }

        #[test]
        fn prop_never_panics(raw in "\\PC*") {
            let _ = parse_duration(&raw);
        }

        #[test]
        fn prop_large_parts_never_panic(h in any::<u64>(), m in any::<u64>(), s in any::<u64>()) {
            let expected = h
                .checked_mul(3600)
                .and_then(|v| v.checked_add(m.checked_mul(60)?))
                .and_then(|v| v.checked_add(s));
            prop_assert_eq!(parse_duration(&format!("{}:{}:{}", h, m, s)), expected);

            let short = m.checked_mul(60).and_then(|v| v.checked_add(s));
            prop_assert_eq!(parse_duration(&format!("{}:{}", m, s)), short);
        }
    }

    #[test]
    fn test_playlist_id() {
        assert_eq!(
            playlist_id(LIST_URL).as_deref(),
            Some("VIDALOmjxOZe51NjntPvOI00161228")
        );
        assert_eq!(
            playlist_id("https://tv.cntv.cn/2020/05/18/VIDA3AlxjIBhKl2DxKrrz4HQ200518.shtml").as_deref(),
            Some("VIDA3AlxjIBhKl2DxKrrz4HQ200518")
        );
        assert_eq!(
            playlist_id("https://example.com/lists/abc.html?x=1").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_json_data_entries() {
        let html = r#"<script>
            var jsonData1 = [
                {"url": "https://tv.cctv.com/2016/12/28/VIDEa1.shtml", "title": "第1集", "img": "//p1.img.cctvpic.com/1.jpg", "length": "00:28:50"},
                {"url": "https://tv.cctv.com/2016/12/28/VIDEa2.shtml", "brief": "第2集简介", "length": "bad"},
                {"url": "", "title": "no url"},
                {"url": "https://tv.cctv.com/2016/12/28/VIDEa3.shtml"},
                {"url": "javascript:void(0)", "title": "not a link"}
            ];
        </script>"#;

        let entries = entries_from_json_data(html, Some("https://p1.img.cctvpic.com/default.jpg"));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "第1集");
        assert_eq!(entries[0].thumbnail.as_deref(), Some("https://p1.img.cctvpic.com/1.jpg"));
        assert_eq!(entries[0].duration, Some(1730));
        assert_eq!(entries[1].title, "第2集简介");
        assert_eq!(
            entries[1].thumbnail.as_deref(),
            Some("https://p1.img.cctvpic.com/default.jpg")
        );
        assert_eq!(entries[1].duration, None);
    }

    #[test]
    fn test_json_data_variable_suffixes() {
        for name in ["jsonData", "jsonData2", "jsonData_list"] {
            let html = format!(
                r#"var {} = [{{"url": "https://tv.cctv.com/2016/12/28/VIDEa1.shtml", "title": "A"}}];"#,
                name
            );
            assert_eq!(entries_from_json_data(&html, None).len(), 1, "{}", name);
        }
    }

    #[test]
    fn test_malformed_json_data_is_empty() {
        let html = "var jsonData2 = [{\"url\": oops}];";
        assert!(entries_from_json_data(html, None).is_empty());
    }

    #[test]
    fn test_link_entries_dedupe_and_titles() {
        let html = r#"
            <a href="https://tv.cctv.com/2020/05/18/VIDEb1.shtml" title="Episode One"><img src="x"></a>
            <a href="https://tv.cctv.com/2020/05/18/VIDEb2.shtml">  Episode Two  </a>
            <a href="https://tv.cctv.com/2020/05/18/VIDEb1.shtml">duplicate</a>
            <a href="https://tv.cntv.cn/2020/05/18/VIDEb3.shtml"><span>nested</span></a>
            <a href="https://news.cctv.com/2020/05/18/ARTIxyz.shtml">article</a>
        "#;

        let entries = entries_from_links(html, Some("https://img/default.jpg"));
        let urls: Vec<_> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://tv.cctv.com/2020/05/18/VIDEb1.shtml",
                "https://tv.cctv.com/2020/05/18/VIDEb2.shtml",
                "https://tv.cntv.cn/2020/05/18/VIDEb3.shtml",
            ]
        );
        assert_eq!(entries[0].title, "Episode One");
        assert_eq!(entries[1].title, "Episode Two");
        assert_eq!(entries[2].title, "https://tv.cntv.cn/2020/05/18/VIDEb3.shtml");
        assert!(entries
            .iter()
            .all(|e| e.thumbnail.as_deref() == Some("https://img/default.jpg")));
    }

    #[test]
    fn test_json_data_wins_over_links() {
        let html = r#"
            <meta name="title" content="舌尖上的中国">
            <meta name="description" content="纪录片">
            <script>var flvImgUrl = "//p2.img.cctvpic.com/cover.jpg";</script>
            <script>var jsonData1 = [{"url": "https://tv.cctv.com/2016/12/28/VIDEa1.shtml", "title": "A"}];</script>
            <a href="https://tv.cctv.com/2016/12/28/VIDEzz.shtml">Z</a>
        "#;

        let playlist = discover_playlist(html, LIST_URL).unwrap();

        assert_eq!(playlist.id, "VIDALOmjxOZe51NjntPvOI00161228");
        assert_eq!(playlist.title.as_deref(), Some("舌尖上的中国"));
        assert_eq!(playlist.description.as_deref(), Some("纪录片"));
        assert_eq!(
            playlist.thumbnail.as_deref(),
            Some("https://p2.img.cctvpic.com/cover.jpg")
        );
        assert_eq!(playlist.entries.len(), 1);
        assert_eq!(playlist.entries[0].title, "A");
        assert_eq!(
            playlist.entries[0].thumbnail.as_deref(),
            Some("https://p2.img.cctvpic.com/cover.jpg")
        );
    }

    #[test]
    fn test_falls_back_to_links() {
        let html = r#"
            <meta property="og:title" content="OG list">
            <meta content="https://img/og.jpg" property="og:image">
            <a href="https://tv.cctv.com/2016/12/28/VIDEzz.shtml">Z</a>
        "#;

        let playlist = discover_playlist(html, LIST_URL).unwrap();
        assert_eq!(playlist.title.as_deref(), Some("OG list"));
        assert_eq!(playlist.thumbnail.as_deref(), Some("https://img/og.jpg"));
        assert_eq!(playlist.entries.len(), 1);
        assert_eq!(playlist.entries[0].title, "Z");
    }

    #[test]
    fn test_empty_page_is_error() {
        let err = discover_playlist("<html></html>", LIST_URL).unwrap_err();
        assert!(matches!(err, CctvError::EmptyPlaylist));
    }

    #[test]
    fn test_supports_only_list_pages() {
        let extractor = CctvListExtractor::new(Arc::new(crate::extractor::client::MemoryFetcher::new()));
        assert!(extractor.supports(LIST_URL));
        assert!(extractor.supports("https://tv.cntv.cn/2020/05/18/VIDA3AlxjIBhKl2DxKrrz4HQ200518.shtml"));
        assert!(!extractor.supports("http://tv.cctv.com/2016/02/05/VIDEUS7apq3lKrHG9Dncm03B160205.shtml"));
        assert!(!extractor.supports("https://news.cctv.com/2016/12/28/VIDALabc.shtml"));
    }
}
