use crate::extractor::client::Fetcher;
use crate::extractor::models::{PlaylistInfo, VideoInfo};
use crate::extractor::native::{CctvExtractor, CctvListExtractor};
use crate::extractor::traits::Extractor;
use crate::utils::error::CctvError;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// What a URL resolved to
#[derive(Debug, Clone)]
pub enum Resolved {
    Video(VideoInfo),
    Playlist(PlaylistInfo),
}

/// The extractor registry
///
/// Holds the available extractors in priority order and routes each URL
/// to the first one whose `supports(url)` accepts it.
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new(extractors: Vec<Arc<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// List pages first, then single videos
    pub fn cctv(fetcher: Arc<dyn Fetcher>) -> Self {
        let list: Arc<dyn Extractor> = Arc::new(CctvListExtractor::new(fetcher.clone()));
        let video: Arc<dyn Extractor> = Arc::new(CctvExtractor::new(fetcher));
        Self::new(vec![list, video])
    }

    /// Find the extractor for a given URL
    pub fn find(&self, url: &str) -> Option<&Arc<dyn Extractor>> {
        let found = self.extractors.iter().find(|e| e.supports(url));
        match found {
            Some(extractor) => debug!("Routing {} to extractor: {}", url, extractor.id()),
            None => debug!("No extractor for {}", url),
        }
        found
    }

    fn require(&self, url: &str) -> Result<&Arc<dyn Extractor>> {
        self.find(url)
            .ok_or_else(|| CctvError::UnsupportedUrl(url.to_string()).into())
    }

    pub async fn extract_info(&self, url: &str) -> Result<VideoInfo> {
        self.require(url)?.extract_info(url).await
    }

    pub async fn extract_playlist(&self, url: &str) -> Result<PlaylistInfo> {
        self.require(url)?.extract_playlist(url).await
    }

    /// Extract whichever kind of page `url` is
    pub async fn resolve(&self, url: &str) -> Result<Resolved> {
        let extractor = self.require(url)?;
        if extractor.is_playlist() {
            Ok(Resolved::Playlist(extractor.extract_playlist(url).await?))
        } else {
            Ok(Resolved::Video(extractor.extract_info(url).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::client::MemoryFetcher;

    fn registry() -> ExtractorRegistry {
        ExtractorRegistry::cctv(Arc::new(MemoryFetcher::new()))
    }

    #[test]
    fn test_routes_list_and_video_pages() {
        let registry = registry();
        let list = registry
            .find("https://tv.cctv.com/2016/12/28/VIDALOmjxOZe51NjntPvOI00161228.shtml")
            .unwrap();
        assert_eq!(list.id(), "cctv:list");

        let video = registry
            .find("http://tv.cctv.com/2016/09/07/VIDE5C1FnlX5bUywlrjhxXOV160907.shtml")
            .unwrap();
        assert_eq!(video.id(), "cctv");
    }

    #[test]
    fn test_exactly_one_extractor_claims_each_page() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(MemoryFetcher::new());
        let list = CctvListExtractor::new(fetcher.clone());
        let video = CctvExtractor::new(fetcher);

        for url in [
            "https://tv.cctv.com/2016/12/28/VIDALOmjxOZe51NjntPvOI00161228.shtml",
            "https://tv.cntv.cn/2020/05/18/VIDA3AlxjIBhKl2DxKrrz4HQ200518.shtml",
            "http://tv.cctv.com/2016/02/05/VIDEUS7apq3lKrHG9Dncm03B160205.shtml",
            "http://ent.cntv.cn/2016/01/18/ARTIjprSSJH8DryTVr5Bx8Wb160118.shtml",
            "http://www.ncpa-classic.com/clt/more/416/index.shtml",
        ] {
            assert!(list.supports(url) ^ video.supports(url), "{}", url);
        }
    }

    #[tokio::test]
    async fn test_formats_through_registry() {
        let page = "http://tv.cctv.com/2016/02/05/VIDEUS7apq3lKrHG9Dncm03B160205.shtml";
        let fetcher = MemoryFetcher::new()
            .with(page, r#"<script>var guid = "efc5d49e5b3b4ab2b445f1a7a1d0e4f6";</script>"#)
            .with(
                crate::extractor::native::cctv::API_URL,
                r#"{"title": "t", "video": {"chapters": [{"url": "http://v.cntv.cn/std.mp4"}]}}"#,
            );
        let registry = ExtractorRegistry::cctv(Arc::new(fetcher));

        let formats = registry.find(page).unwrap().get_formats(page).await.unwrap();
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].url, "http://v.cntv.cn/std.mp4");
    }

    #[tokio::test]
    async fn test_unsupported_url() {
        let err = registry()
            .extract_info("https://example.com/watch")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CctvError>(),
            Some(CctvError::UnsupportedUrl(_))
        ));
    }
}
