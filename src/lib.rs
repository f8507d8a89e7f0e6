//! cctvloader library
//!
//! Extracts video metadata and downloadable formats from CCTV / CNTV pages
//! and downloads them natively (progressive MP4 or HLS).

pub mod backend;
pub mod downloader;
pub mod extractor;
pub mod utils;

// Re-export main types for easier use
pub use backend::{Backend, BackendCommand, BackendEvent, BackendHandle, DownloadOptions};
pub use downloader::{select_format, DownloadConfig, DownloadEngine, DownloadProgress, DownloadStatus};
pub use extractor::{
    CctvExtractor, CctvListExtractor, Extractor, ExtractorRegistry, Format, PlaylistInfo, Resolved,
    VideoInfo,
};
pub use utils::{AppSettings, CctvError};
