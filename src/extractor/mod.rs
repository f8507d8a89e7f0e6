pub mod client;
pub mod hls;
pub mod html;
pub mod models;
pub mod native;
pub mod parse;
pub mod registry;
pub mod traits;

pub use client::{Fetcher, HttpFetcher, MemoryFetcher};
pub use models::{Format, PlaylistEntry, PlaylistInfo, Protocol, VideoInfo};
pub use native::{CctvExtractor, CctvListExtractor};
pub use registry::{ExtractorRegistry, Resolved};
pub use traits::Extractor;
