//! Download engine module

pub mod engine;
pub mod progress;
pub mod selector;

// Re-export for convenience
pub use engine::{DownloadConfig, DownloadEngine};
pub use progress::{format_bytes, format_eta, DownloadProgress, DownloadStatus};
pub use selector::{select_format, sort_formats};
