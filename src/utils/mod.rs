//! Utility modules for error handling, configuration and file layout

pub mod config;
pub mod error;
pub mod metadata;
pub mod organizer;
pub mod platform;

// Re-export for convenience
pub use config::AppSettings;
pub use error::CctvError;
pub use metadata::{write_sidecar, VideoMetadata};
pub use organizer::{sanitize_filename, OutputTemplate};
pub use platform::{check_write_permission, default_download_dir, ffmpeg, FfmpegInfo};
