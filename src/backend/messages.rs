use crate::downloader::DownloadProgress;
use crate::utils::config::AppSettings;
use std::path::PathBuf;

/// Per-job download options
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    /// Base directory the output template is rendered under
    pub output_dir: PathBuf,
    pub output_template: String,
    pub format: String,
    pub write_subtitles: bool,
    pub write_thumbnail: bool,
    pub add_metadata: bool,
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self::from(&AppSettings::default())
    }
}

impl From<&AppSettings> for DownloadOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            output_dir: settings.download_location.clone(),
            output_template: settings.output_template.clone(),
            format: settings.format.clone(),
            write_subtitles: settings.write_subtitles,
            write_thumbnail: settings.write_thumbnail,
            add_metadata: settings.add_metadata,
            ffmpeg_location: settings.ffmpeg_location.clone(),
        }
    }
}

/// Commands sent from the front end to the backend
#[derive(Debug, Clone)]
pub enum BackendCommand {
    Submit { url: String, options: DownloadOptions },
    /// Cancel the running job, if any
    Cancel,
    Shutdown,
}

/// Events sent from the backend to the front end
#[derive(Debug, Clone)]
pub enum BackendEvent {
    JobStarted {
        job_id: String,
        url: String,
    },
    Progress {
        job_id: String,
        progress: DownloadProgress,
    },
    /// One media file is complete (every entry of a playlist job reports one)
    EntryFinished {
        job_id: String,
        path: PathBuf,
    },
    /// The job is done; `path` is the media file, or the output directory for playlists
    Finished {
        job_id: String,
        path: PathBuf,
    },
    Failed {
        job_id: String,
        error: String,
    },
    Cancelled {
        job_id: String,
    },
    /// A job is already running; the submission was dropped
    Busy {
        url: String,
    },
}

impl BackendEvent {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::JobStarted { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::EntryFinished { job_id, .. }
            | Self::Finished { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Cancelled { job_id } => Some(job_id),
            Self::Busy { .. } => None,
        }
    }

    /// Whether this event ends a job
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}
