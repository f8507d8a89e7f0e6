use super::messages::{BackendCommand, BackendEvent, DownloadOptions};
use crate::downloader::{select_format, DownloadConfig, DownloadEngine};
use crate::extractor::{
    ExtractorRegistry, Format, HttpFetcher, PlaylistInfo, Resolved, VideoInfo,
};
use crate::utils::config::AppSettings;
use crate::utils::error::CctvError;
use crate::utils::metadata::{write_sidecar, VideoMetadata};
use crate::utils::organizer::OutputTemplate;
use crate::utils::platform::{check_write_permission, ffmpeg};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 100;

/// Front-end side of a running [`Backend`]
pub struct BackendHandle {
    commands: mpsc::Sender<BackendCommand>,
    events: mpsc::Receiver<BackendEvent>,
    task: JoinHandle<()>,
}

impl BackendHandle {
    pub async fn submit(&self, url: impl Into<String>, options: DownloadOptions) -> Result<()> {
        self.send(BackendCommand::Submit {
            url: url.into(),
            options,
        })
        .await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.send(BackendCommand::Cancel).await
    }

    /// Next event; `None` once the backend has stopped
    pub async fn next_event(&mut self) -> Option<BackendEvent> {
        self.events.recv().await
    }

    /// Cancel any running job and wait for the backend to stop
    pub async fn shutdown(self) -> Result<()> {
        let BackendHandle {
            commands,
            events,
            task,
        } = self;
        // Unread events must not hold up the actor while it winds down
        drop(events);
        let _ = commands.send(BackendCommand::Shutdown).await;
        task.await?;
        Ok(())
    }

    async fn send(&self, command: BackendCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Backend has stopped"))
    }
}

struct RunningJob {
    id: String,
    cancel: Arc<AtomicBool>,
    // Set before the terminal event is sent
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl RunningJob {
    fn is_running(&self) -> bool {
        !self.done.load(Ordering::SeqCst) && !self.handle.is_finished()
    }
}

/// Download worker: receives commands and runs at most one job at a time
pub struct Backend {
    receiver: mpsc::Receiver<BackendCommand>,
    sender: mpsc::Sender<BackendEvent>,

    // Components
    registry: Arc<ExtractorRegistry>,
    engine: Arc<DownloadEngine>,

    current: Option<RunningJob>,
}

impl Backend {
    /// Start a backend wired to the live CCTV site
    pub fn spawn(settings: &AppSettings) -> Result<BackendHandle> {
        let fetcher = Arc::new(HttpFetcher::new(
            &settings.user_agent,
            Duration::from_secs(settings.request_timeout_secs),
        )?);
        let registry = Arc::new(ExtractorRegistry::cctv(fetcher));
        let engine = Arc::new(DownloadEngine::new(DownloadConfig::from(settings))?);
        Ok(Self::spawn_with(registry, engine))
    }

    /// Start a backend with caller-supplied extractors and engine
    pub fn spawn_with(registry: Arc<ExtractorRegistry>, engine: Arc<DownloadEngine>) -> BackendHandle {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let backend = Self {
            receiver: command_rx,
            sender: event_tx,
            registry,
            engine,
            current: None,
        };
        let task = tokio::spawn(backend.run());

        BackendHandle {
            commands: command_tx,
            events: event_rx,
            task,
        }
    }

    async fn run(mut self) {
        info!("Backend started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                BackendCommand::Submit { url, options } => {
                    self.handle_submit(url, options).await;
                }
                BackendCommand::Cancel => self.handle_cancel(),
                BackendCommand::Shutdown => {
                    info!("Backend shutting down");
                    break;
                }
            }
        }

        if let Some(job) = self.current.take() {
            job.cancel.store(true, Ordering::SeqCst);
            if let Err(e) = job.handle.await {
                error!("Job {} panicked: {}", job.id, e);
            }
        }
    }

    fn is_busy(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(RunningJob::is_running)
    }

    async fn handle_submit(&mut self, url: String, options: DownloadOptions) {
        if self.is_busy() {
            info!("Rejecting {}: a download is already running", url);
            let _ = self.sender.send(BackendEvent::Busy { url }).await;
            return;
        }

        let job_id = Uuid::new_v4().to_string();
        let cancel = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let job = Job {
            id: job_id.clone(),
            url,
            options,
            registry: self.registry.clone(),
            engine: self.engine.clone(),
            events: self.sender.clone(),
            cancel: cancel.clone(),
            done: done.clone(),
        };

        // Started is sent before the job runs so it always precedes the job's own events
        let _ = self
            .sender
            .send(BackendEvent::JobStarted {
                job_id: job_id.clone(),
                url: job.url.clone(),
            })
            .await;

        let handle = tokio::spawn(job.run());
        self.current = Some(RunningJob {
            id: job_id,
            cancel,
            done,
            handle,
        });
    }

    fn handle_cancel(&self) {
        match &self.current {
            Some(job) if job.is_running() => {
                info!("Cancelling job {}", job.id);
                job.cancel.store(true, Ordering::SeqCst);
            }
            _ => info!("Cancel requested with no running job"),
        }
    }
}

/// One submitted URL, run on its own task
struct Job {
    id: String,
    url: String,
    options: DownloadOptions,
    registry: Arc<ExtractorRegistry>,
    engine: Arc<DownloadEngine>,
    events: mpsc::Sender<BackendEvent>,
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

impl Job {
    async fn run(self) {
        info!("Job {} started for {}", self.id, self.url);

        let event = match self.execute().await {
            Ok(path) => {
                info!("Job {} finished: {:?}", self.id, path);
                BackendEvent::Finished {
                    job_id: self.id.clone(),
                    path,
                }
            }
            Err(e) if CctvError::is_cancelled(&e) => {
                info!("Job {} cancelled", self.id);
                BackendEvent::Cancelled {
                    job_id: self.id.clone(),
                }
            }
            Err(e) => {
                error!("Job {} failed: {:#}", self.id, e);
                BackendEvent::Failed {
                    job_id: self.id.clone(),
                    error: format!("{:#}", e),
                }
            }
        };

        // A submit reacting to this event must find the backend idle
        self.done.store(true, Ordering::SeqCst);
        let _ = self.events.send(event).await;
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(CctvError::Cancelled.into());
        }
        Ok(())
    }

    async fn execute(&self) -> Result<PathBuf> {
        self.prepare_output_dir().await?;
        self.check_ffmpeg().await;
        self.check_cancelled()?;

        let resolved = self.registry.resolve(&self.url).await?;
        self.check_cancelled()?;

        match resolved {
            Resolved::Video(video) => self.download_video(&video, None).await,
            Resolved::Playlist(playlist) => self.download_playlist(playlist).await,
        }
    }

    async fn prepare_output_dir(&self) -> Result<()> {
        let dir = self.options.output_dir.clone();
        tokio::fs::create_dir_all(&dir).await?;

        let writable = tokio::task::spawn_blocking(move || check_write_permission(&dir)).await?;
        if !writable {
            return Err(CctvError::Download(format!(
                "no write permission for {:?}",
                self.options.output_dir
            ))
            .into());
        }
        Ok(())
    }

    async fn check_ffmpeg(&self) {
        let location = self.options.ffmpeg_location.clone();
        let found = tokio::task::spawn_blocking(move || ffmpeg(location.as_deref()).is_some())
            .await
            .unwrap_or(false);
        if !found {
            warn!("FFmpeg not found; formats are downloaded as single files without post-processing");
        }
    }

    async fn download_playlist(&self, playlist: PlaylistInfo) -> Result<PathBuf> {
        if playlist.entries.is_empty() {
            return Err(CctvError::EmptyPlaylist.into());
        }

        let total = playlist.entries.len();
        info!("Playlist {} has {} entries", playlist.id, total);

        let mut completed = 0;
        for (i, entry) in playlist.entries.iter().enumerate() {
            self.check_cancelled()?;
            info!("Downloading entry {}/{}: {}", i + 1, total, entry.url);

            let result = match self.registry.extract_info(&entry.url).await {
                Ok(video) => self.download_video(&video, Some(i + 1)).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => completed += 1,
                Err(e) if CctvError::is_cancelled(&e) => return Err(e),
                Err(e) => warn!("Skipping playlist entry {}: {:#}", entry.url, e),
            }
        }

        if completed == 0 {
            return Err(CctvError::Download(format!(
                "none of the {} playlist entries could be downloaded",
                total
            ))
            .into());
        }

        info!("Downloaded {}/{} playlist entries", completed, total);
        Ok(self.options.output_dir.clone())
    }

    async fn download_video(&self, video: &VideoInfo, playlist_index: Option<usize>) -> Result<PathBuf> {
        if video.formats.is_empty() {
            return Err(CctvError::NoFormats.into());
        }
        let format = select_format(&video.formats, &self.options.format)
            .ok_or_else(|| CctvError::FormatUnavailable(self.options.format.clone()))?;

        let path = OutputTemplate::new(self.options.output_template.as_str()).render(
            &self.options.output_dir,
            video,
            format,
            playlist_index,
        );

        let cancel = self.cancel.clone();
        let events = self.events.clone();
        let job_id = self.id.clone();
        let size = self
            .engine
            .download(format, &path, move |progress| {
                if cancel.load(Ordering::SeqCst) {
                    return Err(CctvError::Cancelled.into());
                }
                // Best-effort: a slow consumer only loses intermediate updates
                let _ = events.try_send(BackendEvent::Progress {
                    job_id: job_id.clone(),
                    progress: progress.clone(),
                });
                Ok(())
            })
            .await?;

        self.write_extras(video, format, &path, size).await;

        let _ = self
            .events
            .send(BackendEvent::EntryFinished {
                job_id: self.id.clone(),
                path: path.clone(),
            })
            .await;
        Ok(path)
    }

    /// Thumbnail, metadata sidecar and subtitle notice; failures only warn
    async fn write_extras(
        &self,
        video: &VideoInfo,
        format: &Format,
        path: &Path,
        size: u64,
    ) {
        if self.options.write_thumbnail {
            match &video.thumbnail {
                Some(url) => {
                    if let Err(e) = self.engine.download_thumbnail(url, path).await {
                        warn!("Failed to write thumbnail for {}: {:#}", video.id, e);
                    }
                }
                None => info!("No thumbnail available for {}", video.id),
            }
        }

        if self.options.add_metadata {
            let metadata = VideoMetadata::new(video, format, size);
            if let Err(e) = write_sidecar(path, &metadata).await {
                warn!("Failed to write metadata for {}: {:#}", video.id, e);
            }
        }

        if self.options.write_subtitles {
            info!("{} provides no subtitles; nothing to write", video.id);
        }
    }
}
