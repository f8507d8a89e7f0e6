//! cctvloader - CCTV / CNTV video downloader
//!
//! Command-line front end: inspect a page, list a playlist, or download
//! through the background worker.

use anyhow::Result;
use cctvloader::backend::{Backend, BackendEvent, DownloadOptions};
use cctvloader::downloader::{format_bytes, format_eta, sort_formats, DownloadProgress};
use cctvloader::extractor::{ExtractorRegistry, HttpFetcher, PlaylistInfo, VideoInfo};
use cctvloader::utils::{AppSettings, CctvError};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cctvloader", version, about = "Download videos from CCTV / CNTV")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show metadata and available formats for a video page
    Info {
        url: String,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the videos on a column or list page
    Playlist {
        url: String,
        #[arg(long)]
        json: bool,
    },
    /// Download a video page, or every video of a list page
    Download(DownloadArgs),
}

#[derive(Args)]
struct DownloadArgs {
    url: String,
    /// Format selector, e.g. `best`, `worst`, `best[height<=720]/best`
    #[arg(short = 'f', long)]
    format: Option<String>,
    /// Output template, e.g. `%(title)s/%(title)s.%(ext)s`
    #[arg(short = 'o', long)]
    output: Option<String>,
    /// Directory the output template is rendered under
    #[arg(short = 'P', long)]
    paths: Option<PathBuf>,
    #[arg(long)]
    write_thumbnail: bool,
    /// Write a .info.json metadata sidecar
    #[arg(long)]
    add_metadata: bool,
    #[arg(long)]
    write_subs: bool,
    #[arg(long)]
    ffmpeg_location: Option<PathBuf>,
}

impl DownloadArgs {
    fn options(&self, settings: &AppSettings) -> DownloadOptions {
        let mut options = DownloadOptions::from(settings);
        if let Some(format) = &self.format {
            options.format = format.clone();
        }
        if let Some(output) = &self.output {
            options.output_template = output.clone();
        }
        if let Some(dir) = &self.paths {
            options.output_dir = dir.clone();
        }
        if self.ffmpeg_location.is_some() {
            options.ffmpeg_location = self.ffmpeg_location.clone();
        }
        options.write_thumbnail |= self.write_thumbnail;
        options.add_metadata |= self.add_metadata;
        options.write_subtitles |= self.write_subs;
        options
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = AppSettings::load();

    match run(cli.command, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if CctvError::is_cancelled(&e) => {
            eprintln!("Cancelled");
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, settings: AppSettings) -> Result<()> {
    match command {
        Command::Info { url, json } => {
            let info = registry(&settings)?.extract_info(&url).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_video(&info);
            }
            Ok(())
        }
        Command::Playlist { url, json } => {
            let playlist = registry(&settings)?.extract_playlist(&url).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&playlist)?);
            } else {
                print_playlist(&playlist);
            }
            Ok(())
        }
        Command::Download(args) => download(&args.url, args.options(&settings), &settings).await,
    }
}

fn registry(settings: &AppSettings) -> Result<ExtractorRegistry> {
    let fetcher = HttpFetcher::new(
        &settings.user_agent,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    Ok(ExtractorRegistry::cctv(Arc::new(fetcher)))
}

async fn download(url: &str, options: DownloadOptions, settings: &AppSettings) -> Result<()> {
    let mut backend = Backend::spawn(settings)?;
    backend.submit(url, options).await?;

    let mut cancel_sent = false;
    let outcome = loop {
        let next = tokio::select! {
            event = backend.next_event() => Some(event),
            _ = tokio::signal::ctrl_c(), if !cancel_sent => None,
        };
        let Some(event) = next else {
            cancel_sent = true;
            backend.cancel().await?;
            continue;
        };

        let Some(event) = event else {
            break Err(anyhow::anyhow!("Backend stopped unexpectedly"));
        };

        match event {
            BackendEvent::JobStarted { url, .. } => println!("Downloading {}", url),
            BackendEvent::Progress { progress, .. } => print_progress(&progress),
            BackendEvent::EntryFinished { path, .. } => {
                eprintln!();
                println!("Saved {}", path.display());
            }
            BackendEvent::Finished { .. } => break Ok(()),
            BackendEvent::Failed { error, .. } => {
                eprintln!();
                break Err(anyhow::anyhow!(error));
            }
            BackendEvent::Cancelled { .. } => {
                eprintln!();
                break Err(CctvError::Cancelled.into());
            }
            BackendEvent::Busy { url } => {
                break Err(anyhow::anyhow!("A download is already running; {} was not started", url));
            }
        }
    };

    backend.shutdown().await?;
    outcome
}

fn print_progress(progress: &DownloadProgress) {
    let total = progress
        .total_bytes
        .map(|t| format_bytes(t as f64))
        .unwrap_or_else(|| "?".to_string());
    let eta = progress
        .eta
        .map(format_eta)
        .unwrap_or_else(|| "--:--".to_string());
    let fragments = if progress.total_fragments > 0 {
        format!(
            " (frag {}/{})",
            progress.fragments_completed, progress.total_fragments
        )
    } else {
        String::new()
    };

    let mut stderr = std::io::stderr();
    let _ = write!(
        stderr,
        "\r[download] {:5.1}% of {} at {}/s ETA {}{}   ",
        progress.percentage() * 100.0,
        total,
        format_bytes(progress.speed),
        eta,
        fragments
    );
    let _ = stderr.flush();
}

fn print_video(info: &VideoInfo) {
    println!("ID:          {}", info.id);
    println!("Title:       {}", info.title);
    if let Some(uploader) = &info.uploader {
        println!("Uploader:    {}", uploader);
    }
    if let Some(date) = &info.upload_date {
        println!("Upload date: {}", date);
    }
    if let Some(duration) = info.duration {
        println!("Duration:    {}", format_eta(Duration::from_secs_f64(duration.max(0.0))));
    }
    if let Some(thumbnail) = &info.thumbnail {
        println!("Thumbnail:   {}", thumbnail);
    }

    println!();
    println!("{:<14} {:<5} {:<10} {:>8}  NOTE", "FORMAT", "EXT", "RESOLUTION", "TBR");
    for format in sort_formats(&info.formats).into_iter().rev() {
        let resolution = format.resolution.clone().unwrap_or_else(|| match format.height {
            Some(h) => format!("{}p", h),
            None if format.is_audio_only() => "audio only".to_string(),
            None => "unknown".to_string(),
        });
        let tbr = format
            .tbr
            .map(|t| format!("{:.0}k", t))
            .unwrap_or_default();
        let note = match (format.preference, &format.format_note) {
            (Some(p), _) if p < 0 => "sample clip".to_string(),
            (_, Some(note)) => note.clone(),
            _ => String::new(),
        };
        println!(
            "{:<14} {:<5} {:<10} {:>8}  {}",
            format.format_id, format.ext, resolution, tbr, note
        );
    }
}

fn print_playlist(playlist: &PlaylistInfo) {
    println!("Playlist: {} ({})", playlist.title.as_deref().unwrap_or("NA"), playlist.id);
    for (i, entry) in playlist.entries.iter().enumerate() {
        let duration = entry
            .duration
            .map(|d| format_eta(Duration::from_secs(d)))
            .unwrap_or_default();
        println!(
            "{:>3}. {} [{}]\n     {}",
            i + 1,
            entry.title,
            duration,
            entry.url
        );
    }
}
