//! Output path templates and filename sanitization

use crate::extractor::models::{Format, VideoInfo};
use std::path::{Path, PathBuf};

/// Renders `%(field)s` output templates against a resolved video.
///
/// Supported fields: `title`, `id`, `ext`, `uploader`, `upload_date`,
/// `format_id`, `playlist_index`. Unknown fields render as `NA`.
/// Every `/`-separated component is sanitized on its own, so a title can
/// never introduce extra directories.
#[derive(Debug, Clone)]
pub struct OutputTemplate {
    template: String,
}

impl OutputTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(
        &self,
        base_dir: &Path,
        video: &VideoInfo,
        format: &Format,
        playlist_index: Option<usize>,
    ) -> PathBuf {
        let mut path = base_dir.to_path_buf();
        for component in self.template.split(['/', '\\']) {
            if component.is_empty() {
                continue;
            }
            let expanded = expand(component, |field| match field {
                "title" => Some(video.title.clone()),
                "id" => Some(video.id.clone()),
                "ext" => Some(format.ext.clone()),
                "format_id" => Some(format.format_id.clone()),
                "uploader" => video.uploader.clone(),
                "upload_date" => video.upload_date.clone(),
                "playlist_index" => playlist_index.map(|i| format!("{:02}", i)),
                _ => None,
            });
            path.push(sanitize_filename(&expanded));
        }
        path
    }
}

fn expand<F>(component: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(component.len());
    let mut rest = component;

    while let Some(start) = rest.find("%(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find(")s") {
            Some(end) => {
                let field = &after[..end];
                out.push_str(&lookup(field).unwrap_or_else(|| "NA".to_string()));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Sanitize a single path component for cross-platform filesystems
///
/// - Removes path traversal sequences
/// - Replaces invalid characters with `_`
/// - Strips leading dots and trailing dots/spaces
/// - Limits length to 200 bytes on a char boundary
pub fn sanitize_filename(name: &str) -> String {
    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

    let mut sanitized: String = name
        .replace("..", "")
        .chars()
        .map(|c| {
            if invalid_chars.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    sanitized = sanitized.trim().trim_start_matches('.').to_string();
    sanitized = sanitized.trim_end_matches('.').trim_end().to_string();

    while sanitized.contains("__") {
        sanitized = sanitized.replace("__", "_");
    }

    if sanitized.is_empty() {
        return "unnamed_file".to_string();
    }

    if sanitized.len() > 200 {
        let extension = sanitized
            .rfind('.')
            .map(|dot| sanitized[dot..].to_string())
            .filter(|ext| ext.len() < 10)
            .unwrap_or_default();
        let mut cut = 200 - extension.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], extension);
    }

    sanitized
}
