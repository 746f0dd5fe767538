use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::DateTime;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{
    cache::find_video_in_cache,
    error::{PipelineError, Result},
    types::VideoMetadata,
};

/// Everything fetched for one source URL
#[derive(Debug, Clone)]
pub struct AcquiredSource {
    pub media_file: PathBuf,
    pub metadata: VideoMetadata,
    /// Downloaded subtitle files by language code
    pub subtitle_tracks: HashMap<String, PathBuf>,
}

#[async_trait]
pub trait SourceAcquirer: Send + Sync {
    /// Download media, metadata and subtitle tracks into `work_dir`
    async fn fetch(&self, url: &str, work_dir: &Path) -> Result<AcquiredSource>;
}

const UNAVAILABLE_MARKERS: [&str; 5] = [
    "Video unavailable",
    "Private video",
    "This video is not available",
    "HTTP Error 404",
    "Unsupported URL",
];

/// Source acquisition through the `yt-dlp` executable
pub struct YtDlpSource {
    subtitle_languages: Vec<String>,
}

impl YtDlpSource {
    pub fn new(subtitle_languages: Vec<String>) -> Self {
        Self { subtitle_languages }
    }
}

#[async_trait]
impl SourceAcquirer for YtDlpSource {
    async fn fetch(&self, url: &str, work_dir: &Path) -> Result<AcquiredSource> {
        let output_template = work_dir.join("source.%(ext)s");
        debug!(url, "running yt-dlp");
        let output = Command::new("yt-dlp")
            .arg(url)
            .arg("--dump-json")
            .arg("--no-simulate")
            .arg("--no-progress")
            .arg("-f")
            .arg("bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best")
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("--write-subs")
            .arg("--sub-format")
            .arg("vtt")
            .arg("--sub-langs")
            .arg(self.subtitle_languages.join(","))
            .arg("-o")
            .arg(&output_template)
            .output()
            .await?;

        if !output.status.success() {
            let reason = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(classify_failure(url, reason));
        }

        let stdout_str = String::from_utf8_lossy(output.stdout.as_slice());
        let info = stdout_str
            .lines()
            .rev()
            .find(|line| line.trim_start().starts_with('{'))
            .ok_or_else(|| PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: "yt-dlp printed no metadata".to_string(),
            })?;
        let info: serde_json::Value = serde_json::from_str(info)?;
        let metadata = parse_metadata(&info).ok_or_else(|| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: "metadata has no video id".to_string(),
        })?;

        let media_file = find_video_in_cache(work_dir).ok_or_else(|| {
            PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: "no media file after download".to_string(),
            }
        })?;

        let subtitle_tracks = collect_subtitle_tracks(work_dir, &self.subtitle_languages);
        info!(
            id = %metadata.id,
            title = %metadata.title,
            subtitles = subtitle_tracks.len(),
            "source downloaded"
        );

        Ok(AcquiredSource {
            media_file,
            metadata,
            subtitle_tracks,
        })
    }
}

fn classify_failure(url: &str, reason: String) -> PipelineError {
    if UNAVAILABLE_MARKERS.iter().any(|m| reason.contains(m)) {
        PipelineError::SourceUnavailable {
            url: url.to_string(),
            reason,
        }
    } else {
        PipelineError::DownloadFailed {
            url: url.to_string(),
            reason,
        }
    }
}

/// Map a yt-dlp info document onto [`VideoMetadata`]
pub fn parse_metadata(info: &serde_json::Value) -> Option<VideoMetadata> {
    let text = |key: &str| info[key].as_str().unwrap_or_default().to_string();
    let id = info["id"].as_str().filter(|id| !id.is_empty())?.to_string();

    Some(VideoMetadata {
        id,
        title: text("title"),
        description: text("description"),
        creator: text("uploader"),
        uploaded_at: info["timestamp"]
            .as_i64()
            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        duration: text("duration_string"),
        declared_language: info["language"]
            .as_str()
            .filter(|lang| !lang.trim().is_empty())
            .map(str::to_string),
    })
}

/// Subtitle files written next to the media as `source.<lang>.vtt`
pub fn collect_subtitle_tracks(work_dir: &Path, languages: &[String]) -> HashMap<String, PathBuf> {
    languages
        .iter()
        .map(|lang| (lang.clone(), work_dir.join(format!("source.{}.vtt", lang))))
        .filter(|(_, path)| path.exists())
        .collect()
}

/// Best guess at the source id before metadata is known
pub fn source_id_hint(url: &str) -> String {
    if let Some((_, rest)) = url.rsplit_once("v=") {
        let id = rest.split('&').next().unwrap_or_default();
        if !id.is_empty() {
            return id.to_string();
        }
    }
    if let Some((_, rest)) = url.split_once("youtu.be/") {
        let id = rest.split(['?', '&', '/']).next().unwrap_or_default();
        if !id.is_empty() {
            return id.to_string();
        }
    }
    "unknown".to_string()
}
