use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{
    error::{PipelineError, Result},
    types::ScreenshotRecord,
};

#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Write mono 16 kHz PCM audio of `media_file` to `audio_path`
    async fn extract_audio(&self, media_file: &Path, audio_path: &Path) -> Result<PathBuf>;
}

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Capture one frame every `interval_seconds` into `output_dir`, ordered by time
    async fn capture(
        &self,
        media_file: &Path,
        output_dir: &Path,
        source_id: &str,
        interval_seconds: f64,
    ) -> Result<Vec<ScreenshotRecord>>;
}

pub struct Ffmpeg;

impl Ffmpeg {
    pub fn new() -> Self {
        Self
    }

    async fn probe_duration(media_file: &Path) -> Result<f64> {
        let output = Command::new("ffprobe")
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(media_file)
            .output()
            .await?;

        if !output.status.success() {
            return Err(PipelineError::CaptureFailed {
                media_path: media_file.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let stdout_str = String::from_utf8_lossy(output.stdout.as_slice());
        stdout_str
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| PipelineError::CaptureFailed {
                media_path: media_file.to_path_buf(),
                reason: format!("cannot read duration from {:?}", stdout_str.trim()),
            })
    }

    async fn grab_frame(media_file: &Path, timestamp: f64, output_path: &Path) -> Result<()> {
        let output = Command::new("ffmpeg")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.3}", timestamp))
            .arg("-i")
            .arg(media_file)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("2")
            .arg(output_path)
            .output()
            .await?;

        if !output.status.success() || !output_path.exists() {
            return Err(PipelineError::CaptureFailed {
                media_path: media_file.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioExtractor for Ffmpeg {
    async fn extract_audio(&self, media_file: &Path, audio_path: &Path) -> Result<PathBuf> {
        let output = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(media_file)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg(audio_path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(PipelineError::ExtractionFailed {
                media_path: media_file.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(audio_path.to_path_buf())
    }
}

#[async_trait]
impl FrameExtractor for Ffmpeg {
    async fn capture(
        &self,
        media_file: &Path,
        output_dir: &Path,
        source_id: &str,
        interval_seconds: f64,
    ) -> Result<Vec<ScreenshotRecord>> {
        let duration = Self::probe_duration(media_file).await?;
        let interval = effective_interval(interval_seconds);
        tokio::fs::create_dir_all(output_dir).await?;

        let mut screenshots = Vec::new();
        for timestamp in capture_times(duration, interval) {
            let shot = ScreenshotRecord::new(source_id, timestamp);
            let path = output_dir.join(&shot.filename);
            match Self::grab_frame(media_file, timestamp, &path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "saved screenshot");
                    screenshots.push(shot);
                }
                Err(e) => warn!(timestamp, error = %e, "skipping frame"),
            }
        }

        info!(duration, interval, count = screenshots.len(), "captured screenshots");
        Ok(screenshots)
    }
}

/// Screenshot names keep two decimals, so finer steps would collide
pub const MIN_CAPTURE_INTERVAL: f64 = 0.01;

/// Non-positive intervals fall back to one second; tiny ones are raised to the minimum
pub fn effective_interval(interval_seconds: f64) -> f64 {
    if !interval_seconds.is_finite() || interval_seconds <= 0.0 {
        warn!(interval_seconds, "invalid capture interval, using 1 second");
        return 1.0;
    }
    if interval_seconds < MIN_CAPTURE_INTERVAL {
        warn!(
            interval_seconds,
            min = MIN_CAPTURE_INTERVAL,
            "capture interval below filename resolution, raising it"
        );
        return MIN_CAPTURE_INTERVAL;
    }
    interval_seconds
}

/// Every multiple of `interval` strictly below `duration`
pub fn capture_times(duration: f64, interval: f64) -> Vec<f64> {
    (0u64..)
        .map(|step| step as f64 * interval)
        .take_while(|t| *t < duration)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_times_are_interval_multiples_below_duration() {
        assert_eq!(capture_times(25.0, 10.0), vec![0.0, 10.0, 20.0]);
        assert_eq!(capture_times(20.0, 10.0), vec![0.0, 10.0]);
        assert_eq!(capture_times(0.5, 10.0), vec![0.0]);
        assert!(capture_times(0.0, 10.0).is_empty());
    }

    #[test]
    fn invalid_interval_falls_back_to_one_second() {
        assert_eq!(effective_interval(0.0), 1.0);
        assert_eq!(effective_interval(-3.0), 1.0);
        assert_eq!(effective_interval(f64::NAN), 1.0);
        assert_eq!(effective_interval(2.5), 2.5);
    }

    #[test]
    fn tiny_interval_still_gives_distinct_filenames() {
        let interval = effective_interval(0.001);
        assert_eq!(interval, MIN_CAPTURE_INTERVAL);

        let names: Vec<_> = capture_times(0.1, interval)
            .into_iter()
            .map(|t| ScreenshotRecord::new("abc", t).filename)
            .collect();
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert!(names.len() >= 10);
        assert_eq!(unique.len(), names.len());
    }
}
