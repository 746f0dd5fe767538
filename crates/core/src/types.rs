use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One captured frame. The filename encodes the source id and capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    pub filename: String,
    pub timestamp_seconds: f64,
}

impl ScreenshotRecord {
    pub fn new(source_id: &str, timestamp_seconds: f64) -> Self {
        Self {
            filename: format!("{}_{:.2}.jpg", source_id, timestamp_seconds),
            timestamp_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// A screenshot with the text segments that start inside its window.
/// Built on demand for display and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedFrame {
    pub screenshot: ScreenshotRecord,
    pub original_segments: Vec<SubtitleSegment>,
    pub translated_segments: Vec<SubtitleSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub creator: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub duration: String,
    pub declared_language: Option<String>,
}

/// The persisted unit, keyed by `source_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub source_id: String,
    pub title: String,
    pub description: String,
    pub creator: String,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub duration: String,
    pub language: String,

    pub processed_at: DateTime<Utc>,
    pub subtitle_used: bool,

    pub screenshots: Vec<ScreenshotRecord>,
    /// Original-language track in WEBVTT form
    pub transcription: String,
    /// Translated track in WEBVTT form
    pub translation: String,
    pub summary: String,
}
