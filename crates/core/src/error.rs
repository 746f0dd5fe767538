use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source unavailable for {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Audio extraction failed for {media_path}: {reason}")]
    ExtractionFailed { media_path: PathBuf, reason: String },

    #[error("Transcription failed for {audio_path}: {reason}")]
    TranscriptionFailed { audio_path: PathBuf, reason: String },

    #[error("Translation failed: {reason}")]
    TranslationFailed { reason: String },

    #[error("{capability} failed: {reason}")]
    IntelligenceFailed {
        capability: &'static str,
        reason: String,
    },

    #[error("Screenshot capture failed for {media_path}: {reason}")]
    CaptureFailed { media_path: PathBuf, reason: String },

    #[error("Persistence failed: {reason}")]
    PersistenceFailed { reason: String },

    #[error("Cannot read image {path}: {reason}")]
    ImageReadFailed { path: PathBuf, reason: String },

    #[error("Malformed timestamp: {value:?}")]
    MalformedTimestamp { value: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("Model download failed for {url}: {reason}")]
    ModelDownloadFailed { url: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

impl PipelineError {
    /// Stable name of the variant for structured output
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SourceUnavailable { .. } => "source_unavailable",
            PipelineError::DownloadFailed { .. } => "download_failed",
            PipelineError::ExtractionFailed { .. } => "extraction_failed",
            PipelineError::TranscriptionFailed { .. } => "transcription_failed",
            PipelineError::TranslationFailed { .. } => "translation_failed",
            PipelineError::IntelligenceFailed { .. } => "intelligence_failed",
            PipelineError::CaptureFailed { .. } => "capture_failed",
            PipelineError::PersistenceFailed { .. } => "persistence_failed",
            PipelineError::ImageReadFailed { .. } => "image_read_failed",
            PipelineError::MalformedTimestamp { .. } => "malformed_timestamp",
            PipelineError::InvalidTransition { .. } => "invalid_transition",
            PipelineError::MissingApiKey { .. } => "missing_api_key",
            PipelineError::ModelDownloadFailed { .. } => "model_download_failed",
            PipelineError::Config(_) => "config",
            PipelineError::IoError(_) => "io",
            PipelineError::JsonError(_) => "json",
            PipelineError::ApiError(_) => "api",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
