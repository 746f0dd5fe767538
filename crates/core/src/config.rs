use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    cache::{get_root_cache_dir, get_root_data_dir, get_runs_dir},
    error::{PipelineError, Result},
    provider::IntelligenceSettings,
};

pub const DEFAULT_SUBTITLE_LANGUAGES: [&str; 5] = ["zh-TW", "zh-Hant", "en", "ko", "ja"];
pub const DEFAULT_TARGET_LANGUAGE: &str = "Traditional Chinese";
pub const DEFAULT_WHISPER_MODEL: &str = "ggml-medium-q5_0.bin";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where kept screenshots are written
    pub screenshots_dir: PathBuf,
    /// Where video records are stored
    pub store_dir: PathBuf,
    /// Parent of the per-run scratch directories
    pub work_root: PathBuf,
    pub cache_dir: PathBuf,

    pub capture_interval_seconds: f64,
    pub hash_size: u32,
    pub similarity_threshold: u32,

    /// Subtitle languages in priority order
    pub subtitle_languages: Vec<String>,
    pub target_language: String,
    pub whisper_model: String,

    pub intelligence: IntelligenceSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let data_dir = get_root_data_dir();
        let cache_dir = get_root_cache_dir();
        Self {
            screenshots_dir: data_dir.join("screenshots"),
            store_dir: data_dir.join("records"),
            work_root: get_runs_dir(&cache_dir),
            cache_dir,
            capture_interval_seconds: 10.0,
            hash_size: 16,
            similarity_threshold: 5,
            subtitle_languages: DEFAULT_SUBTITLE_LANGUAGES
                .iter()
                .map(|lang| lang.to_string())
                .collect(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            whisper_model: DEFAULT_WHISPER_MODEL.to_string(),
            intelligence: IntelligenceSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("slidecast")
            .join("config.toml")
    }
}
