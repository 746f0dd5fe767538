use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{
    cache::get_model_dir,
    error::{PipelineError, Result},
    types::SubtitleSegment,
};

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Ordered segments; an empty list means nothing was recognised
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<SubtitleSegment>>;
}

/// Download the ggml model into the cache on first use
async fn ensure_model(cache_dir: &Path, model_name: &str) -> Result<PathBuf> {
    let download_url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        model_name
    );
    let model_dir = get_model_dir(cache_dir);

    if !model_dir.exists() {
        fs::create_dir_all(&model_dir).await?;
    }

    let model_path = model_dir.join(model_name);
    if !model_path.exists() {
        info!(url = %download_url, "downloading whisper model");
        let output = Command::new("curl")
            .arg("-L")
            .arg("--fail")
            .arg(&download_url)
            .arg("-o")
            .arg(&model_path)
            .output()
            .await?;

        if !output.status.success() {
            let _ = fs::remove_file(&model_path).await;
            return Err(PipelineError::ModelDownloadFailed {
                url: download_url,
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
    }

    Ok(model_path)
}

extern "C" fn whisper_log_callback(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
    // silent
}

/// Stop whisper.cpp from writing its own log lines to stderr
pub fn silence_whisper_logs() {
    unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    }
}

/// Local speech recognition with whisper.cpp.
///
/// The model is fetched into `cache_dir` the first time audio actually needs
/// transcribing, so runs served by a subtitle track never download it.
pub struct WhisperTranscriber {
    cache_dir: PathBuf,
    model_name: String,
    use_gpu: bool,
}

impl WhisperTranscriber {
    pub fn new(cache_dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            model_name: model_name.into(),
            use_gpu: true,
        }
    }

    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<SubtitleSegment>> {
        let model = ensure_model(&self.cache_dir, &self.model_name)
            .await
            .map_err(|e| PipelineError::TranscriptionFailed {
                audio_path: audio_path.to_path_buf(),
                reason: format!("whisper model unavailable: {}", e),
            })?;
        let audio = audio_path.to_path_buf();
        let use_gpu = self.use_gpu;

        tokio::task::spawn_blocking(move || transcribe_blocking(&audio, &model, use_gpu))
            .await
            .map_err(|e| PipelineError::TranscriptionFailed {
                audio_path: audio_path.to_path_buf(),
                reason: e.to_string(),
            })?
    }
}

fn transcribe_blocking(
    audio_path: &Path,
    model_path: &Path,
    use_gpu: bool,
) -> Result<Vec<SubtitleSegment>> {
    let failed = |reason: String| PipelineError::TranscriptionFailed {
        audio_path: audio_path.to_path_buf(),
        reason,
    };

    let mut reader = hound::WavReader::open(audio_path).map_err(|e| failed(e.to_string()))?;
    let samples: Vec<f32> = reader
        .samples::<i16>()
        .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| failed(e.to_string()))?;
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let ctx_params = WhisperContextParameters {
        use_gpu,
        flash_attn: true,
        ..Default::default()
    };
    let model = model_path
        .to_str()
        .ok_or_else(|| failed("model path is not valid UTF-8".to_string()))?;
    let ctx = WhisperContext::new_with_params(model, ctx_params)
        .map_err(|e| failed(format!("failed to load model: {}", e)))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
    params.set_language(Some("auto"));

    let mut state = ctx
        .create_state()
        .map_err(|e| failed(format!("failed to create state: {}", e)))?;
    state
        .full(params, &samples)
        .map_err(|e| failed(format!("failed to run model: {}", e)))?;

    let mut segments = Vec::new();
    for segment in state.as_iter() {
        let seg_text = match segment.to_str() {
            Ok(s) => s,
            Err(_) => continue,
        };
        segments.push(SubtitleSegment {
            start_seconds: segment.start_timestamp() as f64 / 100.0,
            end_seconds: segment.end_timestamp() as f64 / 100.0,
            text: seg_text.trim().to_string(),
        });
    }

    info!(segments = segments.len(), "transcription finished");
    Ok(segments)
}
