use std::{fmt, path::Path, sync::Arc};

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    cache::{RunDir, remove_file_if_exists},
    config::PipelineConfig,
    dedupe::{PerceptualHasher, dedupe},
    error::{PipelineError, Result},
    intelligence::Intelligence,
    media::{AudioExtractor, FrameExtractor},
    resolver::{LanguagePolicy, Resolver, StateMachine},
    source::{SourceAcquirer, source_id_hint},
    store::{RecordStore, validate_source_id},
    transcribe::Transcriber,
    types::VideoRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Acquire,
    Resolve,
    Capture,
    Dedupe,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Acquire => "acquire",
            Stage::Resolve => "resolve",
            Stage::Capture => "capture",
            Stage::Dedupe => "dedupe",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Structured result of a failed run
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{stage} stage failed for {source_id}: {message}")]
pub struct PipelineFailure {
    /// Best-known source id at the time of failure
    pub source_id: String,
    pub stage: Stage,
    pub kind: &'static str,
    pub message: String,
}

/// External capabilities the pipeline drives
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn SourceAcquirer>,
    pub audio: Arc<dyn AudioExtractor>,
    pub frames: Arc<dyn FrameExtractor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub intelligence: Arc<dyn Intelligence>,
    pub hasher: Arc<dyn PerceptualHasher>,
    pub store: Arc<dyn RecordStore>,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, (Stage, PipelineError)>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, (Stage, PipelineError)> {
        self.map_err(|e| (stage, e))
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    collaborators: Collaborators,
    resolver: Resolver,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let resolver = Resolver::new(
            collaborators.intelligence.clone(),
            collaborators.audio.clone(),
            collaborators.transcriber.clone(),
            LanguagePolicy {
                subtitle_languages: config.subtitle_languages.clone(),
                target_language: config.target_language.clone(),
            },
        );
        Self {
            config,
            collaborators,
            resolver,
        }
    }

    /// Ingest one video and persist its record.
    ///
    /// Screenshots are written to `output_dir`. Every temporary artifact lives in a
    /// per-run directory that is removed on every exit path.
    pub async fn run(
        &self,
        url: &str,
        output_dir: &Path,
        capture_interval_seconds: f64,
    ) -> std::result::Result<VideoRecord, PipelineFailure> {
        let mut source_id = source_id_hint(url);
        let run_dir = RunDir::create(&self.config.work_root)
            .map_err(|e| failure(&source_id, Stage::Acquire, e))?;
        info!(run_id = %run_dir.run_id(), url, "pipeline started");

        let mut machine = StateMachine::new();
        let outcome = self
            .execute(
                url,
                output_dir,
                capture_interval_seconds,
                &run_dir,
                &mut machine,
                &mut source_id,
            )
            .await;
        run_dir.cleanup();

        match outcome {
            Ok(record) => {
                info!(
                    source_id = %record.source_id,
                    screenshots = record.screenshots.len(),
                    subtitle_used = record.subtitle_used,
                    "pipeline finished"
                );
                Ok(record)
            }
            Err((stage, e)) => {
                machine.fail();
                error!(%source_id, %stage, error = %e, "pipeline failed");
                Err(failure(&source_id, stage, e))
            }
        }
    }

    async fn execute(
        &self,
        url: &str,
        output_dir: &Path,
        capture_interval_seconds: f64,
        run_dir: &RunDir,
        machine: &mut StateMachine,
        source_id: &mut String,
    ) -> std::result::Result<VideoRecord, (Stage, PipelineError)> {
        let acquired = self
            .collaborators
            .source
            .fetch(url, run_dir.path())
            .await
            .at(Stage::Acquire)?;
        let metadata = acquired.metadata;
        validate_source_id(&metadata.id).at(Stage::Acquire)?;
        *source_id = metadata.id.clone();

        let language = match metadata.declared_language.clone() {
            Some(language) => language,
            None => self
                .collaborators
                .intelligence
                .detect_language(&format!("{} {}", metadata.title, metadata.description))
                .await
                .at(Stage::Resolve)?,
        };
        info!(source_id = %metadata.id, %language, "video language");

        let resolved = self
            .resolver
            .resolve(
                &acquired.media_file,
                &acquired.subtitle_tracks,
                &run_dir.audio_path(),
                machine,
            )
            .await
            .at(Stage::Resolve)?;

        self.purge_previous_screenshots(&metadata.id, output_dir)
            .await
            .at(Stage::Capture)?;
        let captured = self
            .collaborators
            .frames
            .capture(
                &acquired.media_file,
                output_dir,
                &metadata.id,
                capture_interval_seconds,
            )
            .await
            .at(Stage::Capture)?;

        let hasher = self.collaborators.hasher.clone();
        let threshold = self.config.similarity_threshold;
        let dir = output_dir.to_path_buf();
        let screenshots =
            tokio::task::spawn_blocking(move || dedupe(&dir, captured, hasher.as_ref(), threshold))
                .await
                .map_err(|e| (Stage::Dedupe, PipelineError::IoError(std::io::Error::other(e))))?;

        let record = VideoRecord {
            source_id: metadata.id,
            title: metadata.title,
            description: metadata.description,
            creator: metadata.creator,
            source_timestamp: metadata.uploaded_at,
            duration: metadata.duration,
            language,
            processed_at: Utc::now(),
            subtitle_used: resolved.used_subtitle(),
            screenshots,
            transcription: resolved.transcription,
            translation: resolved.translation,
            summary: resolved.summary,
        };

        self.collaborators
            .store
            .upsert(&record)
            .await
            .at(Stage::Persist)?;
        Ok(record)
    }

    /// Remove the screenshots of an earlier run before capturing new ones
    async fn purge_previous_screenshots(&self, source_id: &str, output_dir: &Path) -> Result<()> {
        let Some(previous) = self.collaborators.store.get(source_id).await? else {
            return Ok(());
        };
        let mut removed = 0;
        for shot in &previous.screenshots {
            let path = output_dir.join(&shot.filename);
            match remove_file_if_exists(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to delete old screenshot"),
            }
        }
        info!(source_id, removed, "replaced previous screenshots");
        Ok(())
    }
}

fn failure(source_id: &str, stage: Stage, e: PipelineError) -> PipelineFailure {
    PipelineFailure {
        source_id: source_id.to_string(),
        stage,
        kind: e.kind(),
        message: e.to_string(),
    }
}
