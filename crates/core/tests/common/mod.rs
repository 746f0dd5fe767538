#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use slidecast_core::{
    AcquiredSource, AudioExtractor, Collaborators, Fingerprint, FrameExtractor, Intelligence,
    JsonRecordStore, PerceptualHasher, Pipeline, PipelineConfig, PipelineError, Result,
    ScreenshotRecord, SourceAcquirer, SubtitleSegment, Transcriber, VideoMetadata,
};
use tempfile::TempDir;

pub const SOURCE_ID: &str = "abc123";
pub const SOURCE_URL: &str = "https://www.youtube.com/watch?v=abc123";

pub fn metadata(declared_language: Option<&str>) -> VideoMetadata {
    VideoMetadata {
        id: SOURCE_ID.to_string(),
        title: "Talk".to_string(),
        description: "About things".to_string(),
        creator: "Someone".to_string(),
        uploaded_at: None,
        duration: "0:30".to_string(),
        declared_language: declared_language.map(str::to_string),
    }
}

pub fn segment(start: f64, end: f64, text: &str) -> SubtitleSegment {
    SubtitleSegment {
        start_seconds: start,
        end_seconds: end,
        text: text.to_string(),
    }
}

pub const ENGLISH_VTT: &str = "WEBVTT\n\n00:00:01.000 --> 00:00:04.000\nhello\n\n00:00:12.000 --> 00:00:15.000\nworld\n\n";

/// Writes a media file and the configured subtitle tracks into the run directory
pub struct FakeSource {
    pub metadata: VideoMetadata,
    pub subtitles: Vec<(String, String)>,
    pub fail: bool,
    pub work_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeSource {
    pub fn new(metadata: VideoMetadata) -> Self {
        Self {
            metadata,
            subtitles: Vec::new(),
            fail: false,
            work_dirs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_subtitle(mut self, language: &str, content: &str) -> Self {
        self.subtitles
            .push((language.to_string(), content.to_string()));
        self
    }

    pub fn work_dirs(&self) -> Vec<PathBuf> {
        self.work_dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAcquirer for FakeSource {
    async fn fetch(&self, url: &str, work_dir: &Path) -> Result<AcquiredSource> {
        self.work_dirs.lock().unwrap().push(work_dir.to_path_buf());
        if self.fail {
            return Err(PipelineError::SourceUnavailable {
                url: url.to_string(),
                reason: "Video unavailable".to_string(),
            });
        }

        let media_file = work_dir.join("source.mp4");
        std::fs::write(&media_file, b"media")?;
        let mut subtitle_tracks = HashMap::new();
        for (language, content) in &self.subtitles {
            let path = work_dir.join(format!("source.{}.vtt", language));
            std::fs::write(&path, content)?;
            subtitle_tracks.insert(language.clone(), path);
        }

        Ok(AcquiredSource {
            media_file,
            metadata: self.metadata.clone(),
            subtitle_tracks,
        })
    }
}

#[derive(Default)]
pub struct FakeAudio {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl AudioExtractor for FakeAudio {
    async fn extract_audio(&self, media_file: &Path, audio_path: &Path) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::ExtractionFailed {
                media_path: media_file.to_path_buf(),
                reason: "no audio stream".to_string(),
            });
        }
        std::fs::write(audio_path, b"RIFF")?;
        Ok(audio_path.to_path_buf())
    }
}

#[derive(Default)]
pub struct FakeTranscriber {
    pub segments: Vec<SubtitleSegment>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn returning(segments: Vec<SubtitleSegment>) -> Self {
        Self {
            segments,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<SubtitleSegment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::TranscriptionFailed {
                audio_path: audio_path.to_path_buf(),
                reason: "model crashed".to_string(),
            });
        }
        Ok(self.segments.clone())
    }
}

/// Reports a fixed language, tags translations with the target language
pub struct FakeIntelligence {
    pub language: String,
    pub fail_translation: bool,
    pub detect_inputs: Mutex<Vec<String>>,
    pub summarize_inputs: Mutex<Vec<String>>,
    pub translate_calls: AtomicUsize,
}

impl FakeIntelligence {
    pub fn detecting(language: &str) -> Self {
        Self {
            language: language.to_string(),
            fail_translation: false,
            detect_inputs: Mutex::new(Vec::new()),
            summarize_inputs: Mutex::new(Vec::new()),
            translate_calls: AtomicUsize::new(0),
        }
    }

    pub fn detect_inputs(&self) -> Vec<String> {
        self.detect_inputs.lock().unwrap().clone()
    }

    pub fn summarize_inputs(&self) -> Vec<String> {
        self.summarize_inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Intelligence for FakeIntelligence {
    async fn detect_language(&self, text: &str) -> Result<String> {
        self.detect_inputs.lock().unwrap().push(text.to_string());
        Ok(self.language.clone())
    }

    async fn translate(
        &self,
        text: &str,
        _source_language: &str,
        target_language: &str,
    ) -> Result<String> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_translation {
            return Err(PipelineError::TranslationFailed {
                reason: "rate limited".to_string(),
            });
        }
        Ok(format!("[{}] {}", target_language, text))
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        self.summarize_inputs.lock().unwrap().push(text.to_string());
        Ok(format!("<ul><li>{}</li></ul>", text))
    }
}

/// Writes one file per frame with the given bytes as image content
pub struct FakeFrames {
    pub frames: Vec<(f64, Vec<u8>)>,
    pub fail: bool,
}

impl FakeFrames {
    pub fn new(frames: Vec<(f64, Vec<u8>)>) -> Self {
        Self {
            frames,
            fail: false,
        }
    }

    /// Frames whose contents are far apart from each other
    pub fn distinct(timestamps: &[f64]) -> Self {
        let frames = timestamps
            .iter()
            .enumerate()
            .map(|(i, t)| (*t, vec![(i as u8).wrapping_mul(0x55); 4]))
            .collect();
        Self::new(frames)
    }
}

#[async_trait]
impl FrameExtractor for FakeFrames {
    async fn capture(
        &self,
        media_file: &Path,
        output_dir: &Path,
        source_id: &str,
        _interval_seconds: f64,
    ) -> Result<Vec<ScreenshotRecord>> {
        if self.fail {
            return Err(PipelineError::CaptureFailed {
                media_path: media_file.to_path_buf(),
                reason: "moov atom not found".to_string(),
            });
        }
        std::fs::create_dir_all(output_dir)?;
        let mut shots = Vec::new();
        for (timestamp, content) in &self.frames {
            let shot = ScreenshotRecord::new(source_id, *timestamp);
            std::fs::write(output_dir.join(&shot.filename), content)?;
            shots.push(shot);
        }
        Ok(shots)
    }
}

/// Uses the file's bytes as its fingerprint
pub struct ContentHasher;

impl PerceptualHasher for ContentHasher {
    fn hash(&self, path: &Path) -> Result<Fingerprint> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::ImageReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Fingerprint::from_bytes(bytes))
    }
}

pub struct Harness {
    pub root: TempDir,
    pub source: Arc<FakeSource>,
    pub audio: Arc<FakeAudio>,
    pub transcriber: Arc<FakeTranscriber>,
    pub intelligence: Arc<FakeIntelligence>,
    pub frames: Arc<FakeFrames>,
    pub store: Arc<JsonRecordStore>,
}

impl Harness {
    pub fn new(
        source: FakeSource,
        audio: FakeAudio,
        transcriber: FakeTranscriber,
        intelligence: FakeIntelligence,
        frames: FakeFrames,
    ) -> Self {
        let root = TempDir::new().unwrap();
        let store = JsonRecordStore::new(root.path().join("records"), root.path().join("shots"));
        Self {
            root,
            source: Arc::new(source),
            audio: Arc::new(audio),
            transcriber: Arc::new(transcriber),
            intelligence: Arc::new(intelligence),
            frames: Arc::new(frames),
            store: Arc::new(store),
        }
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            screenshots_dir: self.shots_dir(),
            store_dir: self.root.path().join("records"),
            work_root: self.work_root(),
            cache_dir: self.root.path().join("cache"),
            ..PipelineConfig::default()
        }
    }

    pub fn shots_dir(&self) -> PathBuf {
        self.root.path().join("shots")
    }

    pub fn work_root(&self) -> PathBuf {
        self.root.path().join("runs")
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline_with_frames(self.frames.clone())
    }

    pub fn pipeline_with_frames(&self, frames: Arc<FakeFrames>) -> Pipeline {
        Pipeline::new(
            self.config(),
            Collaborators {
                source: self.source.clone(),
                audio: self.audio.clone(),
                frames,
                transcriber: self.transcriber.clone(),
                intelligence: self.intelligence.clone(),
                hasher: Arc::new(ContentHasher),
                store: self.store.clone(),
            },
        )
    }

    pub fn run_dirs_left(&self) -> usize {
        std::fs::read_dir(self.work_root())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub fn audio_calls(&self) -> usize {
        self.audio.calls.load(Ordering::SeqCst)
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcriber.calls.load(Ordering::SeqCst)
    }

    pub fn translate_calls(&self) -> usize {
        self.intelligence.translate_calls.load(Ordering::SeqCst)
    }
}
