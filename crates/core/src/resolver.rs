use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;
use tracing::{info, warn};

use crate::{
    error::{PipelineError, Result},
    format::{extract_text_from_vtt, render_vtt, segments_plain_text},
    intelligence::Intelligence,
    media::AudioExtractor,
    transcribe::Transcriber,
    types::SubtitleSegment,
    vtt::parse_vtt,
};

pub const EXTRACTION_FAILED_TEXT: &str = "音頻提取失敗";
pub const TRANSCRIPTION_FAILED_TEXT: &str = "轉錄失敗";
pub const SUMMARY_UNAVAILABLE_TEXT: &str = "無法生成摘要";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    AcquiringSource,
    CheckingSubtitles,
    UsingSubtitle,
    ExtractingAudio,
    Transcribing,
    Translating,
    Summarizing,
    Done,
    Failed,
}

impl ResolverState {
    pub fn name(&self) -> &'static str {
        match self {
            ResolverState::AcquiringSource => "acquiring_source",
            ResolverState::CheckingSubtitles => "checking_subtitles",
            ResolverState::UsingSubtitle => "using_subtitle",
            ResolverState::ExtractingAudio => "extracting_audio",
            ResolverState::Transcribing => "transcribing",
            ResolverState::Translating => "translating",
            ResolverState::Summarizing => "summarizing",
            ResolverState::Done => "done",
            ResolverState::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: ResolverState) -> bool {
        use ResolverState::*;
        match (self, next) {
            (Failed, _) => false,
            (_, Failed) => true,
            (AcquiringSource, CheckingSubtitles) => true,
            (CheckingSubtitles, UsingSubtitle | ExtractingAudio) => true,
            (UsingSubtitle, Translating) => true,
            (ExtractingAudio, Transcribing) => true,
            (Transcribing, Translating) => true,
            (Translating, Summarizing) => true,
            (Summarizing, Done) => true,
            // placeholder path after a failed extraction or transcription
            (ExtractingAudio | Transcribing, Summarizing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks the resolver's progress and rejects transitions the flow does not allow
#[derive(Debug)]
pub struct StateMachine {
    state: ResolverState,
    history: Vec<ResolverState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: ResolverState::AcquiringSource,
            history: vec![ResolverState::AcquiringSource],
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    pub fn history(&self) -> &[ResolverState] {
        &self.history
    }

    pub fn transition(&mut self, next: ResolverState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        info!(from = %self.state, to = %next, "resolver state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed`; a machine that already failed stays put
    pub fn fail(&mut self) {
        if self.state != ResolverState::Failed {
            warn!(from = %self.state, "resolver failed");
            self.state = ResolverState::Failed;
            self.history.push(ResolverState::Failed);
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the working text came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    SubtitleUsed { language: String },
    Transcribed,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ResolvedText {
    pub source: TextSource,
    /// Language reported by detection, absent on the placeholder path
    pub detected_language: Option<String>,
    pub transcription: String,
    pub translation: String,
    pub summary: String,
}

impl ResolvedText {
    pub fn used_subtitle(&self) -> bool {
        matches!(self.source, TextSource::SubtitleUsed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct LanguagePolicy {
    /// Subtitle languages in priority order
    pub subtitle_languages: Vec<String>,
    pub target_language: String,
}

/// Labels such as "chinese", "Traditional Chinese" or "taiwanese mandarin"
pub fn is_chinese(language: &str) -> bool {
    let language = language.to_lowercase();
    language.contains("chinese") || language.contains("taiwanese mandarin")
}

/// First track in priority order that exists and is non-empty
pub fn select_subtitle(
    priority: &[String],
    tracks: &HashMap<String, PathBuf>,
) -> Option<(String, PathBuf)> {
    priority.iter().find_map(|lang| {
        let path = tracks.get(lang)?;
        let meta = std::fs::metadata(path).ok()?;
        (meta.is_file() && meta.len() > 0).then(|| (lang.clone(), path.clone()))
    })
}

pub struct Resolver {
    intelligence: Arc<dyn Intelligence>,
    audio: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn Transcriber>,
    policy: LanguagePolicy,
}

impl Resolver {
    pub fn new(
        intelligence: Arc<dyn Intelligence>,
        audio: Arc<dyn AudioExtractor>,
        transcriber: Arc<dyn Transcriber>,
        policy: LanguagePolicy,
    ) -> Self {
        Self {
            intelligence,
            audio,
            transcriber,
            policy,
        }
    }

    /// Decide between a subtitle track and transcription, then translate and summarize.
    ///
    /// `machine` must be in `AcquiringSource`. On error the caller is expected to
    /// fail the machine.
    pub async fn resolve(
        &self,
        media_file: &Path,
        subtitle_tracks: &HashMap<String, PathBuf>,
        audio_path: &Path,
        machine: &mut StateMachine,
    ) -> Result<ResolvedText> {
        machine.transition(ResolverState::CheckingSubtitles)?;

        if let Some((language, path)) = select_subtitle(&self.policy.subtitle_languages, subtitle_tracks)
        {
            machine.transition(ResolverState::UsingSubtitle)?;
            info!(%language, path = %path.display(), "using subtitle track");
            let content = fs::read_to_string(&path).await?;
            let segments = parse_vtt(&content);
            let plain_text = extract_text_from_vtt(&content);
            return self
                .translate_and_summarize(
                    content,
                    segments,
                    plain_text,
                    TextSource::SubtitleUsed { language },
                    machine,
                )
                .await;
        }

        info!("no usable subtitle track, transcribing audio");
        machine.transition(ResolverState::ExtractingAudio)?;
        let audio = match self.audio.extract_audio(media_file, audio_path).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(error = %e, "audio extraction failed");
                return self.placeholder(EXTRACTION_FAILED_TEXT, e.to_string(), machine);
            }
        };

        machine.transition(ResolverState::Transcribing)?;
        let segments = match self.transcriber.transcribe(&audio).await {
            Ok(segments) if !segments.is_empty() => segments,
            Ok(_) => {
                warn!("transcription produced no segments");
                return self.placeholder(
                    TRANSCRIPTION_FAILED_TEXT,
                    "empty transcription".to_string(),
                    machine,
                );
            }
            Err(e) => {
                warn!(error = %e, "transcription failed");
                return self.placeholder(TRANSCRIPTION_FAILED_TEXT, e.to_string(), machine);
            }
        };

        let transcription = render_vtt(&segments);
        let plain_text = segments_plain_text(&segments);
        self.translate_and_summarize(
            transcription,
            segments,
            plain_text,
            TextSource::Transcribed,
            machine,
        )
        .await
    }

    async fn translate_and_summarize(
        &self,
        transcription: String,
        segments: Vec<SubtitleSegment>,
        plain_text: String,
        source: TextSource,
        machine: &mut StateMachine,
    ) -> Result<ResolvedText> {
        let language = self.intelligence.detect_language(&plain_text).await?;
        info!(%language, "detected language");

        machine.transition(ResolverState::Translating)?;
        let (translation, translated_text) = if is_chinese(&language) {
            (transcription.clone(), plain_text)
        } else {
            let translated = self.translate_segments(&segments, &language).await?;
            (render_vtt(&translated), segments_plain_text(&translated))
        };

        machine.transition(ResolverState::Summarizing)?;
        let summary = self.intelligence.summarize(&translated_text).await?;
        machine.transition(ResolverState::Done)?;

        Ok(ResolvedText {
            source,
            detected_language: Some(language),
            transcription,
            translation,
            summary,
        })
    }

    /// Translate cue by cue so every cue keeps its own time range
    async fn translate_segments(
        &self,
        segments: &[SubtitleSegment],
        source_language: &str,
    ) -> Result<Vec<SubtitleSegment>> {
        let mut translated = Vec::with_capacity(segments.len());
        for seg in segments {
            let text = seg.text.trim();
            let text = if text.is_empty() {
                String::new()
            } else {
                self.intelligence
                    .translate(text, source_language, &self.policy.target_language)
                    .await?
            };
            translated.push(SubtitleSegment {
                start_seconds: seg.start_seconds,
                end_seconds: seg.end_seconds,
                text: text.trim().to_string(),
            });
        }
        Ok(translated)
    }

    fn placeholder(
        &self,
        translation: &str,
        reason: String,
        machine: &mut StateMachine,
    ) -> Result<ResolvedText> {
        machine.transition(ResolverState::Summarizing)?;
        machine.transition(ResolverState::Done)?;
        Ok(ResolvedText {
            source: TextSource::Failed(reason),
            detected_language: None,
            transcription: String::new(),
            translation: translation.to_string(),
            summary: SUMMARY_UNAVAILABLE_TEXT.to_string(),
        })
    }
}
