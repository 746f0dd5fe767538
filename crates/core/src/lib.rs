pub mod align;
pub mod cache;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod format;
pub mod intelligence;
pub mod media;
pub mod pipeline;
pub mod provider;
pub mod resolver;
pub mod source;
pub mod store;
pub mod transcribe;
pub mod types;
pub mod vtt;

pub use align::{align, align_record};
pub use cache::{RunDir, get_root_cache_dir, get_root_data_dir};
pub use config::PipelineConfig;
pub use dedupe::{Fingerprint, PerceptualHasher, PhashHasher, dedupe, dedupe_screenshots};
pub use error::{PipelineError, Result};
pub use format::{format_timestamp, render_vtt};
pub use intelligence::{ChatClient, Intelligence};
pub use media::{AudioExtractor, Ffmpeg, FrameExtractor};
pub use pipeline::{Collaborators, Pipeline, PipelineFailure, Stage};
pub use provider::{IntelligenceConfig, IntelligenceSettings, Provider, ProviderConfig};
pub use resolver::{ResolvedText, Resolver, ResolverState, StateMachine, TextSource};
pub use source::{AcquiredSource, SourceAcquirer, YtDlpSource};
pub use store::{DeleteOutcome, JsonRecordStore, RecordStore, delete_video};
pub use transcribe::{Transcriber, WhisperTranscriber, silence_whisper_logs};
pub use types::{AlignedFrame, ScreenshotRecord, SubtitleSegment, VideoMetadata, VideoRecord};
pub use vtt::parse_vtt;
