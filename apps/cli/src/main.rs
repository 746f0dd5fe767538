use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use slidecast_core::{
    ChatClient, Collaborators, Ffmpeg, IntelligenceConfig, JsonRecordStore, PhashHasher, Pipeline,
    PipelineConfig, Provider, RecordStore, WhisperTranscriber, YtDlpSource, align_record,
    delete_video, format_timestamp, silence_whisper_logs,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, ValueEnum)]
enum CliProvider {
    Ollama,
    Openai,
    Grok,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Ollama => Provider::Ollama,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Grok => Provider::Grok,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "slidecast", version)]
#[command(
    about = "Turn online videos into deduplicated screenshots aligned with translated subtitles"
)]
struct Cli {
    /// Config file (TOML). Defaults to the platform config directory.
    #[arg(short, long, global = true, env = "SLIDECAST_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a video, resolve its text track and capture screenshots
    Process {
        /// Video URL
        url: String,

        /// Seconds between screenshots
        #[arg(short, long)]
        interval: Option<f64>,

        /// Language model provider for detection, translation and summaries
        #[arg(short, long)]
        provider: Option<CliProvider>,

        /// Model name, overriding the provider default
        #[arg(long, env = "SLIDECAST_MODEL")]
        model: Option<String>,

        /// Chat completions endpoint, overriding the provider default
        #[arg(long, env = "SLIDECAST_ENDPOINT")]
        endpoint: Option<String>,

        /// Run whisper on the CPU only
        #[arg(long)]
        cpu: bool,
    },

    /// List processed videos, newest first
    List,

    /// Show a video's screenshots with their aligned text
    Show {
        id: String,

        /// Print aligned frames as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a video record and its screenshots
    Delete { id: String },
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default_path = PipelineConfig::default_path();
            if !default_path.exists() {
                return Ok(PipelineConfig::default());
            }
            default_path
        }
    };
    debug!(path = %path.display(), "loading config");
    PipelineConfig::load(&path)
        .await
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Command::Process {
            url,
            interval,
            provider,
            model,
            endpoint,
            cpu,
        } => {
            if let Some(provider) = provider {
                config.intelligence.provider = provider.into();
            }
            if model.is_some() {
                config.intelligence.model = model;
            }
            if endpoint.is_some() {
                config.intelligence.endpoint = endpoint;
            }
            process(config, &url, interval, cpu).await
        }
        Command::List => list(&config).await,
        Command::Show { id, json } => show(&config, &id, json).await,
        Command::Delete { id } => delete(&config, &id).await,
    }
}

fn open_store(config: &PipelineConfig) -> JsonRecordStore {
    JsonRecordStore::new(config.store_dir.clone(), config.screenshots_dir.clone())
}

async fn process(
    config: PipelineConfig,
    url: &str,
    interval: Option<f64>,
    cpu: bool,
) -> Result<()> {
    // Validate API key early
    let intelligence_config = match IntelligenceConfig::resolve(&config.intelligence) {
        Ok(resolved) => resolved,
        Err(e) => fail(e),
    };

    silence_whisper_logs();

    println!(
        "\n{}  {}\n",
        style("slidecast").cyan().bold(),
        style("Video Ingestion").dim()
    );

    println!(
        "{} Using {} ({})",
        style("✓").green().bold(),
        intelligence_config.provider.name(),
        style(&intelligence_config.model).dim()
    );
    println!("{}", style("─".repeat(60)).dim());

    let ffmpeg = Arc::new(Ffmpeg::new());
    let collaborators = Collaborators {
        source: Arc::new(YtDlpSource::new(config.subtitle_languages.clone())),
        audio: ffmpeg.clone(),
        frames: ffmpeg,
        transcriber: Arc::new(
            WhisperTranscriber::new(config.cache_dir.clone(), config.whisper_model.clone())
                .with_gpu(!cpu),
        ),
        intelligence: Arc::new(ChatClient::new(intelligence_config)),
        hasher: Arc::new(PhashHasher::new(config.hash_size)),
        store: Arc::new(open_store(&config)),
    };

    let interval = interval.unwrap_or(config.capture_interval_seconds);
    let output_dir = config.screenshots_dir.clone();
    let pipeline = Pipeline::new(config, collaborators);

    let start = Instant::now();
    let spinner = create_spinner("Processing video...");
    match pipeline.run(url, &output_dir, interval).await {
        Ok(record) => {
            spinner.finish_with_message(format!(
                "{} Processed: {} {}",
                style("✓").green().bold(),
                style(&record.title).bold(),
                style(format!("[{}]", format_duration(start.elapsed()))).dim()
            ));
            println!("{}", style("─".repeat(60)).dim());
            println!("  {} {}", style("Id:").dim(), record.source_id);
            println!("  {} {}", style("Language:").dim(), style(&record.language).yellow());
            println!(
                "  {} {}",
                style("Text from:").dim(),
                if record.subtitle_used {
                    "subtitle track"
                } else {
                    "transcription"
                }
            );
            println!(
                "  {} {} kept in {}",
                style("Screenshots:").dim(),
                record.screenshots.len(),
                output_dir.display()
            );
            Ok(())
        }
        Err(failure) => {
            spinner.finish_and_clear();
            eprintln!("{} {}", style("Error:").red().bold(), failure);
            println!("{}", serde_json::to_string_pretty(&failure)?);
            std::process::exit(1);
        }
    }
}

async fn list(config: &PipelineConfig) -> Result<()> {
    let records = open_store(config).list().await?;
    if records.is_empty() {
        println!("{}", style("No videos processed yet").dim());
        return Ok(());
    }

    for record in records {
        println!(
            "{}  {}  {}  {}",
            style(&record.source_id).cyan(),
            record.title,
            style(record.processed_at.format("%Y-%m-%d %H:%M")).dim(),
            if record.subtitle_used {
                style("subtitles").green()
            } else {
                style("transcribed").yellow()
            }
        );
    }
    Ok(())
}

async fn show(config: &PipelineConfig, id: &str, json: bool) -> Result<()> {
    let Some(record) = open_store(config).get(id).await? else {
        fail(format!("no video with id {}", id));
    };
    let frames = align_record(&record);

    if json {
        println!("{}", serde_json::to_string_pretty(&frames)?);
        return Ok(());
    }

    println!("\n{}", style(&record.title).cyan().bold());
    println!(
        "{}",
        style(format!(
            "{} · {} · {}",
            record.creator, record.duration, record.language
        ))
        .dim()
    );
    println!("{}", style("─".repeat(60)).dim());
    println!("{}\n", record.summary);

    for frame in frames {
        println!(
            "{} {}",
            style(format!("[{}]", format_timestamp(frame.screenshot.timestamp_seconds))).cyan(),
            style(config.screenshots_dir.join(&frame.screenshot.filename).display()).dim()
        );
        for seg in &frame.original_segments {
            println!("    {}", style(&seg.text).dim());
        }
        for seg in &frame.translated_segments {
            println!("    {}", seg.text);
        }
    }
    Ok(())
}

async fn delete(config: &PipelineConfig, id: &str) -> Result<()> {
    let store = open_store(config);
    let outcome = delete_video(&store, id).await;
    if !outcome.success {
        fail(outcome.message);
    }
    println!("{} {}", style("✓").green().bold(), outcome.message);
    Ok(())
}
