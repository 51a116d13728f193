//! DubSync command-line interface.
//!
//! Thin surface over `dubsync_core`. It handles:
//! - Application-level logging initialization
//! - Configuration loading
//! - Directory creation
//! - Submitting one sync task and polling it to a terminal state

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dubsync_core::capability::{HttpEmbeddingClient, HttpTranscriptionClient, ResourceManager};
use dubsync_core::config::Settings;
use dubsync_core::media::FfmpegTranscoder;
use dubsync_core::models::{StatusReport, TaskStatus};
use dubsync_core::{SyncRequest, TaskOrchestrator};

/// Default config path: .config/settings.toml (relative to current working directory)
fn default_config_path() -> PathBuf {
    PathBuf::from(".config").join("settings.toml")
}

#[derive(Parser)]
#[command(name = "dubsync")]
#[command(about = "Align a dubbed audio track against a reference video")]
#[command(version)]
struct Cli {
    /// Reference video whose audio defines the timeline
    original: PathBuf,

    /// Dubbed file whose audio gets shifted into alignment
    dubbed: PathBuf,

    /// Name for the output container (defaults to synced_<task_id>.mkv)
    #[arg(short, long)]
    output: Option<String>,

    /// Settings file (TOML); missing file means defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let settings = Settings::load_or_default(&config_path)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;
    settings
        .ensure_dirs()
        .context("failed to create working directories")?;

    tracing::info!("DubSync {} starting", dubsync_core::version());
    tracing::info!("Config: {}", config_path.display());

    let transcoder =
        FfmpegTranscoder::from_settings(&settings.media).context("media tools unavailable")?;
    let resources = build_resource_manager(&settings);

    let orchestrator =
        TaskOrchestrator::new(settings, Arc::new(transcoder), Arc::new(resources));
    let _sweeper = orchestrator.spawn_sweeper();

    let mut request = SyncRequest::new(&cli.original, &cli.dubbed);
    if let Some(name) = cli.output {
        request = request.with_output_name(name);
    }

    let task_id = orchestrator.submit(request);
    println!("Task {task_id} submitted");

    let report = watch(&orchestrator, &task_id).await?;
    if report.status == TaskStatus::Completed {
        let result = orchestrator.get_result_path(&task_id)?;
        println!("Done: {}", result.display());
        Ok(())
    } else {
        bail!(
            "task failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        )
    }
}

/// Wires HTTP capability factories for every endpoint with a configured URL.
/// Unconfigured endpoints stay absent and the pipeline degrades per stage.
fn build_resource_manager(settings: &Settings) -> ResourceManager {
    let capability = settings.capability.clone();
    let timeout = Duration::from_secs(capability.request_timeout_secs);
    let api_key = (!capability.api_key.is_empty()).then(|| capability.api_key.clone());

    let mut resources = ResourceManager::new(settings.resources.memory_ceiling);

    if capability.transcription_url.is_empty() {
        tracing::warn!("No transcription endpoint configured; falling back to duration matching");
    } else {
        let url = capability.transcription_url.clone();
        let model = capability.transcription_model.clone();
        let key = api_key.clone();
        resources = resources.with_transcription_factory(move || {
            Arc::new(HttpTranscriptionClient::new(
                url.clone(),
                model.clone(),
                key.clone(),
                timeout,
            ))
        });
    }

    if capability.embedding_url.is_empty() {
        tracing::warn!("No embedding endpoint configured; semantic matching disabled");
    } else {
        let url = capability.embedding_url;
        let model = capability.embedding_model;
        resources = resources.with_embedding_factory(move || {
            Arc::new(HttpEmbeddingClient::new(
                url.clone(),
                model.clone(),
                api_key.clone(),
                timeout,
            ))
        });
    }

    resources
}

/// Polls the task, echoing each progress change, until it settles.
async fn watch(orchestrator: &TaskOrchestrator, task_id: &str) -> Result<StatusReport> {
    let mut last_progress = None;
    loop {
        let report = orchestrator.get_status(task_id)?;
        if last_progress != Some(report.progress) {
            println!("[{:>3}%] {}", report.progress, report.message);
            last_progress = Some(report.progress);
        }
        if report.status.is_terminal() {
            return Ok(report);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
