//! Offline analysis of a local video file.
//!
//! Runs the same pipeline as the server, acknowledging its own progress
//! messages, and leaves the result tables in a new session directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use emolysis_media::FfmpegDecoder;
use emolysis_ml_client::{model_registry, MlClient};
use emolysis_models::Language;
use emolysis_worker::{AutoAckTransport, PipelineConfig, SessionIdPool, SessionProcessor};

/// Emotion analysis of a single video file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video to analyze
    #[arg(long)]
    video_path: PathBuf,

    /// Transcript language ("en" or "zh")
    #[arg(long, default_value = "en")]
    lang: String,

    /// Root of the session directories (defaults to DATA_DIR or ./data)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let log_level = if args.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(false))
            .with(env_filter)
            .init();
    }

    let language: Language = args.lang.parse()?;
    if !args.video_path.is_file() {
        bail!("video not found: {}", args.video_path.display());
    }

    let mut config = PipelineConfig::from_env();
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    let client = Arc::new(MlClient::from_env().context("failed to create inference client")?);
    if !client.health_check().await.unwrap_or(false) {
        bail!("inference service at {} is not healthy", client.base_url());
    }

    let sessions = SessionIdPool::open(&config.data_dir).await?;
    let layout = sessions.create().await?;
    tokio::fs::copy(&args.video_path, layout.video())
        .await
        .with_context(|| format!("failed to copy {}", args.video_path.display()))?;
    info!(session_id = %layout.id, dir = %layout.dir.display(), "Created session");

    let processor = SessionProcessor::new(config, model_registry(client), Arc::new(FfmpegDecoder::new()))?;
    let paths = processor
        .run_session(&layout, language, AutoAckTransport::new())
        .await?;

    println!("{}", serde_json::to_string_pretty(&paths)?);
    Ok(())
}
