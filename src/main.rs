use anyhow::{Context, Result};
use callscribe::audio::AudioSource;
use callscribe::transcribe::CommandEngine;
use callscribe::{backfill, Config, RecordingPipeline, TranscriptionEngine};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "callscribe", about = "Segmented audio capture and transcription pipeline")]
struct Cli {
    /// Config file (optional; flags override it)
    #[arg(long)]
    config: Option<String>,

    /// Base directory for session folders
    #[arg(long)]
    base: Option<PathBuf>,

    /// Segment duration in seconds
    #[arg(long)]
    chunk_secs: Option<u64>,

    /// External recognizer command, invoked per segment as `<cmd> <wav>`
    #[arg(long)]
    engine_cmd: Option<String>,

    /// Capture from a WAV file instead of the microphone
    #[arg(long)]
    from_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(base) = cli.base {
        cfg.base_dir = base;
    }
    if let Some(chunk) = cli.chunk_secs {
        cfg.chunk_duration_secs = chunk;
    }
    if let Some(cmd) = cli.engine_cmd {
        cfg.engine_command = Some(cmd);
    }

    info!("callscribe v{}", env!("CARGO_PKG_VERSION"));
    info!("base directory: {}", cfg.base_dir.display());

    let command = cfg
        .engine_command
        .clone()
        .context("no recognizer configured; pass --engine-cmd or set engine_command")?;
    let engine: Arc<dyn TranscriptionEngine> =
        Arc::new(CommandEngine::new(command, cfg.engine_args.clone()));

    std::fs::create_dir_all(&cfg.base_dir)
        .with_context(|| format!("failed to create {}", cfg.base_dir.display()))?;

    // Drain anything a previous run left unfinished before recording anew
    let report = backfill::run(
        &cfg.base_dir,
        Arc::clone(&engine),
        cfg.worker_config().chunk_duration,
    )
    .await?;
    info!(
        "backfill complete: {} sessions scanned, {} recovered, {} segments drained",
        report.sessions_scanned, report.sessions_recovered, report.segments_recovered
    );

    let sources: Vec<(String, AudioSource)> = match &cli.from_file {
        Some(path) => vec![("mic".to_string(), AudioSource::File(path.clone()))],
        None => cfg
            .sources
            .iter()
            .map(|name| (name.clone(), AudioSource::Microphone))
            .collect(),
    };

    let mut pipeline = RecordingPipeline::start(
        &cfg.base_dir,
        sources,
        engine,
        cfg.recorder_config(),
        cfg.worker_config(),
    )
    .await?;

    info!("recording; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    let stats = pipeline.stop().await?;
    info!("session finished:\n{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
