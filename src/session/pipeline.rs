use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use super::paths::SessionPaths;
use super::stats::{PipelineStats, SourceStats};
use crate::audio::{
    AudioBackendFactory, AudioSource, CaptureConfig, RecorderConfig, SegmentRecorder,
};
use crate::transcribe::engine::TranscriptionEngine;
use crate::transcribe::sink::TranscriptSink;
use crate::transcribe::worker::WorkerConfig;
use crate::transcribe::{TranscriptWriter, TranscriptionWorker};

/// Join barrier deciding when all sources of a session are finished:
/// an explicit expected-vs-completed count, nothing inferred.
pub struct CompletionGate {
    expected: usize,
    completed: AtomicUsize,
    notify: Notify,
}

impl CompletionGate {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            completed: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Record one source as finished.
    pub fn complete_one(&self) {
        let done = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if done >= self.expected {
            self.notify.notify_waiters();
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.expected
    }

    /// Wait until every expected source has completed.
    pub async fn wait_all(&self) {
        loop {
            if self.is_complete() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }
}

struct SourceRuntime {
    name: String,
    recorder: SegmentRecorder,
    worker: TranscriptionWorker,
}

/// The owning context of one live recording session.
///
/// Constructed at startup and held by the caller for the session's lifetime;
/// owns every per-source recorder, worker and the shared sink. Exactly one
/// recorder/worker pair acts on a source directory, and a session directory
/// is never reused.
pub struct RecordingPipeline {
    paths: SessionPaths,
    sink: Arc<TranscriptWriter>,
    sources: Vec<SourceRuntime>,
    gate: Arc<CompletionGate>,
    is_recording: Arc<AtomicBool>,
    started_at: DateTime<Utc>,
}

impl RecordingPipeline {
    /// Create the session directory and start capture plus a transcription
    /// worker for every source. On failure everything already started is
    /// stopped and the session directory is rolled back.
    pub async fn start(
        base_dir: &Path,
        sources: Vec<(String, AudioSource)>,
        engine: Arc<dyn TranscriptionEngine>,
        recorder_config: RecorderConfig,
        worker_config: WorkerConfig,
    ) -> Result<Self> {
        anyhow::ensure!(
            !sources.is_empty(),
            "at least one audio source is required"
        );

        let names: Vec<String> = sources.iter().map(|(n, _)| n.clone()).collect();
        let paths = SessionPaths::create(base_dir, &names)?;
        let sink = Arc::new(TranscriptWriter::new(&paths.root));

        let capture_config = CaptureConfig {
            sample_rate: recorder_config.sample_rate,
            channels: recorder_config.channels,
            ..CaptureConfig::default()
        };

        let mut runtimes: Vec<SourceRuntime> = Vec::with_capacity(sources.len());
        for (name, source) in sources {
            let started = Self::start_source(
                &paths,
                &name,
                source,
                Arc::clone(&engine),
                Arc::clone(&sink),
                &recorder_config,
                &worker_config,
                &capture_config,
            )
            .await;

            match started {
                Ok(runtime) => runtimes.push(runtime),
                Err(err) => {
                    // Roll back: stop what already started, drop the session
                    // directory so a half-started session never lingers
                    for mut runtime in runtimes {
                        let _ = runtime.recorder.stop().await;
                        runtime.worker.stop().await;
                    }
                    paths.remove();
                    return Err(err)
                        .with_context(|| format!("failed to start source '{name}'"));
                }
            }
        }

        for runtime in &runtimes {
            if let Err(err) = sink
                .append_marker(&runtime.name, "— session started —")
                .await
            {
                warn!("session marker write failed: {err:#}");
            }
        }

        info!("recording pipeline started ({} sources)", runtimes.len());

        let gate = Arc::new(CompletionGate::new(runtimes.len()));
        Ok(Self {
            paths,
            sink,
            sources: runtimes,
            gate,
            is_recording: Arc::new(AtomicBool::new(true)),
            started_at: Utc::now(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn start_source(
        paths: &SessionPaths,
        name: &str,
        source: AudioSource,
        engine: Arc<dyn TranscriptionEngine>,
        sink: Arc<TranscriptWriter>,
        recorder_config: &RecorderConfig,
        worker_config: &WorkerConfig,
        capture_config: &CaptureConfig,
    ) -> Result<SourceRuntime> {
        let dir = paths
            .source_dir(name)
            .context("source directory missing from session")?
            .to_path_buf();

        let backend = AudioBackendFactory::create(source, capture_config.clone())
            .context("failed to create audio backend")?;

        let mut worker = TranscriptionWorker::spawn(
            &dir,
            name,
            engine,
            sink as Arc<dyn TranscriptSink>,
            worker_config.clone(),
        );

        let mut recorder =
            SegmentRecorder::new(backend, recorder_config.clone(), worker.sender());
        if let Err(err) = recorder.start(&dir).await {
            worker.stop().await;
            return Err(err);
        }

        Ok(SourceRuntime {
            name: name.to_string(),
            recorder,
            worker,
        })
    }

    pub fn session_root(&self) -> &Path {
        &self.paths.root
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    /// Stop every source: the recorder flushes its in-flight units, the
    /// worker finishes the segment it is on, and the gate closes once all
    /// sources have completed. Pending segments left behind are picked up by
    /// the next run's recovery sweep.
    pub async fn stop(&mut self) -> Result<PipelineStats> {
        if !self.is_recording.swap(false, Ordering::SeqCst) {
            warn!("recording pipeline not active");
            return Ok(self.stats());
        }

        info!("stopping recording pipeline");

        {
            let gate = &self.gate;
            let shutdowns = self.sources.iter_mut().map(|runtime| {
                let gate = Arc::clone(gate);
                async move {
                    if let Err(err) = runtime.recorder.stop().await {
                        error!("failed to stop recorder for {}: {err:#}", runtime.name);
                    }
                    runtime.worker.stop().await;
                    gate.complete_one();
                }
            });
            futures::future::join_all(shutdowns).await;
        }
        self.gate.wait_all().await;

        for runtime in &self.sources {
            if let Err(err) = self
                .sink
                .append_marker(&runtime.name, "— session stopped —")
                .await
            {
                warn!("session marker write failed: {err:#}");
            }
        }

        info!("recording pipeline stopped");
        Ok(self.stats())
    }

    pub fn stats(&self) -> PipelineStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        PipelineStats {
            session: self.paths.root.display().to_string(),
            is_recording: self.is_recording(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            sources: self
                .sources
                .iter()
                .map(|runtime| SourceStats {
                    name: runtime.name.clone(),
                    segments_recorded: runtime.recorder.segments_finalized(),
                })
                .collect(),
            transcript_lines: self.sink.lines_written(),
        }
    }
}
