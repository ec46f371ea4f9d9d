use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::audio::backend::{AudioBackend, AudioFrame};
use crate::segment::state;

/// Rotation configuration for one capture source
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Duration of each segment before rotating files
    pub chunk_duration: Duration,
    /// Window during which the outgoing and incoming units both record,
    /// absorbing scheduling jitter at the boundary
    pub overlap: Duration,
    /// Sample rate written to segment files
    pub sample_rate: u32,
    /// Channel count written to segment files
    pub channels: u16,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_secs(10),
            overlap: Duration::from_millis(200),
            sample_rate: 44_100,
            channels: 1,
        }
    }
}

/// Notification that a segment reached the `pending` state.
/// The sole integration point between recorder and worker.
#[derive(Debug, Clone)]
pub struct SegmentNotice {
    pub path: PathBuf,
    pub index: u64,
}

/// Produces a gap-free sequence of fixed-duration audio segments from a live
/// input source.
///
/// Double-buffered rotation: at each boundary the *next* unit is created and
/// receiving frames before the *current* one stops. Frames go to both units
/// for the overlap window, then current is finalized (WAV flushed, renamed to
/// its `pending` form, consumer notified) and next is promoted. If starting
/// the next unit fails, the current one is still finalized — the stream
/// degrades to a bounded gap rather than losing audio already recorded.
pub struct SegmentRecorder {
    config: RecorderConfig,
    backend: Box<dyn AudioBackend>,
    notice_tx: mpsc::Sender<SegmentNotice>,
    running: Arc<AtomicBool>,
    segments_finalized: Arc<AtomicUsize>,
    task: Option<JoinHandle<Result<()>>>,
}

impl SegmentRecorder {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        config: RecorderConfig,
        notice_tx: mpsc::Sender<SegmentNotice>,
    ) -> Self {
        Self {
            config,
            backend,
            notice_tx,
            running: Arc::new(AtomicBool::new(false)),
            segments_finalized: Arc::new(AtomicUsize::new(0)),
            task: None,
        }
    }

    /// Number of segments finalized to `pending` so far.
    pub fn segments_finalized(&self) -> usize {
        self.segments_finalized.load(Ordering::Relaxed)
    }

    /// Begin capture into `dir`. Fails if the backend cannot start or the
    /// first segment file cannot be created; both are fatal to the session.
    pub async fn start(&mut self, dir: &Path) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            anyhow::bail!("recorder already started");
        }

        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let frames = match self.backend.start().await {
            Ok(rx) => rx,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(err).context("failed to start audio capture");
            }
        };

        let first = match SegmentUnit::create(dir, 1, &self.config) {
            Ok(unit) => unit,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = self.backend.stop().await;
                return Err(err);
            }
        };

        info!(
            "recording into {} ({}s chunks via {})",
            dir.display(),
            self.config.chunk_duration.as_secs(),
            self.backend.name()
        );

        let config = self.config.clone();
        let notice_tx = self.notice_tx.clone();
        let counter = Arc::clone(&self.segments_finalized);
        let dir = dir.to_path_buf();
        self.task = Some(tokio::spawn(async move {
            rotation_loop(dir, frames, config, notice_tx, counter, first).await
        }));

        Ok(())
    }

    /// Stop capture. Finalizes whatever unit(s) are active — including a
    /// next unit started but not yet promoted — before returning.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // Stopping the backend closes the frame channel; the rotation loop
        // drains it and finalizes the in-flight units.
        self.backend
            .stop()
            .await
            .context("failed to stop audio capture")?;

        if let Some(task) = self.task.take() {
            task.await.context("recorder task panicked")??;
        }

        info!("recording stopped");
        Ok(())
    }
}

async fn rotation_loop(
    dir: PathBuf,
    mut frames: mpsc::Receiver<AudioFrame>,
    config: RecorderConfig,
    notice_tx: mpsc::Sender<SegmentNotice>,
    counter: Arc<AtomicUsize>,
    first: SegmentUnit,
) -> Result<()> {
    // Two-slot arena: `current` always owns the unit being written, `next`
    // exists only inside the overlap window of a rotation.
    let mut current: Option<SegmentUnit> = Some(first);
    let mut index: u64 = 1;

    let mut rotation = interval(config.chunk_duration);
    rotation.set_missed_tick_behavior(MissedTickBehavior::Delay);
    rotation.tick().await; // the first tick completes immediately

    loop {
        tokio::select! {
            maybe = frames.recv() => match maybe {
                Some(frame) => {
                    if let Some(unit) = current.as_mut() {
                        if let Err(err) = unit.write(&frame) {
                            error!("segment write failed: {err:#}");
                        }
                    }
                }
                None => break,
            },
            _ = rotation.tick() => {
                let next_index = index + 1;

                // Start the next unit before stopping the current one
                let mut next = match SegmentUnit::create(&dir, next_index, &config) {
                    Ok(unit) => Some(unit),
                    Err(err) => {
                        warn!("failed to start segment {next_index:06}: {err:#}");
                        None
                    }
                };

                let mut channel_closed = false;
                if next.is_some() {
                    let deadline = Instant::now() + config.overlap;
                    loop {
                        tokio::select! {
                            maybe = frames.recv() => match maybe {
                                Some(frame) => {
                                    if let Some(unit) = current.as_mut() {
                                        if let Err(err) = unit.write(&frame) {
                                            error!("segment write failed: {err:#}");
                                        }
                                    }
                                    if let Some(unit) = next.as_mut() {
                                        if let Err(err) = unit.write(&frame) {
                                            error!("segment write failed: {err:#}");
                                        }
                                    }
                                }
                                None => {
                                    channel_closed = true;
                                    break;
                                }
                            },
                            _ = sleep_until(deadline) => break,
                        }
                    }
                }

                if let Some(unit) = current.take() {
                    finalize(unit, &notice_tx, &counter);
                }

                if channel_closed {
                    if let Some(unit) = next.take() {
                        finalize(unit, &notice_tx, &counter);
                    }
                    return Ok(());
                }

                // Promote; a failed `next` leaves a gap until the following
                // tick retries the same index
                if next.is_some() {
                    current = next;
                    index = next_index;
                }
            }
        }
    }

    // Capture ended: flush whatever is still active
    if let Some(unit) = current.take() {
        finalize(unit, &notice_tx, &counter);
    }
    Ok(())
}

fn finalize(
    unit: SegmentUnit,
    notice_tx: &mpsc::Sender<SegmentNotice>,
    counter: &Arc<AtomicUsize>,
) {
    let index = unit.index;
    let samples = unit.samples_written;
    match unit.finish() {
        Ok(notice) => {
            counter.fetch_add(1, Ordering::Relaxed);
            info!(
                "segment {:06} finalized ({} samples) -> {}",
                index,
                samples,
                notice.path.display()
            );
            // Best effort: the worker's directory poll covers a lost notice
            if let Err(err) = notice_tx.try_send(notice) {
                warn!("segment notice dropped: {err}");
            }
        }
        Err(err) => error!("failed to finalize segment {index:06}: {err:#}"),
    }
}

/// One WAV unit of the rotation arena. Written as `raw_segment_%06d.wav`,
/// promoted to `segment_%06d.pending.wav` on finish.
struct SegmentUnit {
    index: u64,
    raw_path: PathBuf,
    pending_path: PathBuf,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    samples_written: usize,
}

impl SegmentUnit {
    fn create(dir: &Path, index: u64, config: &RecorderConfig) -> Result<Self> {
        let raw_path = state::raw_path(dir, index);
        let spec = hound::WavSpec {
            channels: config.channels,
            sample_rate: config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&raw_path, spec)
            .with_context(|| format!("failed to create segment file {}", raw_path.display()))?;

        Ok(Self {
            index,
            pending_path: state::pending_path(dir, index),
            raw_path,
            writer: Some(writer),
            samples_written: 0,
        })
    }

    fn write(&mut self, frame: &AudioFrame) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .context("failed to write sample to WAV")?;
            }
            self.samples_written += frame.samples.len();
        }
        Ok(())
    }

    /// Flush the WAV and rename it to the `pending` form. The rename is the
    /// only handoff to the consumer side.
    fn finish(mut self) -> Result<SegmentNotice> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("failed to finalize WAV file")?;
        }

        if self.pending_path.exists() {
            std::fs::remove_file(&self.pending_path).with_context(|| {
                format!("failed to replace stale {}", self.pending_path.display())
            })?;
        }
        std::fs::rename(&self.raw_path, &self.pending_path).with_context(|| {
            format!(
                "failed to promote {} to pending",
                self.raw_path.display()
            )
        })?;

        Ok(SegmentNotice {
            path: self.pending_path.clone(),
            index: self.index,
        })
    }
}

impl Drop for SegmentUnit {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.finalize() {
                warn!("failed to finalize WAV writer on drop: {}", err);
            }
        }
    }
}
