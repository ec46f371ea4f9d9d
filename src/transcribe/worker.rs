use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::audio::file::AudioFile;
use crate::audio::recorder::SegmentNotice;
use crate::segment::state::{self, TransitionOutcome};
use crate::segment::FileIndexer;
use crate::transcribe::engine::TranscriptionEngine;
use crate::transcribe::filter::NoiseFilter;
use crate::transcribe::sink::{TimeRange, TranscriptSink};

/// Tuning for one source's consumer.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Idle rescan interval; also the latency floor when a notice is lost
    pub poll_interval: Duration,
    /// Fallback segment duration when the WAV cannot be probed
    pub chunk_duration: Duration,
    /// Engine failures tolerated per segment in one process run
    pub max_engine_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            chunk_duration: Duration::from_secs(10),
            max_engine_retries: 5,
        }
    }
}

/// What happened to one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Reached the end of the lifecycle; transcript appended or dropped as
    /// noise
    Completed,
    /// File disappeared before it could be claimed; handled elsewhere
    Vanished,
    /// Engine failed; segment reverted to `pending` for a later retry
    EngineFailed,
}

/// The claim -> transcribe -> filter -> append -> finalize sequence for one
/// segment. Shared between the live worker and the recovery scanner so both
/// drain directories identically.
pub struct SegmentProcessor {
    source: String,
    engine: Arc<dyn TranscriptionEngine>,
    sink: Arc<dyn TranscriptSink>,
    chunk_secs: f64,
    last_written_text: Option<String>,
}

impl SegmentProcessor {
    pub fn new(
        source: impl Into<String>,
        engine: Arc<dyn TranscriptionEngine>,
        sink: Arc<dyn TranscriptSink>,
        chunk_duration: Duration,
    ) -> Self {
        Self {
            source: source.into(),
            engine,
            sink,
            chunk_secs: chunk_duration.as_secs_f64(),
            last_written_text: None,
        }
    }

    pub async fn process(&mut self, pending: &Path, index: u64) -> SegmentOutcome {
        let processing = state::processing_path(pending);

        // Claim: pending -> processing. A destination that already exists
        // means a previous attempt got the rename through; continue from
        // there.
        match state::advance(pending, &processing) {
            Ok(TransitionOutcome::Moved) | Ok(TransitionOutcome::AlreadyApplied) => {}
            Ok(TransitionOutcome::Vanished) => {
                debug!("segment {index:06} vanished before claim");
                return SegmentOutcome::Vanished;
            }
            Err(err) => {
                warn!("failed to claim segment {index:06}: {err}");
                return SegmentOutcome::Vanished;
            }
        }

        let transcription = match self.engine.transcribe(&processing).await {
            Ok(t) => t,
            Err(err) => {
                warn!(
                    "transcription failed for {} segment {index:06}: {err}",
                    self.source
                );
                // Revert the claim so a later pass retries this segment
                let back = state::pending_sibling(&processing);
                if let Err(err) = state::advance(&processing, &back) {
                    warn!("failed to revert segment {index:06} to pending: {err}");
                }
                return SegmentOutcome::EngineFailed;
            }
        };

        debug!(
            "{} segment {index:06}: {:.2} confidence, {} chars",
            self.source,
            transcription.confidence,
            transcription.text.len()
        );

        let printable = NoiseFilter::sanitize(&transcription.text);
        if !NoiseFilter::should_drop(&printable) {
            if self.last_written_text.as_deref() != Some(printable.as_str()) {
                // Time range from the actual audio duration where possible
                let secs = AudioFile::open(&processing)
                    .map(|f| f.duration_seconds)
                    .unwrap_or(self.chunk_secs);
                let range = TimeRange::for_segment(index, secs);
                if let Err(err) = self.sink.append(&self.source, range, &printable).await {
                    warn!("transcript write failed: {err:#}");
                }
            }
            self.last_written_text = Some(printable);
        }

        // processing -> done, then the two-step removal: done -> deleting ->
        // unlink. A crash between any two leaves a state recovery can finish.
        let done = state::done_path(&processing);
        if let Err(err) = state::advance(&processing, &done) {
            warn!("failed to mark segment {index:06} done: {err}");
            return SegmentOutcome::Completed;
        }
        remove_done(&done, index);

        SegmentOutcome::Completed
    }
}

/// Finish the removal of a `done` segment file: capture it as `deleting`,
/// then unlink. Idempotent; safe to call for files another pass already
/// removed.
pub(crate) fn remove_done(done: &Path, index: u64) {
    let deleting = state::deleting_path(done);
    if let Err(err) = state::advance(done, &deleting) {
        warn!("failed to capture segment {index:06} for removal: {err}");
        return;
    }
    if let Err(err) = std::fs::remove_file(&deleting) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove segment {index:06}: {err}");
        }
    }
}

/// Ordered work queue with idempotent enqueue.
///
/// Entries pop in ascending sequence-index order regardless of arrival
/// order; the `enqueued` and `processed` sets make both notifications and
/// directory rescans safe to repeat.
struct WorkQueue {
    heap: BinaryHeap<Reverse<(u64, PathBuf)>>,
    enqueued: HashSet<u64>,
    processed: HashSet<u64>,
    retries: HashMap<u64, u32>,
}

impl WorkQueue {
    fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            enqueued: HashSet::new(),
            processed: HashSet::new(),
            retries: HashMap::new(),
        }
    }

    fn enqueue(&mut self, path: PathBuf, index: u64) -> bool {
        if self.processed.contains(&index) || !self.enqueued.insert(index) {
            return false;
        }
        self.heap.push(Reverse((index, path)));
        true
    }

    fn pop(&mut self) -> Option<(u64, PathBuf)> {
        let Reverse((index, path)) = self.heap.pop()?;
        self.enqueued.remove(&index);
        Some((index, path))
    }
}

/// Serialized consumer for one source directory: drains pending segments
/// through the engine in ascending index order, at most one in flight, no
/// segment processed twice.
pub struct TranscriptionWorker {
    notice_tx: mpsc::Sender<SegmentNotice>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl TranscriptionWorker {
    /// Spawn the consume loop for `dir`. Notices sent to [`Self::sender`]
    /// enqueue segments; a lost notice is recovered by the poll rescan.
    pub fn spawn(
        dir: impl Into<PathBuf>,
        source: impl Into<String>,
        engine: Arc<dyn TranscriptionEngine>,
        sink: Arc<dyn TranscriptSink>,
        config: WorkerConfig,
    ) -> Self {
        let (notice_tx, notice_rx) = mpsc::channel(128);
        let running = Arc::new(AtomicBool::new(true));

        let dir = dir.into();
        let source = source.into();
        let processor = SegmentProcessor::new(
            source.clone(),
            engine,
            sink,
            config.chunk_duration,
        );

        let task = tokio::spawn(consume_loop(
            dir,
            source,
            config,
            processor,
            notice_rx,
            Arc::clone(&running),
        ));

        Self {
            notice_tx,
            running,
            task: Some(task),
        }
    }

    /// Sender half of the enqueue channel, handed to the recorder.
    pub fn sender(&self) -> mpsc::Sender<SegmentNotice> {
        self.notice_tx.clone()
    }

    /// Enqueue one segment. Idempotent: an index already enqueued or already
    /// processed is ignored by the consume loop.
    pub fn enqueue(&self, path: impl Into<PathBuf>, index: u64) {
        let notice = SegmentNotice {
            path: path.into(),
            index,
        };
        if let Err(err) = self.notice_tx.try_send(notice) {
            debug!("enqueue notice dropped (poll will recover): {err}");
        }
    }

    /// Stop the consumer. The segment currently in flight reaches a terminal
    /// on-disk state before this returns; nothing is abandoned
    /// mid-`processing`.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("transcription worker panicked: {err}");
            }
        }
    }
}

async fn consume_loop(
    dir: PathBuf,
    source: String,
    config: WorkerConfig,
    mut processor: SegmentProcessor,
    mut notices: mpsc::Receiver<SegmentNotice>,
    running: Arc<AtomicBool>,
) {
    info!("transcription worker started for {}", dir.display());

    let indexer = FileIndexer::new(&dir);
    let mut queue = WorkQueue::new();
    let mut notices_open = true;

    // Pick up segments that were already on disk before the worker started
    for entry in indexer.list_pending() {
        queue.enqueue(entry.path, entry.index);
    }

    while running.load(Ordering::SeqCst) {
        // Drain notifications into the ordered queue
        while let Ok(notice) = notices.try_recv() {
            queue.enqueue(notice.path, notice.index);
        }

        if let Some((index, path)) = queue.pop() {
            match processor.process(&path, index).await {
                SegmentOutcome::Completed => {
                    queue.processed.insert(index);
                    queue.retries.remove(&index);
                }
                SegmentOutcome::Vanished => {}
                SegmentOutcome::EngineFailed => {
                    let attempts = queue.retries.entry(index).or_insert(0);
                    *attempts += 1;
                    if *attempts >= config.max_engine_retries {
                        warn!(
                            "{} segment {index:06}: giving up after {attempts} failed \
                             attempts; file stays pending on disk",
                            source
                        );
                        queue.processed.insert(index);
                    }
                    // Otherwise the next rescan finds the reverted file
                }
            }
            continue;
        }

        // Idle: wait for a notice or fall back to a bounded poll + rescan
        if notices_open {
            tokio::select! {
                notice = notices.recv() => match notice {
                    Some(notice) => {
                        queue.enqueue(notice.path, notice.index);
                        continue;
                    }
                    None => notices_open = false,
                },
                _ = sleep(config.poll_interval) => {}
            }
        } else {
            sleep(config.poll_interval).await;
        }

        for entry in indexer.list_pending() {
            if queue.enqueue(entry.path.clone(), entry.index) {
                debug!("rescan enqueued segment {:06}", entry.index);
            }
        }
    }

    info!("transcription worker stopped for {}", dir.display());
}
