//! Startup recovery of unfinished sessions
//!
//! A process killed mid-session leaves segments stranded in `pending` or
//! `processing`, and occasionally in `done`/`deleting` when the crash landed
//! inside the removal steps. The scanner sweeps prior session directories
//! and drains them with the same per-segment sequence the live worker uses,
//! so recovered output is identical to live output apart from the explicit
//! backfill markers around it.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::segment::state::{self, SegmentState, TransitionOutcome};
use crate::segment::FileIndexer;
use crate::session::paths::is_session_dir;
use crate::transcribe::engine::TranscriptionEngine;
use crate::transcribe::sink::TranscriptSink;
use crate::transcribe::worker::{self, SegmentOutcome, SegmentProcessor};
use crate::transcribe::TranscriptWriter;

/// Summary of one recovery sweep.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RecoveryReport {
    /// Prior session directories inspected
    pub sessions_scanned: usize,
    /// Sessions that actually contained unfinished segments
    pub sessions_recovered: usize,
    /// Segments drained through the engine
    pub segments_recovered: usize,
}

/// Drain every prior session under `base_dir`, oldest first by directory
/// name. Sessions with no unfinished segments are left untouched.
pub async fn run(
    base_dir: &Path,
    engine: Arc<dyn TranscriptionEngine>,
    chunk_duration: Duration,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    let entries = match std::fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to scan {}", base_dir.display()))
        }
    };

    let mut sessions: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| is_session_dir(p))
        .collect();
    sessions.sort();

    for session in sessions {
        report.sessions_scanned += 1;
        let recovered = recover_session(&session, Arc::clone(&engine), chunk_duration).await?;
        if recovered > 0 {
            report.sessions_recovered += 1;
            report.segments_recovered += recovered;
        }
    }

    Ok(report)
}

/// Drain one prior session. Returns the number of segments run through the
/// engine across all of its sources.
async fn recover_session(
    session_root: &Path,
    engine: Arc<dyn TranscriptionEngine>,
    chunk_duration: Duration,
) -> Result<usize> {
    let mut sources: Vec<PathBuf> = std::fs::read_dir(session_root)
        .with_context(|| format!("failed to scan {}", session_root.display()))?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    sources.sort();

    let sink: Arc<dyn TranscriptSink> = Arc::new(TranscriptWriter::new(session_root));
    let session_name = session_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("session");

    let mut recovered = 0;
    for source_dir in sources {
        recovered += recover_source(
            &source_dir,
            session_name,
            Arc::clone(&engine),
            Arc::clone(&sink),
            chunk_duration,
        )
        .await;
    }

    Ok(recovered)
}

async fn recover_source(
    source_dir: &Path,
    session_name: &str,
    engine: Arc<dyn TranscriptionEngine>,
    sink: Arc<dyn TranscriptSink>,
    chunk_duration: Duration,
) -> usize {
    let source = source_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("source")
        .to_string();
    let indexer = FileIndexer::new(source_dir);

    // Finish interrupted removals first; these produce no transcript output
    for entry in indexer.list_in_state(SegmentState::Deleting) {
        if let Err(err) = std::fs::remove_file(&entry.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove {}: {err}", entry.path.display());
            }
        }
    }
    for entry in indexer.list_in_state(SegmentState::Done) {
        worker::remove_done(&entry.path, entry.index);
    }

    // A segment stuck in `processing` was orphaned by a crash mid-claim;
    // hand it back to `pending` so it drains in index order with the rest
    for entry in indexer.list_in_state(SegmentState::Processing) {
        let back = state::pending_sibling(&entry.path);
        match state::advance(&entry.path, &back) {
            Ok(TransitionOutcome::Moved) => {
                info!("reverted orphaned segment {:06} to pending", entry.index)
            }
            Ok(_) => {}
            Err(err) => warn!(
                "failed to revert orphaned segment {:06}: {err}",
                entry.index
            ),
        }
    }

    let pending = indexer.list_pending();
    if pending.is_empty() {
        return 0;
    }

    info!(
        "backfill: {} unfinished segments in {}",
        pending.len(),
        source_dir.display()
    );

    let marker = format!("— backfill started for {session_name}/{source} —");
    if let Err(err) = sink.append_marker(&source, &marker).await {
        warn!("backfill marker write failed: {err:#}");
    }

    let mut processor =
        SegmentProcessor::new(source.clone(), engine, Arc::clone(&sink), chunk_duration);

    let mut drained = 0;
    for entry in pending {
        match processor.process(&entry.path, entry.index).await {
            SegmentOutcome::Completed => drained += 1,
            SegmentOutcome::Vanished => {}
            // Unlike the live worker there is no later poll to retry for us;
            // leave the segment pending for the next startup and move on
            SegmentOutcome::EngineFailed => {}
        }
    }

    if let Err(err) = sink.append_marker(&source, "— backfill finished —").await {
        warn!("backfill marker write failed: {err:#}");
    }

    drained
}
