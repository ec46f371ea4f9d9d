use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of one recording pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Session root directory
    pub session: String,

    /// Whether capture is currently active
    pub is_recording: bool,

    /// When the pipeline started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Per-source counters
    pub sources: Vec<SourceStats>,

    /// Transcript lines appended across all sources, markers included
    pub transcript_lines: usize,
}

/// Counters for one audio source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub name: String,

    /// Segments finalized to `pending` by the recorder
    pub segments_recorded: usize,
}
