use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncWriteExt;

/// Wall-clock range covered by one segment, derived from its sequence index
/// and chunk duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeRange {
    /// Range for a 1-based sequence index: segment 2 at 10s chunks covers
    /// `[00:00:10-00:00:20]`.
    pub fn for_segment(index: u64, chunk_secs: f64) -> Self {
        let start = (index.saturating_sub(1) as f64 * chunk_secs).max(0.0);
        Self {
            start_secs: start,
            end_secs: start + chunk_secs,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", hhmmss(self.start_secs), hhmmss(self.end_secs))
    }
}

fn hhmmss(secs: f64) -> String {
    let t = secs.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", t / 3600, (t % 3600) / 60, t % 60)
}

/// Append-only destination for accepted transcription text.
///
/// Writes are best-effort: the pipeline logs failures and keeps going, so an
/// implementation should not retry internally.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Append one accepted line for a source, in the order delivered.
    async fn append(&self, source: &str, range: TimeRange, text: &str) -> Result<()>;

    /// Append an out-of-band marker line (session start/stop, backfill
    /// brackets).
    async fn append_marker(&self, source: &str, text: &str) -> Result<()>;
}

/// File-backed sink: one `transcript.txt` per source directory under the
/// session root, each line stamped with wall-clock time.
pub struct TranscriptWriter {
    session_root: PathBuf,
    lines_written: AtomicUsize,
}

impl TranscriptWriter {
    pub fn new(session_root: impl Into<PathBuf>) -> Self {
        Self {
            session_root: session_root.into(),
            lines_written: AtomicUsize::new(0),
        }
    }

    /// Number of lines appended so far, markers included.
    pub fn lines_written(&self) -> usize {
        self.lines_written.load(Ordering::Relaxed)
    }

    async fn append_line(&self, source: &str, body: &str) -> Result<()> {
        let path = self.session_root.join(source).join("transcript.txt");
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let line = format!("[{stamp}] {body}\n");

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open transcript {}", path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("failed to append transcript line")?;

        self.lines_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl TranscriptSink for TranscriptWriter {
    async fn append(&self, source: &str, range: TimeRange, text: &str) -> Result<()> {
        self.append_line(source, &format!("{range} {text}")).await
    }

    async fn append_marker(&self, source: &str, text: &str) -> Result<()> {
        self.append_line(source, text).await
    }
}
