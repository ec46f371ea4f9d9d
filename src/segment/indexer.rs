use std::path::{Path, PathBuf};
use tracing::warn;

use super::state::{self, SegmentState};

/// One segment discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    pub path: PathBuf,
    pub index: u64,
}

/// Enumerates a source directory and returns segments eligible for work.
///
/// Every call is a fresh snapshot; nothing is cached, so the indexer is safe
/// to call repeatedly while the recorder and worker keep renaming files
/// underneath it.
pub struct FileIndexer {
    dir: PathBuf,
}

impl FileIndexer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Segments waiting for transcription, ascending by sequence index.
    pub fn list_pending(&self) -> Vec<SegmentEntry> {
        self.list_in_state(SegmentState::Pending)
    }

    /// Segments in the given state, ascending by sequence index.
    ///
    /// Ordering is always by the index encoded in the filename — never by
    /// directory listing order and never by timestamps, which the rename
    /// transitions disturb.
    pub fn list_in_state(&self, wanted: SegmentState) -> Vec<SegmentEntry> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("failed to scan {}: {}", self.dir.display(), err);
                return Vec::new();
            }
        };

        let mut segments: Vec<SegmentEntry> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("wav"))
                    .unwrap_or(false)
            })
            .filter(|p| SegmentState::from_path(p) == Some(wanted))
            .filter_map(|p| state::segment_index(&p).map(|index| SegmentEntry { path: p, index }))
            .collect();

        segments.sort_by_key(|s| s.index);
        segments
    }
}
