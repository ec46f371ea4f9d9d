use std::io;
use std::path::{Path, PathBuf};

/// Lifecycle state of a segment, encoded in its filename.
///
/// Progression is total and never skips a step:
/// `pending -> processing -> done -> deleting -> (removed)`.
/// The recorder creates `pending` files; the transcription worker owns every
/// transition from `processing` onward. The filename is the only durable
/// record of state, so transitions are renames, never copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentState {
    /// Finalized by the recorder, waiting for transcription
    Pending,
    /// Claimed by exactly one worker
    Processing,
    /// Transcription finished successfully
    Done,
    /// Captured for removal; unlink may be retried safely
    Deleting,
}

impl SegmentState {
    /// Filename token carrying this state, e.g. `segment_000001.pending.wav`.
    pub fn token(&self) -> &'static str {
        match self {
            SegmentState::Pending => ".pending.",
            SegmentState::Processing => ".processing.",
            SegmentState::Done => ".done.",
            SegmentState::Deleting => ".deleting.",
        }
    }

    /// Derive the state from a path. Returns `None` for raw capture files
    /// and anything else that carries no state token.
    pub fn from_path(path: &Path) -> Option<SegmentState> {
        let name = path.file_name()?.to_str()?;
        if name.contains(".pending.") {
            Some(SegmentState::Pending)
        } else if name.contains(".processing.") {
            Some(SegmentState::Processing)
        } else if name.contains(".done.") {
            Some(SegmentState::Done)
        } else if name.contains(".deleting.") {
            Some(SegmentState::Deleting)
        } else {
            None
        }
    }
}

/// Path of the raw in-progress capture file for `index`.
pub fn raw_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("raw_segment_{index:06}.wav"))
}

/// Path of the `pending` form for `index`.
pub fn pending_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("segment_{index:06}.pending.wav"))
}

/// `pending` -> `processing` destination for a pending path.
pub fn processing_path(pending: &Path) -> PathBuf {
    swap_token(pending, ".pending.", ".processing.")
}

/// `processing` -> `done` destination for a processing path.
pub fn done_path(processing: &Path) -> PathBuf {
    swap_token(processing, ".processing.", ".done.")
}

/// `done` -> `deleting` destination for a done path.
pub fn deleting_path(done: &Path) -> PathBuf {
    swap_token(done, ".done.", ".deleting.")
}

/// `processing` -> `pending` destination, used to revert a claim after an
/// engine failure.
pub fn pending_sibling(processing: &Path) -> PathBuf {
    swap_token(processing, ".processing.", ".pending.")
}

/// Extract the sequence index from any segment filename form.
pub fn segment_index(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Rewrite a state token in the file name only; pure, same input always
/// yields the same output.
fn swap_token(path: &Path, from: &str, to: &str) -> PathBuf {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => path.with_file_name(name.replace(from, to)),
        None => path.to_path_buf(),
    }
}

/// Result of attempting a rename-based state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The rename happened now
    Moved,
    /// The destination already exists; a previous attempt got there first
    AlreadyApplied,
    /// Neither source nor destination exists; the segment was handled
    /// elsewhere or removed
    Vanished,
}

/// Advance a segment by atomically renaming `from` to `to`.
///
/// Idempotent under crash-and-retry: a rename that fails because the
/// destination is already in place reports `AlreadyApplied`, and a rename
/// whose source and destination are both missing reports `Vanished`. Only an
/// error with the source still on disk is surfaced as an I/O error.
pub fn advance(from: &Path, to: &Path) -> io::Result<TransitionOutcome> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(TransitionOutcome::Moved),
        Err(err) => {
            if to.exists() {
                Ok(TransitionOutcome::AlreadyApplied)
            } else if !from.exists() {
                Ok(TransitionOutcome::Vanished)
            } else {
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn transition_paths_round_trip() {
        let dir = PathBuf::from("/tmp/session/mic");
        let pending = pending_path(&dir, 3);
        let processing = processing_path(&pending);
        assert_eq!(
            processing,
            dir.join("segment_000003.processing.wav")
        );
        assert_eq!(pending_sibling(&processing), pending);
        assert_eq!(
            deleting_path(&done_path(&processing)),
            dir.join("segment_000003.deleting.wav")
        );
    }

    #[test]
    fn state_from_filename_token() {
        let dir = PathBuf::from("/x");
        assert_eq!(
            SegmentState::from_path(&pending_path(&dir, 1)),
            Some(SegmentState::Pending)
        );
        assert_eq!(
            SegmentState::from_path(&dir.join("segment_000001.done.wav")),
            Some(SegmentState::Done)
        );
        assert_eq!(SegmentState::from_path(&raw_path(&dir, 1)), None);
        assert_eq!(SegmentState::from_path(&dir.join("notes.txt")), None);
    }

    #[test]
    fn index_parses_from_every_form() {
        let dir = PathBuf::from("/x");
        assert_eq!(segment_index(&raw_path(&dir, 42)), Some(42));
        assert_eq!(segment_index(&pending_path(&dir, 123456)), Some(123456));
        assert_eq!(
            segment_index(&dir.join("segment_000007.deleting.wav")),
            Some(7)
        );
        assert_eq!(segment_index(&dir.join("transcript.txt")), None);
    }
}
