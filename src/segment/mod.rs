//! On-disk segment lifecycle
//!
//! A segment's state lives in its filename, so the session directory itself
//! is the durable state store shared by the recorder (producer) and the
//! transcription worker (consumer). The atomic rename is the only
//! synchronization primitive between the two.

pub mod indexer;
pub mod state;

pub use indexer::{FileIndexer, SegmentEntry};
pub use state::{SegmentState, TransitionOutcome};
