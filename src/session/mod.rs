//! Recording session management
//!
//! A session is one recording run rooted at one directory, with a
//! subdirectory per audio source. `RecordingPipeline` is the owning context
//! for everything long-lived: per-source recorders, workers and the shared
//! transcript sink.

pub mod paths;
pub mod pipeline;
pub mod stats;

pub use paths::{is_session_dir, SessionPaths, SESSION_PREFIX};
pub use pipeline::{CompletionGate, RecordingPipeline};
pub use stats::{PipelineStats, SourceStats};
