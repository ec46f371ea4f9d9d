//! Transcription side of the pipeline
//!
//! One serialized worker per source directory claims `pending` segments via
//! rename, runs them through the engine, filters recognizer noise, appends
//! accepted text to the sink, and walks each file to the end of its
//! lifecycle.

pub mod engine;
pub mod filter;
pub mod sink;
pub mod worker;

pub use engine::{CommandEngine, EngineError, Transcription, TranscriptionEngine};
pub use filter::NoiseFilter;
pub use sink::{TimeRange, TranscriptSink, TranscriptWriter};
pub use worker::{SegmentOutcome, SegmentProcessor, TranscriptionWorker, WorkerConfig};
