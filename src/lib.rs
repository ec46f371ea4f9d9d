pub mod audio;
pub mod backfill;
pub mod config;
pub mod segment;
pub mod session;
pub mod transcribe;

pub use audio::{
    AudioBackend, AudioBackendFactory, AudioFile, AudioFrame, AudioSource, CaptureConfig,
    CaptureError, RecorderConfig, SegmentNotice, SegmentRecorder, WavFileBackend,
};
pub use backfill::RecoveryReport;
pub use config::Config;
pub use segment::{FileIndexer, SegmentEntry, SegmentState, TransitionOutcome};
pub use session::{CompletionGate, PipelineStats, RecordingPipeline, SessionPaths, SourceStats};
pub use transcribe::{
    CommandEngine, EngineError, NoiseFilter, SegmentOutcome, SegmentProcessor, TimeRange,
    Transcription, TranscriptionEngine, TranscriptionWorker, TranscriptSink, TranscriptWriter,
    WorkerConfig,
};
