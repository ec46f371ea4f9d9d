pub mod backend;
pub mod file;
pub mod recorder;

#[cfg(feature = "mic")]
pub mod mic;

pub use backend::{
    AudioBackend, AudioBackendFactory, AudioFrame, AudioSource, CaptureConfig, CaptureError,
};
pub use file::{AudioFile, WavFileBackend};
pub use recorder::{RecorderConfig, SegmentNotice, SegmentRecorder};
