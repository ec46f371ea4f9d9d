use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate in Hz
    pub sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Frame size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100, // Linear PCM at 44.1 kHz, maximally compatible
            channels: 1,         // Mono
            buffer_duration_ms: 100,
        }
    }
}

/// Failures starting or running audio capture. Fatal to starting a session;
/// never retried automatically.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device available")]
    NoDevice,

    #[error("input device error: {0}")]
    Device(String),

    #[error("unsupported sample format: {0}")]
    Format(String),

    #[error("microphone capture not built in (enable the `mic` feature)")]
    NotBuilt,

    #[error("audio file error")]
    Io(#[from] std::io::Error),
}

/// Audio capture backend trait
///
/// Implementations deliver frames over a channel until stopped:
/// - `MicBackend`: cpal input device (behind the `mic` feature)
/// - `WavFileBackend`: replay a WAV file (batch processing, tests)
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. Dropping
    /// the sender side (on stop) ends the stream.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Microphone input
    Microphone,
    /// File input (batch processing, tests)
    File(PathBuf),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    pub fn create(
        source: AudioSource,
        config: CaptureConfig,
    ) -> Result<Box<dyn AudioBackend>, CaptureError> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "mic")]
                {
                    Ok(Box::new(super::mic::MicBackend::new(config)))
                }

                #[cfg(not(feature = "mic"))]
                {
                    let _ = config;
                    Err(CaptureError::NotBuilt)
                }
            }

            AudioSource::File(path) => {
                Ok(Box::new(super::file::WavFileBackend::new(path, config)))
            }
        }
    }
}
