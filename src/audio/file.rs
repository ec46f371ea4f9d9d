use async_trait::async_trait;
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::{AudioBackend, AudioFrame, CaptureConfig, CaptureError};

/// WAV file metadata probe.
///
/// Used by the transcription side to compute a segment's actual time range;
/// only the header is read, never the sample data.
pub struct AudioFile {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let duration_seconds = reader.duration() as f64 / spec.sample_rate as f64;

        Ok(Self {
            path: path.to_path_buf(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }
}

/// Backend that replays a WAV file as a live frame stream.
///
/// Frames are paced at the configured buffer duration so the rest of the
/// pipeline sees the same timing a device source would produce.
pub struct WavFileBackend {
    path: PathBuf,
    config: CaptureConfig,
    capturing: Arc<AtomicBool>,
}

impl WavFileBackend {
    pub fn new(path: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            path: path.into(),
            config,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl AudioBackend for WavFileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let reader = WavReader::open(&self.path)
            .map_err(|e| CaptureError::Format(format!("{}: {}", self.path.display(), e)))?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CaptureError::Format(e.to_string()))?;

        info!(
            "replaying {}: {} samples at {} Hz, {} channels",
            self.path.display(),
            samples.len(),
            spec.sample_rate,
            spec.channels
        );

        let (tx, rx) = mpsc::channel(64);
        let buffer_ms = self.config.buffer_duration_ms.max(1);
        let samples_per_frame =
            (spec.sample_rate as u64 * spec.channels as u64 * buffer_ms / 1000).max(1) as usize;

        self.capturing.store(true, Ordering::SeqCst);
        let capturing = Arc::clone(&self.capturing);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(buffer_ms));
            let mut timestamp_ms = 0u64;

            for chunk in samples.chunks(samples_per_frame) {
                ticker.tick().await;
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate: spec.sample_rate,
                    channels: spec.channels,
                    timestamp_ms,
                };
                timestamp_ms += buffer_ms;

                if tx.send(frame).await.is_err() {
                    warn!("frame receiver dropped, stopping file replay");
                    break;
                }
            }

            capturing.store(false, Ordering::SeqCst);
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
