use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{error, info};

use super::backend::{AudioBackend, AudioFrame, CaptureConfig, CaptureError};

/// Microphone backend on top of cpal's default host.
///
/// `cpal::Stream` is not `Send`, so the stream lives on a dedicated thread
/// for the whole capture; the device callback batches samples into
/// frame-sized chunks and hands them to the async side over the channel.
/// Device rate and channel count win over the configured targets; the
/// recorder writes whatever the device delivers.
pub struct MicBackend {
    config: CaptureConfig,
    capture_thread: Option<std::thread::JoinHandle<()>>,
    capturing: Arc<AtomicBool>,
}

impl MicBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            capture_thread: None,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct FrameBatcher {
    buf: Vec<i16>,
    samples_per_frame: usize,
    sample_rate: u32,
    channels: u16,
    timestamp_ms: u64,
    frame_ms: u64,
    tx: mpsc::Sender<AudioFrame>,
}

impl FrameBatcher {
    fn push(&mut self, samples: &[i16]) {
        self.buf.extend_from_slice(samples);
        while self.buf.len() >= self.samples_per_frame {
            let rest = self.buf.split_off(self.samples_per_frame);
            let frame = AudioFrame {
                samples: std::mem::replace(&mut self.buf, rest),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: self.timestamp_ms,
            };
            self.timestamp_ms += self.frame_ms;
            // Device callback context: never block, drop on backpressure
            if self.tx.try_send(frame).is_err() {
                error!("frame channel full, dropping microphone audio");
            }
        }
    }
}

fn run_capture(
    frame_ms: u64,
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: std_mpsc::Sender<Result<(), CaptureError>>,
    capturing: Arc<AtomicBool>,
) {
    let build = || -> Result<cpal::Stream, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("input device: {}", device_name);

        let stream_config = device
            .default_input_config()
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        let sample_rate = stream_config.sample_rate().0;
        let channels = stream_config.channels();
        let samples_per_frame =
            (sample_rate as u64 * channels as u64 * frame_ms / 1000).max(1) as usize;

        let batcher = Arc::new(Mutex::new(FrameBatcher {
            buf: Vec::with_capacity(samples_per_frame),
            samples_per_frame,
            sample_rate,
            channels,
            timestamp_ms: 0,
            frame_ms,
            tx: frame_tx,
        }));

        let err_fn = |err| error!("an error occurred on stream: {}", err);

        let stream = match stream_config.sample_format() {
            cpal::SampleFormat::I16 => {
                let batcher = Arc::clone(&batcher);
                device.build_input_stream(
                    &stream_config.into(),
                    move |data: &[i16], _: &_| {
                        if let Ok(mut b) = batcher.lock() {
                            b.push(data);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::F32 => {
                let batcher = Arc::clone(&batcher);
                device.build_input_stream(
                    &stream_config.into(),
                    move |data: &[f32], _: &_| {
                        let converted: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        if let Ok(mut b) = batcher.lock() {
                            b.push(&converted);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => return Err(CaptureError::Format(format!("{other:?}"))),
        }
        .map_err(|e| CaptureError::Device(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::Device(e.to_string()))?;
        Ok(stream)
    };

    match build() {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            while capturing.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            drop(stream);
        }
        Err(err) => {
            let _ = ready_tx.send(Err(err));
        }
    }
}

#[async_trait]
impl AudioBackend for MicBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(CaptureError::Device("already capturing".into()));
        }

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let frame_ms = self.config.buffer_duration_ms.max(1);

        self.capturing.store(true, Ordering::SeqCst);
        let capturing = Arc::clone(&self.capturing);
        let handle =
            std::thread::spawn(move || run_capture(frame_ms, frame_tx, ready_tx, capturing));

        let started = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| CaptureError::Device(e.to_string()))?
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        match started {
            Ok(()) => {
                self.capture_thread = Some(handle);
                Ok(frame_rx)
            }
            Err(err) => {
                self.capturing.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(err)
            }
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.take() {
            // Thread drops the stream, which closes the frame channel
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}
