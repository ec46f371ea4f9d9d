// Shared helpers for the integration tests: a scripted engine, a
// channel-driven capture backend and small filesystem utilities.
#![allow(dead_code)]

use async_trait::async_trait;
use callscribe::audio::{AudioBackend, AudioFrame, CaptureError};
use callscribe::segment::state;
use callscribe::transcribe::{EngineError, Transcription, TranscriptionEngine};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted engine response.
#[derive(Clone)]
pub enum Step {
    Text(String),
    Fail(String),
}

/// Transcription engine scripted per segment index.
///
/// Steps queue up per index; the last step repeats once the queue is
/// exhausted, so `fail` alone means "fails forever" and `fail` + `text`
/// means "fails once, then succeeds". Calls are recorded in arrival order.
pub struct ScriptedEngine {
    steps: Mutex<HashMap<u64, Vec<Step>>>,
    default_text: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<u64>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(HashMap::new()),
            default_text: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default(text: &str) -> Self {
        let mut engine = Self::new();
        engine.default_text = Some(text.to_string());
        engine
    }

    /// Add a per-call delay, to make in-flight windows observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, index: u64, text: &str) -> Self {
        self.steps
            .lock()
            .unwrap()
            .entry(index)
            .or_default()
            .push(Step::Text(text.to_string()));
        self
    }

    pub fn fail(self, index: u64) -> Self {
        self.steps
            .lock()
            .unwrap()
            .entry(index)
            .or_default()
            .push(Step::Fail("scripted failure".to_string()));
        self
    }

    /// Segment indices in the order the engine saw them.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionEngine for ScriptedEngine {
    async fn transcribe(&self, path: &Path) -> Result<Transcription, EngineError> {
        let index = state::segment_index(path).unwrap_or(0);
        self.calls.lock().unwrap().push(index);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = {
            let mut steps = self.steps.lock().unwrap();
            match steps.get_mut(&index) {
                Some(queue) if queue.len() > 1 => Some(queue.remove(0)),
                Some(queue) => queue.first().cloned(),
                None => None,
            }
        };

        match step {
            Some(Step::Text(text)) => Ok(Transcription {
                text,
                confidence: 0.9,
            }),
            Some(Step::Fail(msg)) => Err(EngineError::Inference(msg)),
            None => match &self.default_text {
                Some(text) => Ok(Transcription {
                    text: text.clone(),
                    confidence: 0.9,
                }),
                None => Err(EngineError::Inference("no scripted response".to_string())),
            },
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Capture backend fed by a test-owned channel. Dropping the test's sender
/// ends the stream, which is how these tests model "device stopped".
pub struct ChannelBackend {
    rx: Option<mpsc::Receiver<AudioFrame>>,
    capturing: bool,
}

impl ChannelBackend {
    pub fn new(rx: mpsc::Receiver<AudioFrame>) -> Self {
        Self {
            rx: Some(rx),
            capturing: false,
        }
    }
}

#[async_trait]
impl AudioBackend for ChannelBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        self.capturing = true;
        self.rx
            .take()
            .ok_or_else(|| CaptureError::Device("already started".to_string()))
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// A frame of silence.
pub fn silent_frame(samples: usize, sample_rate: u32, timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![0i16; samples],
        sample_rate,
        channels: 1,
        timestamp_ms,
    }
}

/// Create a `pending` segment file whose content is not valid WAV, so the
/// duration probe falls back to the configured chunk duration.
pub fn write_pending_stub(dir: &Path, index: u64) -> PathBuf {
    let path = state::pending_path(dir, index);
    std::fs::write(&path, b"not really audio").unwrap();
    path
}

/// Write a real mono 16-bit WAV of the given duration.
pub fn write_wav(path: &Path, secs: f64, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..(secs * sample_rate as f64) as usize {
        writer.write_sample((i % 128) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Transcript lines with the wall-clock stamp stripped, i.e. everything
/// after the first "] ".
pub fn transcript_bodies(path: &Path) -> Vec<String> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    content
        .lines()
        .map(|line| match line.find("] ") {
            Some(pos) => line[pos + 2..].to_string(),
            None => line.to_string(),
        })
        .collect()
}

/// Names of all segment-like files in a directory, sorted.
pub fn segment_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|n| n.ends_with(".wav"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Poll `cond` every 25 ms until it holds or `timeout` elapses.
pub async fn wait_for<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
