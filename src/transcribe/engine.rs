use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Result of transcribing one audio file.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

/// Failures at the speech-recognition boundary.
///
/// The pipeline treats every variant the same way — revert the segment to
/// pending and retry later — but callers that own the engine can still match
/// on the cause.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("audio file error")]
    Io(#[from] std::io::Error),
}

/// The speech-to-text engine, consumed as an opaque capability: given an
/// audio file, return text and a confidence score, or fail.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(&self, path: &Path) -> Result<Transcription, EngineError>;

    /// Engine name for logging
    fn name(&self) -> &str {
        "engine"
    }
}

/// Adapter that runs an external recognizer command per segment.
///
/// The command is invoked as `<program> <args...> <wav-path>`; its stdout is
/// the transcript. A non-zero exit is an inference failure with stderr as the
/// cause. Command-line recognizers report no confidence, so it is fixed at
/// 1.0.
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl TranscriptionEngine for CommandEngine {
    async fn transcribe(&self, path: &Path) -> Result<Transcription, EngineError> {
        debug!("running {} on {}", self.program, path.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .await
            .map_err(|e| EngineError::Unavailable(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Inference(stderr.trim().to_string()));
        }

        Ok(Transcription {
            text: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            confidence: 1.0,
        })
    }

    fn name(&self) -> &str {
        &self.program
    }
}
