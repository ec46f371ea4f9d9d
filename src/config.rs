use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::RecorderConfig;
use crate::transcribe::WorkerConfig;

/// Pipeline configuration. Defaults are overridden by an optional config
/// file, and the binary layers its CLI flags on top of that.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding session directories
    pub base_dir: PathBuf,

    /// Duration of each audio segment in seconds
    pub chunk_duration_secs: u64,

    /// Rotation overlap in milliseconds
    pub overlap_ms: u64,

    /// Worker idle rescan interval in seconds
    pub poll_interval_secs: u64,

    /// Sample rate written to segment files
    pub sample_rate: u32,

    /// Channel count written to segment files
    pub channels: u16,

    /// Engine failures tolerated per segment in one process run
    pub max_engine_retries: u32,

    /// Audio sources to record (subdirectory per source)
    pub sources: Vec<String>,

    /// External recognizer command; invoked as `<command> <args...> <wav>`
    pub engine_command: Option<String>,

    /// Extra arguments for the recognizer command
    pub engine_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("sessions"),
            chunk_duration_secs: 10,
            overlap_ms: 200,
            poll_interval_secs: 1,
            sample_rate: 44_100,
            channels: 1,
            max_engine_retries: 5,
            sources: vec!["mic".to_string()],
            engine_command: None,
            engine_args: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration, merging an optional config file over the
    /// defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            chunk_duration: Duration::from_secs(self.chunk_duration_secs),
            overlap: Duration::from_millis(self.overlap_ms),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            chunk_duration: Duration::from_secs(self.chunk_duration_secs),
            max_engine_retries: self.max_engine_retries,
        }
    }
}
