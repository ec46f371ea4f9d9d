use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Directory-name prefix shared by the session creator and the recovery
/// scanner; the timestamp that follows makes names sort oldest-first.
pub const SESSION_PREFIX: &str = "session_";

/// Filesystem layout of one recording run: a unique root directory with one
/// subdirectory per audio source.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub root: PathBuf,
    sources: Vec<(String, PathBuf)>,
}

impl SessionPaths {
    /// Create a fresh session directory under `base` with a subdirectory for
    /// each named source (e.g. `mic`, `system`). The name embeds a timestamp
    /// and a uuid suffix, so a session directory is never reused.
    pub fn create(base: &Path, source_names: &[String]) -> Result<Self> {
        let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
        let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_string();
        let root = base.join(format!("{SESSION_PREFIX}{stamp}_{suffix}"));

        let mut sources = Vec::with_capacity(source_names.len());
        for name in source_names {
            let dir = root.join(name);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            sources.push((name.clone(), dir));
        }

        info!("session directory: {}", root.display());
        Ok(Self { root, sources })
    }

    pub fn sources(&self) -> &[(String, PathBuf)] {
        &self.sources
    }

    pub fn source_dir(&self, name: &str) -> Option<&Path> {
        self.sources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.as_path())
    }

    /// Best-effort rollback, used when a source fails to start after the
    /// directory was created.
    pub fn remove(&self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// Whether a path looks like a session directory created by this pipeline.
pub fn is_session_dir(path: &Path) -> bool {
    path.is_dir()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(SESSION_PREFIX))
            .unwrap_or(false)
}
