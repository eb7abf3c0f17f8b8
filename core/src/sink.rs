//! Frame persistence.
//!
//! Writes each received frame under the session output root, and the final
//! `metadata.txt` summary. Artifact names come off the wire, so every name
//! is validated before a path is built from it; anything that could escape
//! the output root is rejected.

use crate::error::{Outcome, PersistenceError};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Name of the per-session summary record.
pub const SUMMARY_FILE_NAME: &str = "metadata.txt";

/// Final accounting of one session, persisted exactly once.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub outcome: Outcome,
    pub frames_received: u64,
    /// `None` when neither the control phase nor a `complete` message
    /// supplied a total (receive-only sessions that never finish cleanly)
    pub frames_expected: Option<u64>,
}

pub struct FrameSink {
    root: PathBuf,
}

impl FrameSink {
    /// Create the sink, ensuring the output root exists.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one frame with create-or-overwrite semantics, so re-delivery
    /// of the same name is idempotent. The file is fsynced before
    /// returning: the summary's counts must hold even if the process dies
    /// right after.
    pub async fn write_frame(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, PersistenceError> {
        let relative = safe_artifact_path(name)?;
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(path)
    }

    /// Write the one-per-session summary record. Called on every terminal
    /// path, whatever the outcome.
    pub async fn write_summary(
        &self,
        summary: &TransferSummary,
    ) -> Result<PathBuf, PersistenceError> {
        let path = self.root.join(SUMMARY_FILE_NAME);
        let expected = summary
            .frames_expected
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let destination = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());

        let body = format!(
            "Outcome: {}\nFrames Received: {}\nTotal Expected: {}\nOutput Directory: {}\n",
            summary.outcome.label(),
            summary.frames_received,
            expected,
            destination.display(),
        );

        let mut file = fs::File::create(&path).await?;
        file.write_all(body.as_bytes()).await?;
        file.sync_all().await?;
        Ok(path)
    }
}

/// Validate a wire-supplied artifact name. Only plain relative components
/// are allowed; absolute paths, `..`, and platform prefixes are rejected.
fn safe_artifact_path(name: &str) -> Result<PathBuf, PersistenceError> {
    let path = Path::new(name);
    if name.is_empty() || path.is_absolute() {
        return Err(PersistenceError::UnsafeName {
            name: name.to_string(),
        });
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(PersistenceError::UnsafeName {
                    name: name.to_string(),
                })
            }
        }
    }
    Ok(path.to_path_buf())
}
