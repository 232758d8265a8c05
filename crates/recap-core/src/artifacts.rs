//! Artifact files for transcripts and summaries.
//!
//! Each saved text lands under the store root as a timestamped file
//! (`Transcript_2024-05-01_09-30-00.txt`, `Summary_...`), the paths the
//! delivery mails attach.

use std::path::PathBuf;

use chrono::Utc;

use crate::error::SummarizeError;

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default artifact root under the local data directory.
    pub fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recap")
    }

    /// Write a transcript file, returning its path.
    pub async fn save_transcript(&self, text: &str) -> Result<PathBuf, SummarizeError> {
        self.save("transcripts", "Transcript", text).await
    }

    /// Write a summary file, returning its path.
    pub async fn save_summary(&self, text: &str) -> Result<PathBuf, SummarizeError> {
        self.save("summaries", "Summary", text).await
    }

    async fn save(&self, subdir: &str, prefix: &str, text: &str) -> Result<PathBuf, SummarizeError> {
        let dir = self.root.join(subdir);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            SummarizeError::Storage(format!("failed to create {}: {}", dir.display(), e))
        })?;

        let filename = format!("{}_{}.txt", prefix, Utc::now().format("%Y-%m-%d_%H-%M-%S"));
        let path = dir.join(filename);
        tokio::fs::write(&path, text).await.map_err(|e| {
            SummarizeError::Storage(format!("failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), chars = text.len(), "Artifact written");
        Ok(path)
    }
}
