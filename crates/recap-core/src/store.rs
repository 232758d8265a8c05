//! Persistence and transcript-source seams.
//!
//! The core never owns job records: it reads them and issues single-row
//! partial updates keyed by job id, leaving atomicity to the store's own
//! per-row semantics. [`InMemoryJobStore`] is the shipped implementation,
//! sufficient for tests and single-process embedding.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::SummarizeError;
use crate::job::{JobId, JobStatus, SummaryJob};

/// Partial update applied to one job record. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub summary: Option<String>,
    pub summary_file: Option<PathBuf>,
    pub transcript_file: Option<PathBuf>,
    pub sent_at: Option<DateTime<Utc>>,
    pub elapsed: Option<String>,
}

impl JobUpdate {
    /// Update carrying only a status change.
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn apply(self, job: &mut SummaryJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(summary) = self.summary {
            job.summary = Some(summary);
        }
        if let Some(path) = self.summary_file {
            job.summary_file = Some(path);
        }
        if let Some(path) = self.transcript_file {
            job.transcript_file = Some(path);
        }
        if let Some(sent_at) = self.sent_at {
            job.sent_at = Some(sent_at);
        }
        if let Some(elapsed) = self.elapsed {
            job.elapsed = Some(elapsed);
        }
    }
}

/// Job record persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: SummaryJob) -> Result<(), SummarizeError>;

    async fn read_job(&self, id: JobId) -> Result<SummaryJob, SummarizeError>;

    /// Single-row conditional update keyed by job id.
    async fn update_job(&self, id: JobId, update: JobUpdate) -> Result<(), SummarizeError>;

    /// All jobs, for operator visibility.
    async fn list_jobs(&self) -> Result<Vec<SummaryJob>, SummarizeError>;
}

/// Source of the plain-text transcript for a job.
///
/// Audio transcription happens behind this seam; the pipeline only ever
/// sees UTF-8 text.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn transcript(&self, job: &SummaryJob) -> Result<String, SummarizeError>;
}

/// In-memory job store over a keyed map.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, SummaryJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_job(&self, job: SummaryJob) -> Result<(), SummarizeError> {
        self.jobs.write().await.insert(job.id, job);
        Ok(())
    }

    async fn read_job(&self, id: JobId) -> Result<SummaryJob, SummarizeError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SummarizeError::JobNotFound(id))
    }

    async fn update_job(&self, id: JobId, update: JobUpdate) -> Result<(), SummarizeError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(SummarizeError::JobNotFound(id))?;
        update.apply(job);
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<SummaryJob>, SummarizeError> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }
}

/// Transcript source that reads the job's stored transcript file.
pub struct FileTranscriptSource;

#[async_trait]
impl TranscriptSource for FileTranscriptSource {
    async fn transcript(&self, job: &SummaryJob) -> Result<String, SummarizeError> {
        let path = job
            .transcript_file
            .as_ref()
            .ok_or_else(|| SummarizeError::Storage("job has no transcript file".into()))?;

        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SummarizeError::Storage(format!("failed to read {}: {}", path.display(), e)))
    }
}
