//! Summary job lifecycle.
//!
//! A job moves `Submitted -> Transcribing (audio only) -> Summarizing ->
//! PendingApproval -> Approved -> Delivered`; `Error` is reachable from
//! any non-terminal state and carries the captured failure description.
//! Transitions are driven externally; this module owns their legality and
//! the elapsed-time bookkeeping on delivery.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque job identifier, the sole external handle to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What kind of upload produced the job's transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Audio that still needs transcription before summarization.
    AudioUpload,
    /// Plain text, ready to summarize.
    TextUpload,
}

/// Lifecycle state of a summary job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Transcribing,
    Summarizing,
    PendingApproval,
    Approved,
    Delivered,
    Error { message: String },
}

impl JobStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Delivered | JobStatus::Error { .. })
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition(&self, next: &JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (_, Error { .. }) => !self.is_terminal(),
            (Submitted, Transcribing) => true,
            // Text uploads skip the transcription stage.
            (Submitted, Summarizing) => true,
            (Transcribing, Summarizing) => true,
            (Summarizing, PendingApproval) => true,
            (PendingApproval, Approved) => true,
            (Approved, Delivered) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Submitted => write!(f, "submitted"),
            JobStatus::Transcribing => write!(f, "transcribing"),
            JobStatus::Summarizing => write!(f, "summarizing"),
            JobStatus::PendingApproval => write!(f, "pending_approval"),
            JobStatus::Approved => write!(f, "approved"),
            JobStatus::Delivered => write!(f, "delivered"),
            JobStatus::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// One unit of summarization work.
///
/// Owned by the job store and mutated through partial updates; the
/// pipeline side only ever works on a read copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryJob {
    pub id: JobId,
    pub user_email: String,
    pub source: SourceKind,
    pub transcript_file: Option<PathBuf>,
    pub summary_file: Option<PathBuf>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub elapsed: Option<String>,
    pub status: JobStatus,
}

impl SummaryJob {
    pub fn new(user_email: &str, source: SourceKind) -> Self {
        Self {
            id: JobId::new(),
            user_email: user_email.to_string(),
            source,
            transcript_file: None,
            summary_file: None,
            summary: None,
            created_at: Utc::now(),
            sent_at: None,
            elapsed: None,
            status: JobStatus::Submitted,
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: JobStatus) -> Result<(), crate::error::SummarizeError> {
        if !self.status.can_transition(&next) {
            return Err(crate::error::SummarizeError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record a failure description. A job already in a terminal state
    /// keeps its status.
    pub fn fail(&mut self, description: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Error {
                message: description.into(),
            };
        }
    }
}

/// Human-readable duration between submission and delivery.
///
/// A `sent_at` earlier than `created_at` is a data anomaly and reports the
/// zero duration rather than a negative one.
pub fn format_elapsed(created_at: DateTime<Utc>, sent_at: DateTime<Utc>) -> String {
    let seconds = (sent_at - created_at).num_seconds().max(0);
    format!(
        "{:02} hours, {:02} minutes, {:02} seconds",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
