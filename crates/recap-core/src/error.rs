//! Error taxonomy for the summarization core.
//!
//! Two layers: [`BackendError`] classifies a single completion call
//! (transient failures are eligible for retry, fatal ones are not), and
//! [`SummarizeError`] is the job-level taxonomy recorded onto a job when
//! processing stops.

use crate::job::JobId;

/// Failure of a single completion API call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// Rate limiting or a transient API failure. Retried up to the policy
    /// ceiling before becoming terminal for the call.
    #[error("transient upstream failure: {0}")]
    Transient(String),

    /// The request was rejected and retrying the same request cannot help
    /// (bad credentials, malformed request, unexpected response shape).
    #[error("completion request rejected: {0}")]
    Fatal(String),
}

impl BackendError {
    /// Retryable-condition predicate used by the retry policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// Job-level errors. Every variant is terminal for the job it occurs in;
/// the service records the description onto the job's status field.
#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    /// The transcript was empty before any completion call was made.
    #[error("transcript is empty")]
    EmptyTranscript,

    /// A required prompt string is absent from the configuration.
    #[error("missing prompt configuration: {0}")]
    MissingPrompt(&'static str),

    /// The configuration is structurally invalid (budget arithmetic,
    /// concurrency cap, model identifier).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A completion call failed after the retry ceiling was exhausted, or
    /// failed fatally on the first attempt.
    #[error("completion call failed: {0}")]
    Upstream(#[from] BackendError),

    /// All calls succeeded but the final summary text is empty.
    #[error("model returned an empty summary")]
    EmptySummary,

    /// No job record exists for the given id.
    #[error("job {0} not found")]
    JobNotFound(JobId),

    /// A state transition the lifecycle does not allow.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Reading or writing a job record or an artifact file failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Handing a composed mail to the transport failed.
    #[error("delivery error: {0}")]
    Delivery(String),
}
