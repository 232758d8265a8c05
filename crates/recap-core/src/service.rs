//! Job-level orchestration.
//!
//! [`SummaryService`] is the surface collaborators call: it drives a job
//! through the lifecycle, runs the pipeline, and invokes the store,
//! artifact, and delivery seams. Every taxonomy error is caught at this
//! boundary and recorded onto the job; one job's failure never aborts a
//! batch of others.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::delivery::{approval_mail, summary_mail, Delivery};
use crate::error::SummarizeError;
use crate::job::{format_elapsed, JobId, JobStatus, SourceKind, SummaryJob};
use crate::pipeline::SummarizationPipeline;
use crate::store::{JobStore, JobUpdate, TranscriptSource};

pub struct SummaryService {
    pipeline: SummarizationPipeline,
    store: Arc<dyn JobStore>,
    source: Arc<dyn TranscriptSource>,
    delivery: Arc<dyn Delivery>,
    artifacts: ArtifactStore,
    approval_url: String,
    reviewer_email: String,
}

impl SummaryService {
    pub fn new(
        config: &Config,
        pipeline: SummarizationPipeline,
        store: Arc<dyn JobStore>,
        source: Arc<dyn TranscriptSource>,
        delivery: Arc<dyn Delivery>,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            pipeline,
            store,
            source,
            delivery,
            artifacts,
            approval_url: config.approval_url.clone(),
            reviewer_email: config.reviewer_email.clone(),
        }
    }

    /// Create a job for an uploaded transcript and persist both.
    pub async fn submit(
        &self,
        user_email: &str,
        source: SourceKind,
        transcript_text: &str,
    ) -> Result<JobId, SummarizeError> {
        let mut job = SummaryJob::new(user_email, source);
        let path = self.artifacts.save_transcript(transcript_text).await?;
        job.transcript_file = Some(path);

        let id = job.id;
        self.store.insert_job(job).await?;
        info!(job_id = %id, user = user_email, "Job submitted");
        Ok(id)
    }

    /// Generate the summary for a job and leave it awaiting approval.
    ///
    /// Any failure is recorded onto the job's status before it is returned
    /// to the caller; the process keeps running either way.
    pub async fn generate_summary(&self, job_id: JobId) -> Result<String, SummarizeError> {
        match self.run_generate(job_id).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                error!(job_id = %job_id, error = %err, "Summarization failed");
                // A rejected transition means the job is not in this stage
                // at all; leave its state alone.
                if !matches!(
                    err,
                    SummarizeError::InvalidTransition { .. } | SummarizeError::JobNotFound(_)
                ) {
                    self.record_failure(job_id, &err).await;
                }
                Err(err)
            }
        }
    }

    async fn run_generate(&self, job_id: JobId) -> Result<String, SummarizeError> {
        let mut job = self.store.read_job(job_id).await?;

        // Audio jobs pass through transcription; the source seam hides the
        // transcriber itself.
        if job.source == SourceKind::AudioUpload && job.status == JobStatus::Submitted {
            job.advance(JobStatus::Transcribing)?;
            self.store
                .update_job(job_id, JobUpdate::status(job.status.clone()))
                .await?;
        }

        let transcript = self.source.transcript(&job).await?;

        job.advance(JobStatus::Summarizing)?;
        self.store
            .update_job(job_id, JobUpdate::status(job.status.clone()))
            .await?;

        let summary = self.pipeline.summarize(&transcript, job_id).await?;
        let summary_file = self.artifacts.save_summary(&summary).await?;

        job.advance(JobStatus::PendingApproval)?;
        self.store
            .update_job(
                job_id,
                JobUpdate {
                    status: Some(job.status.clone()),
                    summary: Some(summary.clone()),
                    summary_file: Some(summary_file.clone()),
                    ..JobUpdate::default()
                },
            )
            .await?;

        let link = self.approval_url.replace("{job_id}", &job_id.to_string());
        let attachments: Vec<PathBuf> = [Some(summary_file), job.transcript_file.clone()]
            .into_iter()
            .flatten()
            .collect();
        self.delivery
            .send(&approval_mail(&self.reviewer_email, &link, attachments))
            .await?;

        info!(job_id = %job_id, "Summary awaiting approval");
        Ok(summary)
    }

    /// Approve a job's summary and deliver it to the requesting user.
    ///
    /// Errors here leave the job in its current state so approval can be
    /// retried; only summarization failures are terminal for a job.
    pub async fn approve(&self, job_id: JobId) -> Result<(), SummarizeError> {
        let mut job = self.store.read_job(job_id).await?;
        job.advance(JobStatus::Approved)?;
        self.store
            .update_job(job_id, JobUpdate::status(job.status.clone()))
            .await?;

        let attachments: Vec<PathBuf> = [job.summary_file.clone(), job.transcript_file.clone()]
            .into_iter()
            .flatten()
            .collect();
        self.delivery
            .send(&summary_mail(&job.user_email, attachments))
            .await?;

        self.record_delivery(job_id).await
    }

    /// Mark a job delivered, recording the send time and the formatted
    /// elapsed duration since submission.
    pub async fn record_delivery(&self, job_id: JobId) -> Result<(), SummarizeError> {
        let mut job = self.store.read_job(job_id).await?;

        let sent_at = Utc::now();
        let elapsed = format_elapsed(job.created_at, sent_at);
        job.advance(JobStatus::Delivered)?;

        self.store
            .update_job(
                job_id,
                JobUpdate {
                    status: Some(job.status.clone()),
                    sent_at: Some(sent_at),
                    elapsed: Some(elapsed.clone()),
                    ..JobUpdate::default()
                },
            )
            .await?;

        info!(job_id = %job_id, elapsed = %elapsed, "Summary delivered");
        Ok(())
    }

    /// Generate summaries for a set of jobs, isolating failures.
    ///
    /// Returns how many jobs reached approval. Failed jobs carry their
    /// error in the persisted status field.
    pub async fn process_batch(&self, job_ids: &[JobId]) -> usize {
        let mut completed = 0;
        for &job_id in job_ids {
            // Failures were recorded and logged at the job boundary.
            if self.generate_summary(job_id).await.is_ok() {
                completed += 1;
            }
        }
        info!(total = job_ids.len(), completed, "Batch processed");
        completed
    }

    async fn record_failure(&self, job_id: JobId, err: &SummarizeError) {
        let result = async {
            let mut job = self.store.read_job(job_id).await?;
            job.fail(err.to_string());
            self.store
                .update_job(job_id, JobUpdate::status(job.status.clone()))
                .await
        }
        .await;

        if let Err(store_err) = result {
            warn!(job_id = %job_id, error = %store_err, "Failed to record job failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::client::{CompletionClient, ScriptedBackend};
    use crate::config::PromptSet;
    use crate::delivery::RecordingDelivery;
    use crate::error::BackendError;
    use crate::retry::RetryPolicy;
    use crate::store::{FileTranscriptSource, InMemoryJobStore};
    use crate::token::TokenCounter;

    const CHUNK: &str = "Summarize this part of a longer conversation.";
    const FINAL: &str = "Merge these partial summaries into one summary.";

    struct Harness {
        service: SummaryService,
        backend: Arc<ScriptedBackend>,
        store: Arc<InMemoryJobStore>,
        delivery: Arc<RecordingDelivery>,
        _dir: TempDir,
    }

    /// Service wired with doubles, with a usable budget of `budget` tokens
    /// under the heuristic counter.
    fn harness(budget: usize) -> Harness {
        let counter = TokenCounter::approximate();
        let prompts = PromptSet {
            direct_summary: "Summarize the following conversation transcript.".into(),
            chunk_summary: CHUNK.into(),
            final_summary: FINAL.into(),
        };
        let system_tokens = [
            &prompts.direct_summary,
            &prompts.chunk_summary,
            &prompts.final_summary,
        ]
        .iter()
        .map(|p| counter.count(p))
        .max()
        .unwrap();

        let mut config = Config::new("test-model", "sk-test");
        config.prompts = prompts;
        config.context_length = budget + system_tokens + config.reserved_output_tokens;
        config.approval_url = "https://recap.example.com/approve/{job_id}".into();
        config.reviewer_email = "reviewer@example.com".into();

        let backend = Arc::new(ScriptedBackend::new());
        let client = CompletionClient::new(backend.clone(), RetryPolicy::default());
        let pipeline =
            SummarizationPipeline::new(&config, TokenCounter::approximate(), client).unwrap();

        let store = Arc::new(InMemoryJobStore::new());
        let delivery = Arc::new(RecordingDelivery::new());
        let dir = tempfile::tempdir().unwrap();

        let service = SummaryService::new(
            &config,
            pipeline,
            store.clone(),
            Arc::new(FileTranscriptSource),
            delivery.clone(),
            ArtifactStore::new(dir.path()),
        );

        Harness {
            service,
            backend,
            store,
            delivery,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_small_transcript_reaches_pending_approval() {
        let h = harness(500);
        let id = h
            .service
            .submit(
                "user@example.com",
                SourceKind::TextUpload,
                "Two people agreed on a plan. They split the work.",
            )
            .await
            .unwrap();

        let summary = h.service.generate_summary(id).await.unwrap();

        assert!(!summary.is_empty());
        let job = h.store.read_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::PendingApproval);
        assert_eq!(job.summary.as_deref(), Some(summary.as_str()));
        assert!(job.summary_file.is_some());
        assert_eq!(h.backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_long_transcript_map_reduces_and_requests_approval() {
        let h = harness(10_000);
        // ~50,000 tokens against the 10,000 token usable budget.
        let sentence = "The committee walked through the quarterly budget plan. ";
        let transcript = sentence.repeat(200_000 / sentence.len());

        let id = h
            .service
            .submit("user@example.com", SourceKind::TextUpload, &transcript)
            .await
            .unwrap();
        h.service.generate_summary(id).await.unwrap();

        let job = h.store.read_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::PendingApproval);
        assert!(job.summary.is_some());

        let calls = h.backend.calls();
        let chunk_calls = calls.iter().filter(|c| c.system == CHUNK).count();
        let final_calls = calls.iter().filter(|c| c.system == FINAL).count();
        assert!(chunk_calls >= 5, "expected >= 5 chunk calls, got {}", chunk_calls);
        assert_eq!(final_calls, 1);

        // Approval mail went to the reviewer with the job-specific link
        // and both artifacts attached.
        let sent = h.delivery.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "reviewer@example.com");
        assert!(sent[0].body.contains(&id.to_string()));
        assert_eq!(sent[0].attachments.len(), 2);
    }

    #[tokio::test]
    async fn test_audio_job_passes_through_transcription() {
        let h = harness(500);
        let id = h
            .service
            .submit(
                "user@example.com",
                SourceKind::AudioUpload,
                "The recording covered one topic. It ran short.",
            )
            .await
            .unwrap();

        h.service.generate_summary(id).await.unwrap();

        let job = h.store.read_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::PendingApproval);
    }

    #[tokio::test]
    async fn test_empty_transcript_recorded_as_job_error() {
        let h = harness(500);
        let id = h
            .service
            .submit("user@example.com", SourceKind::TextUpload, "")
            .await
            .unwrap();

        let err = h.service.generate_summary(id).await.unwrap_err();

        assert!(matches!(err, SummarizeError::EmptyTranscript));
        assert_eq!(h.backend.call_count(), 0);
        let job = h.store.read_job(id).await.unwrap();
        match job.status {
            JobStatus::Error { message } => assert!(message.contains("empty")),
            status => panic!("expected error status, got {:?}", status),
        }
    }

    #[tokio::test]
    async fn test_upstream_failure_recorded_without_crashing_batch() {
        let h = harness(500);
        let failing = h
            .service
            .submit("a@example.com", SourceKind::TextUpload, "First conversation.")
            .await
            .unwrap();
        let healthy = h
            .service
            .submit("b@example.com", SourceKind::TextUpload, "Second conversation.")
            .await
            .unwrap();

        // First job's only call fails fatally; the second gets the default
        // scripted response.
        h.backend.push_err(BackendError::Fatal("bad request".into()));

        let completed = h.service.process_batch(&[failing, healthy]).await;

        assert_eq!(completed, 1);
        let failed_job = h.store.read_job(failing).await.unwrap();
        assert!(matches!(failed_job.status, JobStatus::Error { .. }));
        let healthy_job = h.store.read_job(healthy).await.unwrap();
        assert_eq!(healthy_job.status, JobStatus::PendingApproval);
    }

    #[tokio::test]
    async fn test_approval_delivers_and_records_elapsed() {
        let h = harness(500);
        let id = h
            .service
            .submit(
                "user@example.com",
                SourceKind::TextUpload,
                "One topic was discussed. It was resolved.",
            )
            .await
            .unwrap();
        h.service.generate_summary(id).await.unwrap();

        h.service.approve(id).await.unwrap();

        let job = h.store.read_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Delivered);
        assert!(job.sent_at.is_some());
        let elapsed = job.elapsed.unwrap();
        assert!(
            elapsed.starts_with("00 hours, 00 minutes"),
            "unexpected elapsed: {}",
            elapsed
        );

        // Approval mail first, then the user-facing summary mail.
        let sent = h.delivery.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].recipient, "user@example.com");
        assert!(!sent[1].attachments.is_empty());
    }

    #[tokio::test]
    async fn test_approve_requires_pending_approval() {
        let h = harness(500);
        let id = h
            .service
            .submit("user@example.com", SourceKind::TextUpload, "Some words.")
            .await
            .unwrap();

        let err = h.service.approve(id).await.unwrap_err();

        assert!(matches!(err, SummarizeError::InvalidTransition { .. }));
        let job = h.store.read_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Submitted);
    }
}
