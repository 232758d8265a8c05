//! Map-reduce summarization pipeline.
//!
//! Chooses between a single-shot summary and chunked map-reduce based on
//! the transcript's measured token count versus the usable budget, which
//! is derived once from the model's context length minus the largest
//! system prompt and the reserved output margin.

use std::time::Instant;

use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::client::{CompletionClient, CompletionRequest};
use crate::config::{Config, PromptSet};
use crate::error::SummarizeError;
use crate::job::JobId;
use crate::split::split_transcript;
use crate::token::TokenCounter;

/// Cue appended to the joined chunk summaries for the reduce call.
const MASTER_SUMMARY_CUE: &str = "Master summary:";

/// Separator between chunk summaries in the reduce call's content.
const CHUNK_SUMMARY_SEPARATOR: &str = "\n\n";

pub struct SummarizationPipeline {
    model: String,
    prompts: PromptSet,
    usable_budget: usize,
    max_output_tokens: u32,
    chunk_concurrency: usize,
    counter: TokenCounter,
    client: CompletionClient,
}

impl SummarizationPipeline {
    /// Build a pipeline from a validated configuration.
    ///
    /// The usable budget is computed here, once: context length minus the
    /// largest of the three system prompts minus the reserved output
    /// margin. It serves as both the chunk-size ceiling and the
    /// single-shot eligibility threshold.
    pub fn new(
        config: &Config,
        counter: TokenCounter,
        client: CompletionClient,
    ) -> Result<Self, SummarizeError> {
        config.validate()?;

        let system_tokens = [
            &config.prompts.direct_summary,
            &config.prompts.chunk_summary,
            &config.prompts.final_summary,
        ]
        .iter()
        .map(|prompt| counter.count(prompt))
        .max()
        .unwrap_or(0);

        let usable_budget = config
            .context_length
            .saturating_sub(system_tokens + config.reserved_output_tokens);
        if usable_budget == 0 {
            return Err(SummarizeError::Config(format!(
                "context length {} cannot fit the system prompts ({} tokens) plus the {} token output margin",
                config.context_length, system_tokens, config.reserved_output_tokens
            )));
        }

        Ok(Self {
            model: config.model.clone(),
            prompts: config.prompts.clone(),
            usable_budget,
            max_output_tokens: config.reserved_output_tokens as u32,
            chunk_concurrency: config.chunk_concurrency,
            counter,
            client,
        })
    }

    /// Input-token budget available to a single completion call.
    pub fn usable_budget(&self) -> usize {
        self.usable_budget
    }

    /// Summarize `transcript`, returning the final summary text.
    ///
    /// Persistence is the caller's concern; the only side effects here are
    /// the completion calls themselves.
    pub async fn summarize(
        &self,
        transcript: &str,
        job_id: JobId,
    ) -> Result<String, SummarizeError> {
        let total_tokens = self.counter.count(transcript);
        if transcript.trim().is_empty() || total_tokens == 0 {
            return Err(SummarizeError::EmptyTranscript);
        }

        let started = Instant::now();

        let summary = if total_tokens <= self.usable_budget {
            debug!(
                job_id = %job_id,
                total_tokens,
                budget = self.usable_budget,
                "Transcript fits the budget, single-shot summary"
            );
            let request = self.request(&self.prompts.direct_summary, transcript);
            self.client.complete(&request).await?.text
        } else {
            self.map_reduce(transcript, total_tokens, job_id).await?
        };

        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(SummarizeError::EmptySummary);
        }

        info!(
            job_id = %job_id,
            total_tokens,
            summary_chars = summary.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Summary generated"
        );
        Ok(summary)
    }

    async fn map_reduce(
        &self,
        transcript: &str,
        total_tokens: usize,
        job_id: JobId,
    ) -> Result<String, SummarizeError> {
        let chunks = split_transcript(transcript, self.usable_budget, &self.counter);
        info!(
            job_id = %job_id,
            total_tokens,
            budget = self.usable_budget,
            chunk_count = chunks.len(),
            "Transcript exceeds the budget, summarizing in chunks"
        );

        // `buffered` yields results in input order even when the cap allows
        // chunks to run concurrently, so the reduce input is deterministic.
        let chunk_summaries: Vec<String> = stream::iter(chunks.into_iter().map(|chunk| {
            let request = self.request(&self.prompts.chunk_summary, &chunk.text);
            async move { self.client.complete(&request).await.map(|r| r.text) }
        }))
        .buffered(self.chunk_concurrency)
        .try_collect()
        .await?;

        // The reduce call is a join barrier: it needs every chunk summary.
        let merged = format!(
            "{}{}{}",
            chunk_summaries.join(CHUNK_SUMMARY_SEPARATOR),
            CHUNK_SUMMARY_SEPARATOR,
            MASTER_SUMMARY_CUE
        );
        let request = self.request(&self.prompts.final_summary, &merged);
        Ok(self.client.complete(&request).await?.text)
    }

    fn request(&self, system: &str, content: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            system: system.to_string(),
            content: content.to_string(),
            max_output_tokens: self.max_output_tokens,
        }
    }
}
