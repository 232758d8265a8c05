//! Pipeline configuration.
//!
//! All tunables live in an explicit [`Config`] handed to the pipeline
//! constructor and validated once at startup; nothing is read from ambient
//! global state inside the algorithm.

use crate::error::SummarizeError;
use crate::retry::RetryPolicy;

/// Default OpenAI-compatible chat completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Minimum output-token margin reserved out of the context window so every
/// completion call has room for a viable summary.
pub const MIN_RESERVED_OUTPUT_TOKENS: usize = 1000;

/// The three prompt variants the pipeline uses.
///
/// `direct_summary` summarizes a transcript that fits the budget in one
/// call; `chunk_summary` summarizes one chunk of an over-length transcript;
/// `final_summary` merges the chunk summaries into the master summary.
#[derive(Debug, Clone, Default)]
pub struct PromptSet {
    pub direct_summary: String,
    pub chunk_summary: String,
    pub final_summary: String,
}

impl PromptSet {
    /// Fail fast if any prompt is absent.
    pub fn validate(&self) -> Result<(), SummarizeError> {
        if self.direct_summary.trim().is_empty() {
            return Err(SummarizeError::MissingPrompt("direct-summary"));
        }
        if self.chunk_summary.trim().is_empty() {
            return Err(SummarizeError::MissingPrompt("chunk-summary"));
        }
        if self.final_summary.trim().is_empty() {
            return Err(SummarizeError::MissingPrompt("final-summary"));
        }
        Ok(())
    }
}

/// Summarization configuration, validated once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Completion model identifier.
    pub model: String,
    /// API key for the completion endpoint.
    pub api_key: String,
    /// Chat completions URL (OpenAI-compatible).
    pub api_url: String,
    /// Hard per-request context size of the model, in tokens.
    pub context_length: usize,
    /// Output-token margin reserved out of the context window. Doubles as
    /// the `max_output_tokens` of every completion call.
    pub reserved_output_tokens: usize,
    /// Concurrency cap for the chunk-summary fan-out. 1 processes chunks
    /// sequentially, the deterministic reference behavior.
    pub chunk_concurrency: usize,
    /// Retry policy for transient completion failures.
    pub retry: RetryPolicy,
    /// The three prompt variants.
    pub prompts: PromptSet,
    /// Approval link template; `{job_id}` is replaced with the job id.
    pub approval_url: String,
    /// Recipient of approval mails.
    pub reviewer_email: String,
}

impl Config {
    /// Configuration with defaults for everything except credentials and
    /// prompts.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            context_length: 16_384,
            reserved_output_tokens: MIN_RESERVED_OUTPUT_TOKENS,
            chunk_concurrency: 1,
            retry: RetryPolicy::default(),
            prompts: PromptSet::default(),
            approval_url: String::new(),
            reviewer_email: String::new(),
        }
    }

    /// Validate the configuration. Called once when the pipeline is built.
    pub fn validate(&self) -> Result<(), SummarizeError> {
        self.prompts.validate()?;

        if self.model.trim().is_empty() {
            return Err(SummarizeError::Config("model identifier is empty".into()));
        }
        if self.reserved_output_tokens < MIN_RESERVED_OUTPUT_TOKENS {
            return Err(SummarizeError::Config(format!(
                "reserved output margin {} is below the {} token minimum",
                self.reserved_output_tokens, MIN_RESERVED_OUTPUT_TOKENS
            )));
        }
        if self.context_length <= self.reserved_output_tokens {
            return Err(SummarizeError::Config(format!(
                "context length {} leaves no room after the {} token output margin",
                self.context_length, self.reserved_output_tokens
            )));
        }
        if self.chunk_concurrency == 0 {
            return Err(SummarizeError::Config(
                "chunk concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_prompts() -> PromptSet {
        PromptSet {
            direct_summary: "Summarize the following conversation transcript.".into(),
            chunk_summary: "Summarize this part of a longer conversation.".into(),
            final_summary: "Merge these partial summaries into one summary.".into(),
        }
    }

    fn valid_config() -> Config {
        let mut config = Config::new("test-model", "sk-test");
        config.prompts = test_prompts();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_prompt_fails_fast() {
        let mut config = valid_config();
        config.prompts.chunk_summary = String::new();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, SummarizeError::MissingPrompt("chunk-summary")));
    }

    #[test]
    fn test_reserved_margin_below_minimum_rejected() {
        let mut config = valid_config();
        config.reserved_output_tokens = 200;

        assert!(matches!(
            config.validate().unwrap_err(),
            SummarizeError::Config(_)
        ));
    }

    #[test]
    fn test_context_smaller_than_margin_rejected() {
        let mut config = valid_config();
        config.context_length = 1000;

        assert!(matches!(
            config.validate().unwrap_err(),
            SummarizeError::Config(_)
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.chunk_concurrency = 0;

        assert!(matches!(
            config.validate().unwrap_err(),
            SummarizeError::Config(_)
        ));
    }
}
