//! Completion API client.
//!
//! [`CompletionBackend`] is the seam to the model API: one call in, one
//! [`CompletionResult`] out, with truncation reported as data rather than
//! as an error. [`CompletionClient`] layers the two independent retry
//! policies on top: transient failures are retried under the configured
//! [`RetryPolicy`], and a length-truncated response is retried exactly once
//! with a brevity directive appended to the system prompt.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BackendError;
use crate::retry::RetryPolicy;

/// Directive appended to the system prompt on the truncation retry.
pub const BREVITY_DIRECTIVE: &str =
    "Keep the summary short: cover only the most essential points.";

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// One completion call. Stateless and single-use.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub content: String,
    pub max_output_tokens: u32,
}

impl CompletionRequest {
    /// The same request with the system prompt amended to ask for brevity.
    fn amended_for_brevity(&self) -> Self {
        Self {
            system: format!("{} {}", self.system.trim_end(), BREVITY_DIRECTIVE),
            ..self.clone()
        }
    }
}

/// Result of one completion call.
///
/// `truncated` is set when the output hit `max_output_tokens` before
/// naturally concluding (a length-limited finish).
#[derive(Debug, Clone, Default)]
pub struct CompletionResult {
    pub text: String,
    pub truncated: bool,
}

/// Seam to the completion endpoint.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Issue one completion call.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, BackendError>;
}

/// Client wrapping a backend with the retry behavior summarization needs.
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    retry: RetryPolicy,
}

impl CompletionClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Complete `request`, applying both retry policies.
    ///
    /// Transient failures retry the same request under the policy ceiling
    /// with its fixed backoff. A truncated result triggers exactly one more
    /// call with the same content and an amended system prompt; that call's
    /// result is returned whether or not it is truncated itself.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, BackendError> {
        let result = self.attempt(request).await?;
        if !result.truncated {
            return Ok(result);
        }

        debug!(
            model = %request.model,
            "Completion hit the output ceiling, retrying once with a brevity directive"
        );
        let amended = request.amended_for_brevity();
        self.attempt(&amended).await
    }

    async fn attempt(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, BackendError> {
        self.retry
            .run("completion call", BackendError::is_transient, || {
                self.backend.complete(request)
            })
            .await
    }
}

/// Backend for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Backend with a per-request timeout on the HTTP client.
    pub fn with_timeout(api_url: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, BackendError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.content,
                },
            ],
            max_tokens: request.max_output_tokens,
            temperature: DEFAULT_TEMPERATURE,
        };

        // Transport failures are transient by classification: the request
        // never reached a verdict from the API.
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => format!("HTTP {}", status),
            };
            return if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Err(BackendError::Transient(message))
            } else {
                Err(BackendError::Fatal(message))
            };
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Fatal(format!("malformed completion response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Fatal("completion response has no choices".into()))?;

        let truncated = choice.finish_reason.as_deref() == Some("length");
        let text = choice.message.content.unwrap_or_default();

        debug!(
            response_chars = text.len(),
            truncated, "Completion received"
        );

        Ok(CompletionResult { text, truncated })
    }
}

/// Backend that replays scripted outcomes and records every request.
///
/// The test double for the [`CompletionBackend`] seam; unscripted calls
/// return a fixed placeholder summary.
pub struct ScriptedBackend {
    outcomes: Mutex<VecDeque<Result<CompletionResult, BackendError>>>,
    calls: Mutex<Vec<CompletionRequest>>,
    default_response: String,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            default_response: "Recap of the discussion.".to_string(),
        }
    }

    /// Queue a successful outcome.
    pub fn push_ok(&self, text: &str, truncated: bool) {
        lock(&self.outcomes).push_back(Ok(CompletionResult {
            text: text.to_string(),
            truncated,
        }));
    }

    /// Queue a failed outcome.
    pub fn push_err(&self, error: BackendError) {
        lock(&self.outcomes).push_back(Err(error));
    }

    /// Every request seen so far, in call order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, BackendError> {
        lock(&self.calls).push(request.clone());
        match lock(&self.outcomes).pop_front() {
            Some(outcome) => outcome,
            None => Ok(CompletionResult {
                text: self.default_response.clone(),
                truncated: false,
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
