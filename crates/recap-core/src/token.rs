//! Model-native token counting.
//!
//! Wraps a `tokenizers` tokenizer so text length is measured in the same
//! units the completion API bills and budgets in. Counting must stay
//! consistent with the API's own accounting; a drift between the two is an
//! accepted external risk, covered by the reserved output margin.

use std::path::Path;

use anyhow::{Context, Result};
use hf_hub::api::tokio::Api;
use tokenizers::Tokenizer;

/// Counts text length in model-native tokens.
///
/// Deterministic for a fixed model: the same text always yields the same
/// count. No side effects.
pub struct TokenCounter {
    tokenizer: Option<Tokenizer>,
}

impl TokenCounter {
    /// Load a tokenizer from a local `tokenizer.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(Self {
            tokenizer: Some(tokenizer),
        })
    }

    /// Fetch `tokenizer.json` for a model repository from HuggingFace and
    /// load it.
    pub async fn fetch(hf_repo_id: &str) -> Result<Self> {
        tracing::info!("Loading tokenizer: {}", hf_repo_id);

        let api = Api::new().context("Failed to create HuggingFace API")?;
        let repo = api.model(hf_repo_id.to_string());
        let tokenizer_path = repo
            .get("tokenizer.json")
            .await
            .context("Failed to download tokenizer.json")?;

        Self::from_file(&tokenizer_path)
    }

    /// Create a counter that uses the ~4 chars/token heuristic instead of a
    /// real tokenizer.
    ///
    /// Used in tests and in embedding applications that have no tokenizer
    /// file available.
    pub fn approximate() -> Self {
        Self { tokenizer: None }
    }

    /// Count `text` in model-native tokens.
    pub fn count(&self, text: &str) -> usize {
        let Some(ref tokenizer) = self.tokenizer else {
            return approx_tokens(text);
        };

        match tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                tracing::debug!(error = %e, "Tokenizer failed to encode, using heuristic");
                approx_tokens(text)
            }
        }
    }
}

/// Heuristic ~4 chars/token.
fn approx_tokens(s: &str) -> usize {
    (s.chars().count() + 3) / 4
}
