//! Chat-completion providers used to turn recipes into shopping lists and pasted text into recipes.

mod groq;

#[cfg(test)]
mod fake;

pub(crate) use groq::{GroqConfig, GroqProvider};

#[cfg(test)]
pub(crate) use fake::FakeProvider;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Error type for LLM operations.
#[derive(Debug, Error)]
pub(crate) enum LlmError {
    #[error("AI request failed: {0}")]
    RequestFailed(String),

    #[error("AI returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("AI returned an invalid data format: {0}")]
    ParseError(String),

    #[error("AI provider not configured: {0}")]
    NotConfigured(String),
}

/// A chat-completion backend that answers with a single JSON object.
#[async_trait]
pub(crate) trait LlmProvider: Send + Sync + fmt::Debug {
    /// Send a prompt and get the raw text of the model's JSON answer.
    async fn complete_json(&self, prompt: &str) -> Result<String, LlmError>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

/// Run a prompt and decode the answer as a JSON value.
pub(crate) async fn complete_to_value(
    provider: &dyn LlmProvider,
    prompt: &str,
) -> Result<serde_json::Value, LlmError> {
    let raw = provider.complete_json(prompt).await?;
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(&raw))
        .map_err(|e| LlmError::ParseError(e.to_string()))?;
    if !value.is_object() {
        return Err(LlmError::ParseError("expected a JSON object".to_string()));
    }
    Ok(value)
}

/// Some models wrap JSON mode answers in a markdown fence anyway.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn non_object_answers_are_rejected() {
        let provider = FakeProvider::new().with_default_response("[1, 2]");
        let err = complete_to_value(&provider, "anything").await.unwrap_err();
        assert!(matches!(err, LlmError::ParseError(_)));
    }

    #[tokio::test]
    async fn invalid_json_is_a_parse_error() {
        let provider = FakeProvider::new().with_default_response("not json");
        let err = complete_to_value(&provider, "anything").await.unwrap_err();
        assert!(matches!(err, LlmError::ParseError(_)));
    }
}
