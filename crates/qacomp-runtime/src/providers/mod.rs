//! LLM provider abstractions.
//!
//! A provider turns a list of chat messages into a completion. The comparison
//! chain only ever talks to [`LlmProvider`], so backends can be swapped and
//! tests can substitute a recording mock.
//!
//! Credentials go through [`secrets`]; see [`ApiCredential`].

use async_trait::async_trait;
use qacomp_core::PromptMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory, ANTHROPIC_API_KEY_ENV};

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Per-request completion settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 for deterministic grading)
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Mark the system prompt cacheable (Anthropic)
    pub prompt_caching: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250514".to_string(),
            max_tokens: 512,
            temperature: 0.0,
            timeout: Duration::from_secs(15),
            prompt_caching: true,
        }
    }
}

/// A chat message sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,

    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }
}

impl From<PromptMessage> for ChatMessage {
    fn from(message: PromptMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content,
        }
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text
    pub content: String,

    pub usage: TokenUsage,

    /// Model that actually served the request
    pub model: String,

    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,

    /// Tokens read from the prompt cache (Anthropic)
    pub cache_read_tokens: u32,

    /// Tokens written to the prompt cache (Anthropic)
    pub cache_creation_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A chat-capable model.
///
/// Retry, timeout and transport behavior belong to the implementation; the
/// comparison chain calls `complete` once per input and propagates any error
/// unchanged.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if the provider is usable before starting a batch.
    async fn health_check(&self) -> bool;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use qacomp_core::Role;

    #[test]
    fn test_chat_message_creation() {
        assert_eq!(ChatMessage::system("grade").role, "system");
        assert_eq!(ChatMessage::user("Q?").role, "user");
        assert!(ChatMessage::system("x").is_system());
    }

    #[test]
    fn test_chat_message_from_prompt_message() {
        let message: ChatMessage = PromptMessage {
            role: Role::User,
            content: "QUESTION: 2+2".to_string(),
        }
        .into();
        assert_eq!(message, ChatMessage::user("QUESTION: 2+2"));
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 120,
            completion_tokens: 30,
            ..Default::default()
        };
        assert_eq!(usage.total(), 150);
    }
}
