//! Anthropic Messages API provider.
//!
//! System messages are sent as the top-level `system` block. With
//! `prompt_caching` on, that block carries an ephemeral cache marker, so the
//! comparison instructions are cached once and reused for every example in a
//! batch while the per-example user message is not.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic provider. The key is held as an [`ApiCredential`].
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Anthropic API key",
        ))
    }

    /// Read the key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        Ok(Self::with_credential(credential))
    }

    /// Build from a JSON block: `api_key` (falls back to the environment)
    /// and an optional `base_url`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let provider = Self::with_credential(credential);
        Ok(match config["base_url"].as_str() {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<AnthropicRequest, ProviderError> {
        let (system, conversation): (Vec<ChatMessage>, Vec<ChatMessage>) =
            messages.into_iter().partition(ChatMessage::is_system);

        if conversation.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "Anthropic requires at least one user message; the prompt has only system messages"
                    .to_string(),
            ));
        }

        let system_text = system
            .into_iter()
            .map(|m| m.content)
            .collect::<Vec<_>>()
            .join("\n\n");

        let system = (!system_text.is_empty()).then(|| {
            vec![ContentBlock::Text {
                text: system_text,
                cache_control: config.prompt_caching.then(CacheControl::ephemeral),
            }]
        });

        Ok(AnthropicRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system,
            messages: conversation
                .into_iter()
                .map(|m| AnthropicMessage {
                    role: m.role,
                    content: vec![ContentBlock::Text {
                        text: m.content,
                        cache_control: None,
                    }],
                })
                .collect(),
            temperature: config.temperature,
        })
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<ContentBlock>>,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    type_: &'static str,
}

impl CacheControl {
    fn ephemeral() -> Self {
        Self { type_: "ephemeral" }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}

impl From<AnthropicResponse> for CompletionResponse {
    fn from(body: AnthropicResponse) -> Self {
        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<String>();

        CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
                cache_read_tokens: body.usage.cache_read_input_tokens,
                cache_creation_tokens: body.usage.cache_creation_input_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = Self::build_request(messages, config)?;

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = match response.json::<AnthropicError>().await {
                Ok(body) => body.error.message,
                Err(e) => format!("unreadable error body: {}", e),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(body.into())
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Factory for [`AnthropicProvider`].
///
/// ```json
/// { "api_key": "sk-ant-...", "base_url": "https://..." }
/// ```
/// Both keys are optional; `api_key` falls back to `ANTHROPIC_API_KEY`.
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(AnthropicProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {} env",
                ANTHROPIC_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Anthropic Messages API with system prompt caching"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison_messages() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("You compare two students."),
            ChatMessage::user("QUESTION: 2+2"),
        ]
    }

    #[test]
    fn test_request_moves_system_to_cached_block() {
        let request =
            AnthropicProvider::build_request(comparison_messages(), &CompletionConfig::default())
                .unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["system"][0]["type"], "text");
        assert_eq!(json["system"][0]["text"], "You compare two students.");
        assert_eq!(json["system"][0]["cache_control"]["type"], "ephemeral");

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert!(messages[0]["content"][0].get("cache_control").is_none());
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_request_without_caching_or_system() {
        let config = CompletionConfig {
            prompt_caching: false,
            ..Default::default()
        };
        let request = AnthropicProvider::build_request(comparison_messages(), &config).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert!(json["system"][0].get("cache_control").is_none());

        let request =
            AnthropicProvider::build_request(vec![ChatMessage::user("hi")], &config).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_system_only_prompt_rejected() {
        let result = AnthropicProvider::build_request(
            vec![ChatMessage::system("You compare two students.")],
            &CompletionConfig::default(),
        );
        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_system_only_prompt_fails_before_sending() {
        // Nothing listens here; a request that got sent would fail with HttpError
        let provider = AnthropicProvider::new("key").with_base_url("http://127.0.0.1:9");
        let err = provider
            .complete(
                vec![ChatMessage::system("grade")],
                &CompletionConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn test_response_conversion() {
        let body: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "A is right.\n"},
                {"type": "text", "text": "PREFERENCE: A"}
            ],
            "model": "claude-sonnet-4-5-20250514",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 300, "output_tokens": 40, "cache_read_input_tokens": 250}
        }))
        .unwrap();

        let response: CompletionResponse = body.into();
        assert_eq!(response.content, "A is right.\nPREFERENCE: A");
        assert_eq!(response.usage.total(), 340);
        assert_eq!(response.usage.cache_read_tokens, 250);
        assert_eq!(response.usage.cache_creation_tokens, 0);
    }

    #[test]
    fn test_from_config() {
        let config = serde_json::json!({
            "api_key": "config-api-key",
            "base_url": "https://proxy.example.com/v1/"
        });

        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "https://proxy.example.com/v1");
        assert_eq!(provider.credential.expose(), "config-api-key");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-ant-qacomp-secret-12345";
        let provider = AnthropicProvider::new(secret_key);

        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_health_check_requires_key() {
        assert!(AnthropicProvider::new("key").health_check().await);
        assert!(!AnthropicProvider::new("").health_check().await);
    }

    #[test]
    fn test_factory_validation() {
        let factory = AnthropicProviderFactory;
        assert_eq!(factory.provider_type(), "anthropic");

        let bad_url = serde_json::json!({"api_key": "k", "base_url": "proxy.local"});
        assert!(factory.validate_config(&bad_url).is_err());

        let ok = serde_json::json!({"api_key": "k"});
        assert!(factory.validate_config(&ok).is_ok());
        assert_eq!(factory.create(&ok).unwrap().name(), "anthropic");
    }
}
