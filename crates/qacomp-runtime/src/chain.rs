//! Prompt-filling chain: render a template, call the model once.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use qacomp_core::{EvalError, PromptTemplate, TemplateError, TemplateValues};

use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};

/// Output of one chain call: the inputs plus the model text under the
/// output key.
pub type ChainOutput = BTreeMap<String, Value>;

/// Errors from running a chain.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("Prompt rendering failed: {0}")]
    Template(#[from] TemplateError),

    /// Provider errors pass through untouched.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Options forwarded to the underlying chain.
#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub completion: CompletionConfig,

    /// Key the model text is stored under in [`ChainOutput`]
    pub output_key: String,

    /// Log rendered prompts at info instead of debug
    pub verbose: bool,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            completion: CompletionConfig::default(),
            output_key: "text".to_string(),
            verbose: false,
        }
    }
}

/// A prompt template bound to a model.
pub struct LlmChain {
    llm: Arc<dyn LlmProvider>,
    prompt: PromptTemplate,
    options: ChainOptions,
}

impl std::fmt::Debug for LlmChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmChain")
            .field("llm", &self.llm.name())
            .field("input_variables", self.prompt.input_variables())
            .field("options", &self.options)
            .finish()
    }
}

impl LlmChain {
    pub fn new(llm: Arc<dyn LlmProvider>, prompt: PromptTemplate, options: ChainOptions) -> Self {
        Self {
            llm,
            prompt,
            options,
        }
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    /// Render the prompt with `values` and run one completion.
    pub async fn predict(&self, values: &TemplateValues) -> Result<CompletionResponse, ChainError> {
        let messages: Vec<ChatMessage> = self
            .prompt
            .format_messages(values)?
            .into_iter()
            .map(ChatMessage::from)
            .collect();

        if self.options.verbose {
            for m in &messages {
                tracing::info!(role = %m.role, content = %m.content, "Prompt message");
            }
        } else {
            tracing::debug!(
                provider = self.llm.name(),
                messages = messages.len(),
                "Calling LLM"
            );
        }

        let response = self
            .llm
            .complete(messages, &self.options.completion)
            .await
            .inspect_err(|e| {
                tracing::warn!(provider = self.llm.name(), error = %e, "LLM call failed");
            })?;

        tracing::debug!(
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "LLM call completed"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::TokenUsage;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("|"),
                usage: TokenUsage::default(),
                model: "echo".to_string(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct DownProvider;

    #[async_trait]
    impl LlmProvider for DownProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Err(ProviderError::ApiError {
                status: 529,
                message: "overloaded".to_string(),
            })
        }

        async fn health_check(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn chain(llm: Arc<dyn LlmProvider>) -> LlmChain {
        let prompt = PromptTemplate::from_messages([
            (qacomp_core::Role::System, "grade"),
            (qacomp_core::Role::User, "Q={q}"),
        ])
        .unwrap();
        LlmChain::new(llm, prompt, ChainOptions::default())
    }

    #[tokio::test]
    async fn test_predict_sends_rendered_messages() {
        let response = chain(Arc::new(EchoProvider))
            .predict(&TemplateValues::from([("q".to_string(), json!("why"))]))
            .await
            .unwrap();

        assert_eq!(response.content, "grade|Q=why");
        assert_eq!(response.model, "echo");
    }

    #[tokio::test]
    async fn test_render_error_skips_model() {
        let err = chain(Arc::new(DownProvider))
            .predict(&TemplateValues::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Template(TemplateError::MissingValue(_))));
    }

    #[tokio::test]
    async fn test_provider_error_passes_through() {
        let err = chain(Arc::new(DownProvider))
            .predict(&TemplateValues::from([("q".to_string(), json!("why"))]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChainError::Provider(ProviderError::ApiError { status: 529, .. })
        ));
        assert_eq!(err.to_string(), "API error: 529 - overloaded");
    }
}
