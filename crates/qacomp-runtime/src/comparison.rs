//! The pairwise comparison evaluator.
//!
//! [`QaCompChain`] grades two candidate answers against a reference answer,
//! one model call per example. Construction checks the prompt once; after
//! that the chain is immutable and can be reused for any number of batches.

use std::sync::Arc;
use std::time::Instant;

use qacomp_core::{
    comparison_inputs, validate_comparison_prompt, ComparisonInput, EvalError, EvaluationKeys,
    PromptTemplate, Record, CHAT_COMP_PROMPT,
};

use crate::chain::{ChainError, ChainOptions, ChainOutput, LlmChain};
use crate::providers::LlmProvider;

/// LLM chain that compares two students' answers to a question.
#[derive(Debug)]
pub struct QaCompChain {
    chain: LlmChain,
}

impl QaCompChain {
    /// Build the evaluator.
    ///
    /// `prompt` defaults to [`CHAT_COMP_PROMPT`] and must declare exactly
    /// `query`, `answer` and `result`. `options` are passed to the underlying
    /// [`LlmChain`] as is.
    pub fn from_llm(
        llm: Arc<dyn LlmProvider>,
        prompt: Option<PromptTemplate>,
        options: ChainOptions,
    ) -> Result<Self, EvalError> {
        let prompt = prompt.unwrap_or_else(|| CHAT_COMP_PROMPT.clone());
        validate_comparison_prompt(&prompt)?;

        Ok(Self {
            chain: LlmChain::new(llm, prompt, options),
        })
    }

    pub fn chain(&self) -> &LlmChain {
        &self.chain
    }

    /// Grade one input.
    ///
    /// The returned map holds `query`, `answer`, `student_a`, `student_b` and
    /// the model text under the configured output key.
    pub async fn invoke(&self, input: &ComparisonInput) -> Result<ChainOutput, ChainError> {
        let response = self.chain.predict(&input.prompt_values()).await?;

        let mut output = input.to_values();
        output.insert(
            self.chain.options().output_key.clone(),
            serde_json::Value::String(response.content),
        );
        Ok(output)
    }

    /// Grade a batch, one model call per example, in order.
    ///
    /// `predictions_a[i]` and `predictions_b[i]` are the candidates for
    /// `examples[i]`. Every input is built before the first call, so a missing
    /// key or a short prediction list fails without touching the model. Any
    /// error aborts the batch and no results are returned.
    pub async fn evaluate(
        &self,
        examples: &[Record],
        predictions_a: &[Record],
        predictions_b: &[Record],
        keys: &EvaluationKeys,
    ) -> Result<Vec<ChainOutput>, ChainError> {
        let inputs = comparison_inputs(examples, predictions_a, predictions_b, keys)?;
        let started = Instant::now();

        let mut results = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            tracing::debug!(index, total = inputs.len(), "Comparing answers");
            results.push(self.invoke(input).await?);
        }

        tracing::info!(
            examples = results.len(),
            provider = self.chain.llm().name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Comparison batch completed"
        );
        Ok(results)
    }
}
