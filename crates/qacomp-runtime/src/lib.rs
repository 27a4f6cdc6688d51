//! # qacomp-runtime
//!
//! LLM-backed pairwise comparison of question-answering outputs.
//!
//! Given a set of examples (question + reference answer) and the predictions
//! of two systems, [`QaCompChain`] asks a chat model which system answered
//! each question better, one call per example.
//!
//! Deterministic pieces (templates, record mapping, verdict parsing) live in
//! `qacomp-core` and are re-exported here for convenience.
//!
//! ## Example
//!
//! ```rust,ignore
//! use qacomp_runtime::{ChainOptions, EvaluationKeys, QaCompChain};
//! use qacomp_runtime::providers::AnthropicProvider;
//!
//! let llm = Arc::new(AnthropicProvider::from_env()?);
//! let chain = QaCompChain::from_llm(llm, None, ChainOptions::default())?;
//!
//! let results = chain
//!     .evaluate(&examples, &predictions_a, &predictions_b, &EvaluationKeys::default())
//!     .await?;
//! for result in &results {
//!     println!("{:?}", qacomp_runtime::parse_preference(result["text"].as_str().unwrap_or("")));
//! }
//! ```

pub mod chain;
pub mod comparison;
pub mod config;
pub mod providers;

pub use chain::{ChainError, ChainOptions, ChainOutput, LlmChain};
pub use comparison::QaCompChain;
pub use config::{ConfigError, RuntimeConfig};

pub use qacomp_core::{
    parse_preference, ComparisonInput, EvalError, EvaluationKeys, Preference, PreferenceTally,
    PromptTemplate, Record, CHAT_COMP_PROMPT,
};
