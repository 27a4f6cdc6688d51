//! # qacomp-core
//!
//! Deterministic building blocks for pairwise question-answering comparison.
//!
//! This crate never calls a model. It provides:
//! - Chat prompt templates with `{name}` placeholders and their declared
//!   input variables
//! - The built-in comparison prompt
//! - Example / prediction records and the key configuration used to read them
//! - The mapping from a batch of records to per-example comparison inputs
//! - Parsing of the preference verdict out of model text
//!
//! The LLM side (providers and the comparison chain) lives in `qacomp-runtime`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use qacomp_core::{comparison_inputs, EvaluationKeys, Record};
//!
//! let inputs = comparison_inputs(&examples, &predictions_a, &predictions_b, &EvaluationKeys::default())?;
//! assert_eq!(inputs.len(), examples.len());
//! ```

pub mod comparison;
pub mod prompts;
pub mod record;
pub mod template;
pub mod verdict;

pub use comparison::{
    comparison_inputs, validate_comparison_prompt, ComparisonInput, COMPARISON_PROMPT_VARIABLES,
};
pub use prompts::CHAT_COMP_PROMPT;
pub use record::{lookup, EvaluationKeys, Record, RecordSequence};
pub use template::{MessageTemplate, PromptMessage, PromptTemplate, Role, TemplateError, TemplateValues};
pub use verdict::{parse_preference, Preference, PreferenceTally};

use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while building or running a comparison batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The prompt does not declare exactly the variables the evaluator fills.
    #[error("Input variables should be {expected:?}, but got {actual:?}")]
    Configuration {
        expected: BTreeSet<String>,
        actual: BTreeSet<String>,
    },

    /// A record lacks the configured field.
    #[error("{sequence}[{index}] has no key '{key}'")]
    KeyLookup {
        sequence: RecordSequence,
        index: usize,
        key: String,
    },

    /// A prediction sequence is shorter than the examples.
    #[error("{sequence} index {index} out of range (len {len})")]
    IndexOutOfRange {
        sequence: RecordSequence,
        index: usize,
        len: usize,
    },
}
