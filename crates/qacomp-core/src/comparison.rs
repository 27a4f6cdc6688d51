//! Pairwise comparison inputs.
//!
//! A comparison batch is three positionally aligned sequences: examples,
//! predictions from candidate A, and predictions from candidate B. Each index
//! becomes one [`ComparisonInput`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::record::{lookup, EvaluationKeys, Record, RecordSequence};
use crate::template::{render_value, PromptTemplate, TemplateValues};
use crate::EvalError;

/// Variables a comparison prompt must declare, no more and no fewer.
pub const COMPARISON_PROMPT_VARIABLES: [&str; 3] = ["query", "answer", "result"];

/// Check that `prompt` declares exactly [`COMPARISON_PROMPT_VARIABLES`].
pub fn validate_comparison_prompt(prompt: &PromptTemplate) -> Result<(), EvalError> {
    let expected: BTreeSet<String> = COMPARISON_PROMPT_VARIABLES
        .iter()
        .map(|v| v.to_string())
        .collect();

    if prompt.input_variables() != &expected {
        return Err(EvalError::Configuration {
            expected,
            actual: prompt.input_variables().clone(),
        });
    }
    Ok(())
}

/// One question with its reference answer and both candidate answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonInput {
    pub query: Value,
    pub answer: Value,
    pub student_a: Value,
    pub student_b: Value,
}

impl ComparisonInput {
    /// The input as a four-key map: `query`, `answer`, `student_a`, `student_b`.
    pub fn to_values(&self) -> TemplateValues {
        TemplateValues::from([
            ("query".to_string(), self.query.clone()),
            ("answer".to_string(), self.answer.clone()),
            ("student_a".to_string(), self.student_a.clone()),
            ("student_b".to_string(), self.student_b.clone()),
        ])
    }

    /// Values for a comparison prompt.
    ///
    /// `result` carries both candidate answers as a labelled block.
    pub fn prompt_values(&self) -> TemplateValues {
        let result = format!(
            "STUDENT A ANSWER: {}\n\nSTUDENT B ANSWER: {}",
            render_value(&self.student_a),
            render_value(&self.student_b)
        );
        TemplateValues::from([
            ("query".to_string(), self.query.clone()),
            ("answer".to_string(), self.answer.clone()),
            ("result".to_string(), Value::String(result)),
        ])
    }
}

/// Map a batch to one input per example, in example order.
///
/// Fails on the first missing key or on a prediction sequence shorter than
/// `examples`. Surplus predictions are ignored.
pub fn comparison_inputs(
    examples: &[Record],
    predictions_a: &[Record],
    predictions_b: &[Record],
    keys: &EvaluationKeys,
) -> Result<Vec<ComparisonInput>, EvalError> {
    let inputs = (0..examples.len())
        .map(|i| -> Result<ComparisonInput, EvalError> {
            Ok(ComparisonInput {
                query: lookup(examples, RecordSequence::Examples, i, &keys.question_key)?.clone(),
                answer: lookup(examples, RecordSequence::Examples, i, &keys.answer_key)?.clone(),
                student_a: lookup(
                    predictions_a,
                    RecordSequence::PredictionsA,
                    i,
                    &keys.prediction_key,
                )?
                .clone(),
                student_b: lookup(
                    predictions_b,
                    RecordSequence::PredictionsB,
                    i,
                    &keys.prediction_key,
                )?
                .clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(count = inputs.len(), "Built comparison inputs");
    Ok(inputs)
}
