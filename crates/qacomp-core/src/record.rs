//! Example and prediction records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::EvalError;

/// A key-value record: one example or one prediction.
pub type Record = BTreeMap<String, Value>;

/// Which input sequence a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSequence {
    Examples,
    PredictionsA,
    PredictionsB,
}

impl fmt::Display for RecordSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSequence::Examples => write!(f, "examples"),
            RecordSequence::PredictionsA => write!(f, "predictions_a"),
            RecordSequence::PredictionsB => write!(f, "predictions_b"),
        }
    }
}

/// Field names used to read examples and predictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationKeys {
    /// Example field holding the question
    pub question_key: String,

    /// Example field holding the reference answer
    pub answer_key: String,

    /// Prediction field holding the candidate answer
    pub prediction_key: String,
}

impl Default for EvaluationKeys {
    fn default() -> Self {
        Self {
            question_key: "query".to_string(),
            answer_key: "answer".to_string(),
            prediction_key: "result".to_string(),
        }
    }
}

impl EvaluationKeys {
    pub fn with_question_key(mut self, key: impl Into<String>) -> Self {
        self.question_key = key.into();
        self
    }

    pub fn with_answer_key(mut self, key: impl Into<String>) -> Self {
        self.answer_key = key.into();
        self
    }

    pub fn with_prediction_key(mut self, key: impl Into<String>) -> Self {
        self.prediction_key = key.into();
        self
    }
}

/// Fetch `records[index][key]`.
///
/// An index past the end is `IndexOutOfRange`; an absent key is `KeyLookup`.
pub fn lookup<'a>(
    records: &'a [Record],
    sequence: RecordSequence,
    index: usize,
    key: &str,
) -> Result<&'a Value, EvalError> {
    let record = records.get(index).ok_or(EvalError::IndexOutOfRange {
        sequence,
        index,
        len: records.len(),
    })?;

    record.get(key).ok_or_else(|| EvalError::KeyLookup {
        sequence,
        index,
        key: key.to_string(),
    })
}
