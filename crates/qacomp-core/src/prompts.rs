//! Built-in comparison prompt.
//!
//! The prompt is split into a stable system part and a per-example user part
//! so providers with prompt caching can reuse the system block across a batch.
//!
//! Placeholders:
//! - `{query}`: the question
//! - `{answer}`: the reference answer
//! - `{result}`: both candidate answers, labelled A and B

use lazy_static::lazy_static;

use crate::template::{PromptTemplate, Role};

/// System instructions for the comparison grader.
pub const CHAT_COMP_SYSTEM_PROMPT: &str = r#"
You are a teacher comparing two students' answers to the same quiz question.

You are given the question, the true answer, and one answer from each of two
students, labelled STUDENT A and STUDENT B.

## Grading Rules
1. Judge each student answer only on factual agreement with the true answer
2. Ignore differences in punctuation and phrasing
3. An answer may contain more information than the true answer as long as it
   does not contradict it
4. Do not prefer an answer because of its position or its length

## Output Format
Explain your reasoning step by step in a few sentences, then end with a final
line of exactly one of:

PREFERENCE: A
PREFERENCE: B
PREFERENCE: TIE
"#;

/// Per-example part of the comparison prompt.
pub const CHAT_COMP_USER_PROMPT: &str = r#"QUESTION: {query}

TRUE ANSWER: {answer}

{result}

Which student answered better?"#;

lazy_static! {
    /// Default comparison prompt declaring `{query, answer, result}`.
    pub static ref CHAT_COMP_PROMPT: PromptTemplate = PromptTemplate::from_messages([
        (Role::System, CHAT_COMP_SYSTEM_PROMPT.trim()),
        (Role::User, CHAT_COMP_USER_PROMPT),
    ])
    .expect("Invalid built-in comparison prompt");
}
