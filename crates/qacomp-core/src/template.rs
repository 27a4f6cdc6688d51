//! Chat prompt templates with named placeholders.
//!
//! A template is an ordered list of role-tagged message templates. Each
//! message text uses `{name}` placeholders; `{{` and `}}` produce literal
//! braces. The declared input variables default to the union of all
//! placeholders but can be declared explicitly, the way a caller-supplied
//! template declares its own inputs.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Values used to render a template, keyed by variable name.
pub type TemplateValues = BTreeMap<String, Value>;

lazy_static! {
    // Order matters: escapes must win over a single brace.
    static ref TOKEN: Regex =
        Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("Invalid regex");
    static ref VARIABLE_NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex");
}

/// Errors from parsing, loading or rendering templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unbalanced '{brace}' at byte {position}")]
    UnbalancedBrace { brace: char, position: usize },

    #[error("Invalid placeholder name '{0}'")]
    InvalidVariable(String),

    #[error("Missing value for input variable '{0}'")]
    MissingValue(String),

    #[error("Value '{0}' is not a declared input variable")]
    UnexpectedValue(String),

    #[error("Template has no messages")]
    Empty,

    #[error("Failed to read template file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

fn parse_segments(template: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut last = 0;

    for caps in TOKEN.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        literal.push_str(&template[last..whole.start()]);
        last = whole.end();

        match whole.as_str() {
            "{{" => literal.push('{'),
            "}}" => literal.push('}'),
            "{" | "}" => {
                return Err(TemplateError::UnbalancedBrace {
                    brace: whole.as_str().chars().next().unwrap_or('{'),
                    position: whole.start(),
                });
            }
            _ => {
                let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                if !VARIABLE_NAME.is_match(name) {
                    return Err(TemplateError::InvalidVariable(name.to_string()));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(name.to_string()));
            }
        }
    }

    literal.push_str(&template[last..]);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Render a JSON value the way it should appear inside a prompt.
///
/// Strings are inserted raw; everything else uses compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A single role-tagged message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    role: Role,
    template: String,
    segments: Vec<Segment>,
}

impl MessageTemplate {
    /// Parse a message template.
    pub fn new(role: Role, template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        let segments = parse_segments(&template)?;
        Ok(Self {
            role,
            template,
            segments,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The unparsed template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of appearance (may repeat).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    fn render(&self, values: &TemplateValues) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = values
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingValue(name.clone()))?;
                    out.push_str(&render_value(value));
                }
            }
        }
        Ok(out)
    }
}

/// A rendered chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// A chat prompt template with a declared set of input variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    messages: Vec<MessageTemplate>,
    input_variables: BTreeSet<String>,
}

impl PromptTemplate {
    /// Build a template from role/text pairs.
    ///
    /// The declared input variables are the union of all placeholders.
    pub fn from_messages<I, S>(messages: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (Role, S)>,
        S: Into<String>,
    {
        let messages = messages
            .into_iter()
            .map(|(role, text)| MessageTemplate::new(role, text))
            .collect::<Result<Vec<_>, _>>()?;

        if messages.is_empty() {
            return Err(TemplateError::Empty);
        }

        let input_variables = messages
            .iter()
            .flat_map(|m| m.placeholders())
            .map(str::to_string)
            .collect();

        Ok(Self {
            messages,
            input_variables,
        })
    }

    /// Build a template with a single user message.
    pub fn from_template(template: impl Into<String>) -> Result<Self, TemplateError> {
        Self::from_messages([(Role::User, template.into())])
    }

    /// Replace the declared input variables.
    ///
    /// Rendering still fails if a placeholder has no value.
    pub fn with_input_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_variables = variables.into_iter().map(Into::into).collect();
        self
    }

    /// Load a template from YAML.
    ///
    /// ```yaml
    /// input_variables: [query, answer, result]   # optional
    /// messages:
    ///   - role: system
    ///     template: "You are a grader."
    ///   - role: user
    ///     template: "QUESTION: {query}"
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, TemplateError> {
        let file: TemplateFile = serde_yaml::from_str(yaml)?;
        let template =
            Self::from_messages(file.messages.into_iter().map(|m| (m.role, m.template)))?;
        Ok(match file.input_variables {
            Some(vars) => template.with_input_variables(vars),
            None => template,
        })
    }

    /// Load a template from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// The declared input variables.
    pub fn input_variables(&self) -> &BTreeSet<String> {
        &self.input_variables
    }

    /// Every placeholder that appears in the message texts.
    pub fn placeholders(&self) -> BTreeSet<String> {
        self.messages
            .iter()
            .flat_map(|m| m.placeholders())
            .map(str::to_string)
            .collect()
    }

    pub fn messages(&self) -> &[MessageTemplate] {
        &self.messages
    }

    /// Render every message.
    ///
    /// `values` must contain exactly the declared input variables.
    pub fn format_messages(
        &self,
        values: &TemplateValues,
    ) -> Result<Vec<PromptMessage>, TemplateError> {
        if let Some(missing) = self
            .input_variables
            .iter()
            .find(|name| !values.contains_key(*name))
        {
            return Err(TemplateError::MissingValue(missing.clone()));
        }
        if let Some(extra) = values
            .keys()
            .find(|key| !self.input_variables.contains(*key))
        {
            return Err(TemplateError::UnexpectedValue(extra.clone()));
        }

        self.messages
            .iter()
            .map(|m| {
                Ok(PromptMessage {
                    role: m.role,
                    content: m.render(values)?,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    input_variables: Option<Vec<String>>,
    messages: Vec<MessageSpec>,
}

#[derive(Debug, Deserialize)]
struct MessageSpec {
    role: Role,
    template: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> TemplateValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_input_variables_from_placeholders() {
        let template = PromptTemplate::from_messages([
            (Role::System, "Grade {query}"),
            (Role::User, "{answer} vs {result} and {query} again"),
        ])
        .unwrap();

        let vars: Vec<&str> = template.input_variables().iter().map(String::as_str).collect();
        assert_eq!(vars, vec!["answer", "query", "result"]);
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let template = PromptTemplate::from_template("Return {{\"grade\": {grade}}}").unwrap();
        assert_eq!(template.input_variables().len(), 1);

        let rendered = template
            .format_messages(&values(&[("grade", json!("A"))]))
            .unwrap();
        assert_eq!(rendered[0].content, "Return {\"grade\": A}");
    }

    #[test]
    fn test_unbalanced_brace_rejected() {
        let err = PromptTemplate::from_template("oops { here").unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UnbalancedBrace { brace: '{', position: 5 }
        ));

        let err = PromptTemplate::from_template("oops } here").unwrap_err();
        assert!(matches!(err, TemplateError::UnbalancedBrace { brace: '}', .. }));
    }

    #[test]
    fn test_invalid_placeholder_name() {
        let err = PromptTemplate::from_template("{not a name}").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidVariable(name) if name == "not a name"));

        let err = PromptTemplate::from_template("{}").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidVariable(_)));
    }

    #[test]
    fn test_empty_template_rejected() {
        let err = PromptTemplate::from_messages(Vec::<(Role, String)>::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Empty));
    }

    #[test]
    fn test_render_requires_exact_values() {
        let template = PromptTemplate::from_template("{a} and {b}").unwrap();

        let err = template
            .format_messages(&values(&[("a", json!("x"))]))
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingValue(name) if name == "b"));

        let err = template
            .format_messages(&values(&[
                ("a", json!("x")),
                ("b", json!("y")),
                ("c", json!("z")),
            ]))
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnexpectedValue(name) if name == "c"));
    }

    #[test]
    fn test_non_string_values_render_as_json() {
        let template = PromptTemplate::from_template("{n} / {list} / {s}").unwrap();
        let rendered = template
            .format_messages(&values(&[
                ("n", json!(42)),
                ("list", json!(["x", 1])),
                ("s", json!("plain")),
            ]))
            .unwrap();
        assert_eq!(rendered[0].content, "42 / [\"x\",1] / plain");
    }

    #[test]
    fn test_declared_variables_override() {
        let template = PromptTemplate::from_template("{query}")
            .unwrap()
            .with_input_variables(["query", "answer"]);

        assert_eq!(template.input_variables().len(), 2);
        assert_eq!(template.placeholders().len(), 1);

        // Declared but unused variables are still required
        let err = template
            .format_messages(&values(&[("query", json!("q"))]))
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingValue(name) if name == "answer"));
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
messages:
  - role: system
    template: "You grade answers."
  - role: human
    template: "QUESTION: {query}"
"#;
        let template = PromptTemplate::from_yaml(yaml).unwrap();
        assert_eq!(template.messages().len(), 2);
        assert_eq!(template.messages()[1].role(), Role::User);
        assert!(template.input_variables().contains("query"));

        let yaml_with_decl = r#"
input_variables: [query, extra]
messages:
  - role: user
    template: "{query}"
"#;
        let template = PromptTemplate::from_yaml(yaml_with_decl).unwrap();
        assert!(template.input_variables().contains("extra"));
    }

    #[test]
    fn test_from_yaml_file_missing() {
        let err = PromptTemplate::from_yaml_file("/nonexistent/template.yaml").unwrap_err();
        assert!(matches!(err, TemplateError::IoError(_)));
    }
}
