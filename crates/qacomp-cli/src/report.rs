//! JSON report for a comparison run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use qacomp_core::{parse_preference, Preference, PreferenceTally};
use qacomp_runtime::ChainOutput;

#[derive(Debug, Serialize)]
pub struct ComparisonReport {
    pub evaluated_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub examples: usize,
    pub preferences: PreferenceTally,
    pub results: Vec<ReportEntry>,
}

#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub index: usize,
    /// Parsed from the model text; `null` when no verdict line was found
    pub preference: Option<Preference>,
    #[serde(flatten)]
    pub output: ChainOutput,
}

impl ComparisonReport {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        output_key: &str,
        results: Vec<ChainOutput>,
    ) -> Self {
        let mut preferences = PreferenceTally::default();
        let results: Vec<ReportEntry> = results
            .into_iter()
            .enumerate()
            .map(|(index, output)| {
                let preference = output
                    .get(output_key)
                    .and_then(|v| v.as_str())
                    .and_then(parse_preference);
                preferences.record(preference);
                ReportEntry {
                    index,
                    preference,
                    output,
                }
            })
            .collect();

        Self {
            evaluated_at: Utc::now(),
            provider: provider.into(),
            model: model.into(),
            examples: results.len(),
            preferences,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(text: &str) -> ChainOutput {
        ChainOutput::from([
            ("query".to_string(), json!("Q")),
            ("text".to_string(), json!(text)),
        ])
    }

    #[test]
    fn test_report_tallies_preferences() {
        let report = ComparisonReport::new(
            "anthropic",
            "claude-sonnet-4-5-20250514",
            "text",
            vec![output("PREFERENCE: B"), output("PREFERENCE: TIE"), output("unsure")],
        );

        assert_eq!(report.examples, 3);
        assert_eq!(report.preferences.student_b, 1);
        assert_eq!(report.preferences.tie, 1);
        assert_eq!(report.preferences.unparsed, 1);
        assert_eq!(report.results[0].preference, Some(Preference::StudentB));
        assert_eq!(report.results[2].preference, None);
    }

    #[test]
    fn test_entries_flatten_chain_output() {
        let report = ComparisonReport::new("p", "m", "text", vec![output("PREFERENCE: A")]);
        let json = serde_json::to_value(&report).unwrap();

        let entry = &json["results"][0];
        assert_eq!(entry["index"], 0);
        assert_eq!(entry["preference"], "student_a");
        assert_eq!(entry["query"], "Q");
        assert_eq!(entry["text"], "PREFERENCE: A");
    }
}
