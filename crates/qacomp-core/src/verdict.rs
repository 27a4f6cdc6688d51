//! Preference verdicts in model output.
//!
//! The built-in prompt asks the model to end with `PREFERENCE: A`,
//! `PREFERENCE: B` or `PREFERENCE: TIE`. Parsing is best effort: the last
//! matching line wins, and text without one yields `None`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref PREFERENCE_LINE: Regex = Regex::new(
        r"(?im)^\W*PREFERENCE\W*:\W*(?:STUDENT\s+)?(A|B|TIE)\b"
    )
    .expect("Invalid regex");
}

/// Which candidate the grader preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    StudentA,
    StudentB,
    Tie,
}

/// Extract the preference from grader text.
pub fn parse_preference(text: &str) -> Option<Preference> {
    let caps = PREFERENCE_LINE.captures_iter(text).last()?;
    match caps.get(1)?.as_str().to_ascii_uppercase().as_str() {
        "A" => Some(Preference::StudentA),
        "B" => Some(Preference::StudentB),
        "TIE" => Some(Preference::Tie),
        _ => None,
    }
}

/// Counts of preferences over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceTally {
    pub student_a: usize,
    pub student_b: usize,
    pub tie: usize,
    /// Outputs with no recognizable verdict
    pub unparsed: usize,
}

impl PreferenceTally {
    /// Tally the verdicts in a sequence of grader texts.
    pub fn from_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut tally = Self::default();
        for text in texts {
            tally.record(parse_preference(text));
        }
        tally
    }

    pub fn record(&mut self, preference: Option<Preference>) {
        match preference {
            Some(Preference::StudentA) => self.student_a += 1,
            Some(Preference::StudentB) => self.student_b += 1,
            Some(Preference::Tie) => self.tie += 1,
            None => self.unparsed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.student_a + self.student_b + self.tie + self.unparsed
    }
}
