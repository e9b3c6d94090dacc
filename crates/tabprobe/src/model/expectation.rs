use super::completion::CompletionResult;
use super::CONTEXT_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Caller-declared oracle for one probe.
///
/// In suite files an expectation is written as exactly one of
/// `{immediate: "..."}`, `{choices: [...], other_choices_ok: bool}`,
/// `{lines: [...], other_lines_ok: bool}` or `{no_choices: true}`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExpectationSpec", into = "ExpectationSpec")]
pub enum Expectation {
    /// The shell must insert exactly this text after the first TAB.
    Immediate(String),
    /// The shell must list these tokens after the second TAB.
    Choices {
        tokens: BTreeSet<String>,
        /// Tolerate observed tokens that were not expected.
        other_choices_ok: bool,
    },
    /// Line-granularity variant of `Choices`, for candidates containing spaces.
    Lines {
        lines: Vec<String>,
        other_lines_ok: bool,
    },
    /// No candidates may be offered at all.
    NoChoices,
}

impl Expectation {
    pub fn immediate(text: impl Into<String>) -> Self {
        Self::Immediate(text.into())
    }

    /// Exact token-set expectation. An empty set is the same as [`Expectation::NoChoices`].
    pub fn choices<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choices {
            tokens: tokens.into_iter().map(Into::into).collect(),
            other_choices_ok: false,
        }
    }

    /// Token-set expectation that tolerates additional observed tokens.
    pub fn choices_including<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choices {
            tokens: tokens.into_iter().map(Into::into).collect(),
            other_choices_ok: true,
        }
    }

    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Lines {
            lines: lines.into_iter().map(Into::into).collect(),
            other_lines_ok: false,
        }
    }

    /// Replace `{context}` in every expected value with the session context name.
    #[must_use]
    pub fn with_context(&self, context: Option<&str>) -> Self {
        let Some(context) = context else {
            return self.clone();
        };
        let fill = |value: &String| value.replace(CONTEXT_PLACEHOLDER, context);
        match self {
            Self::Immediate(text) => Self::Immediate(fill(text)),
            Self::Choices {
                tokens,
                other_choices_ok,
            } => Self::Choices {
                tokens: tokens.iter().map(fill).collect(),
                other_choices_ok: *other_choices_ok,
            },
            Self::Lines {
                lines,
                other_lines_ok,
            } => Self::Lines {
                lines: lines.iter().map(fill).collect(),
                other_lines_ok: *other_lines_ok,
            },
            Self::NoChoices => Self::NoChoices,
        }
    }
}

/// Flat serde shape of [`Expectation`]; exactly one field group may be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immediate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub other_choices_ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub other_lines_ok: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_choices: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

impl TryFrom<ExpectationSpec> for Expectation {
    type Error = String;

    fn try_from(spec: ExpectationSpec) -> Result<Self, Self::Error> {
        let groups = [
            spec.immediate.is_some(),
            spec.choices.is_some(),
            spec.lines.is_some(),
            spec.no_choices,
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if groups != 1 {
            return Err(
                "expectation must set exactly one of immediate, choices, lines, no_choices"
                    .to_string(),
            );
        }
        if spec.other_choices_ok && spec.choices.is_none() {
            return Err("other_choices_ok requires choices".to_string());
        }
        if spec.other_lines_ok && spec.lines.is_none() {
            return Err("other_lines_ok requires lines".to_string());
        }
        if let Some(text) = spec.immediate {
            if text.is_empty() {
                return Err("immediate expectation must not be empty".to_string());
            }
            return Ok(Self::Immediate(text));
        }
        if let Some(tokens) = spec.choices {
            return Ok(Self::Choices {
                tokens: tokens.into_iter().collect(),
                other_choices_ok: spec.other_choices_ok,
            });
        }
        if let Some(lines) = spec.lines {
            return Ok(Self::Lines {
                lines,
                other_lines_ok: spec.other_lines_ok,
            });
        }
        Ok(Self::NoChoices)
    }
}

impl From<Expectation> for ExpectationSpec {
    fn from(expectation: Expectation) -> Self {
        match expectation {
            Expectation::Immediate(text) => Self {
                immediate: Some(text),
                ..Self::default()
            },
            Expectation::Choices {
                tokens,
                other_choices_ok,
            } => Self {
                choices: Some(tokens.into_iter().collect()),
                other_choices_ok,
                ..Self::default()
            },
            Expectation::Lines {
                lines,
                other_lines_ok,
            } => Self {
                lines: Some(lines),
                other_lines_ok,
                ..Self::default()
            },
            Expectation::NoChoices => Self {
                no_choices: true,
                ..Self::default()
            },
        }
    }
}

/// Result of matching a [`CompletionResult`] against an [`Expectation`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Pass,
    Fail(Mismatch),
}

impl MatchOutcome {
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }

    #[must_use]
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            Self::Pass => None,
            Self::Fail(mismatch) => Some(mismatch),
        }
    }
}

/// Structured diagnostic for a failed match, carrying both sides.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    pub message: String,
    pub detail: MismatchDetail,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchDetail {
    /// The result variant itself was wrong (e.g. a list where text was expected).
    WrongKind {
        expected: String,
        observed: CompletionResult,
    },
    Immediate {
        observed: String,
        observed_len: usize,
        expected: String,
        expected_len: usize,
    },
    Tokens {
        observed_count: usize,
        expected_count: usize,
        /// Expected tokens that were not offered.
        missing: BTreeSet<String>,
        /// Offered tokens that were not expected (empty when extras are tolerated).
        unexpected: BTreeSet<String>,
        observed: BTreeSet<String>,
        expected: BTreeSet<String>,
    },
    Lines {
        observed_count: usize,
        expected_count: usize,
        observed: Vec<String>,
        expected: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_expectation_shape() {
        let immediate: Expectation = serde_json::from_value(serde_json::json!({
            "immediate": "ER "
        }))
        .unwrap();
        assert_eq!(immediate, Expectation::immediate("ER "));

        let choices: Expectation = serde_json::from_value(serde_json::json!({
            "choices": ["SELECT", "INSERT"],
            "other_choices_ok": true
        }))
        .unwrap();
        assert_eq!(choices, Expectation::choices_including(["INSERT", "SELECT"]));

        let lines: Expectation = serde_json::from_value(serde_json::json!({
            "lines": ["<value for name (text)>"]
        }))
        .unwrap();
        assert_eq!(lines, Expectation::lines(["<value for name (text)>"]));

        let none: Expectation =
            serde_json::from_value(serde_json::json!({"no_choices": true})).unwrap();
        assert_eq!(none, Expectation::NoChoices);
    }

    #[test]
    fn rejects_ambiguous_or_empty_expectations() {
        let both = serde_json::from_value::<Expectation>(serde_json::json!({
            "immediate": "x",
            "choices": ["y"]
        }));
        assert!(both.is_err());

        let nothing = serde_json::from_value::<Expectation>(serde_json::json!({}));
        assert!(nothing.is_err());

        let empty_immediate =
            serde_json::from_value::<Expectation>(serde_json::json!({"immediate": ""}));
        assert!(empty_immediate.is_err());

        let dangling_flag = serde_json::from_value::<Expectation>(serde_json::json!({
            "immediate": "x",
            "other_choices_ok": true
        }));
        assert!(dangling_flag.is_err());
    }

    #[test]
    fn with_context_fills_placeholders() {
        let expectation = Expectation::choices(["IF", "{context}"]);
        assert_eq!(
            expectation.with_context(Some("ks1")),
            Expectation::choices(["IF", "ks1"])
        );
        assert_eq!(expectation.with_context(None), expectation);
    }

    #[test]
    fn serializes_back_to_flat_shape() {
        let value = serde_json::to_value(Expectation::choices_including(["A"])).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"choices": ["A"], "other_choices_ok": true})
        );
    }
}
