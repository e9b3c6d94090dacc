use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the shell did in response to one completion probe.
///
/// Exactly one variant is produced per probe. `Immediate` is returned as soon
/// as anything is inserted after the first TAB, so it never coexists with a
/// candidate list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionResult {
    /// Text the shell appended to the line after the first TAB, with
    /// `" \b"` erase pairs and terminal bells removed.
    Immediate { text: String },
    /// Candidates printed below the line after the second TAB.
    Listed {
        /// Union of the whitespace-separated tokens of every candidate line.
        tokens: BTreeSet<String>,
        /// Non-empty trimmed candidate lines, in the order printed.
        lines: Vec<String>,
    },
    /// The shell printed nothing at all (or only a bell) for the probe.
    Empty,
}

impl CompletionResult {
    pub fn immediate(text: impl Into<String>) -> Self {
        Self::Immediate { text: text.into() }
    }

    /// Build a listed result from already-trimmed candidate lines.
    ///
    /// Returns `Empty` when no non-empty line remains.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            return Self::Empty;
        }
        let tokens = tokens_of(&lines);
        Self::Listed { tokens, lines }
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Immediate { .. } => "immediate",
            Self::Listed { .. } => "listed",
            Self::Empty => "empty",
        }
    }

    #[must_use]
    pub fn immediate_text(&self) -> Option<&str> {
        match self {
            Self::Immediate { text } => Some(text),
            _ => None,
        }
    }

    /// Candidate tokens; `Empty` yields an empty set, `Immediate` yields `None`.
    #[must_use]
    pub fn tokens(&self) -> Option<BTreeSet<String>> {
        match self {
            Self::Listed { tokens, .. } => Some(tokens.clone()),
            Self::Empty => Some(BTreeSet::new()),
            Self::Immediate { .. } => None,
        }
    }

    /// Candidate lines; `Empty` yields no lines, `Immediate` yields `None`.
    #[must_use]
    pub fn lines(&self) -> Option<&[String]> {
        match self {
            Self::Listed { lines, .. } => Some(lines),
            Self::Empty => Some(&[]),
            Self::Immediate { .. } => None,
        }
    }
}

/// Split every line on runs of whitespace and union the pieces.
pub fn tokens_of<S: AsRef<str>>(lines: &[S]) -> BTreeSet<String> {
    lines
        .iter()
        .flat_map(|line| line.as_ref().split_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_lines_unions_tokens_across_lines() {
        let result = CompletionResult::from_lines(["  ALTER   BEGIN ", "", "SELECT\tALTER"]);
        let CompletionResult::Listed { tokens, lines } = result else {
            panic!("expected listed result");
        };
        assert_eq!(lines, vec!["ALTER   BEGIN", "SELECT\tALTER"]);
        let expected: BTreeSet<String> = ["ALTER", "BEGIN", "SELECT"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn from_lines_with_only_blank_lines_is_empty() {
        assert_eq!(
            CompletionResult::from_lines(["", "   ", "\t"]),
            CompletionResult::Empty
        );
    }

    #[test]
    fn empty_has_no_tokens_but_immediate_has_none() {
        assert_eq!(CompletionResult::Empty.tokens(), Some(BTreeSet::new()));
        assert_eq!(CompletionResult::immediate("ER ").tokens(), None);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let value = serde_json::to_value(CompletionResult::immediate("OP ")).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "immediate", "text": "OP "}));
    }
}
