//! Judging a classified result against an expectation.
//!
//! Matching is pure: it never touches the session and never retries. A
//! completion engine is assumed deterministic for a given input.

use crate::model::{CompletionResult, Expectation, MatchOutcome, Mismatch, MismatchDetail};
use std::collections::BTreeSet;

pub fn evaluate(observed: &CompletionResult, expected: &Expectation) -> MatchOutcome {
    match expected {
        Expectation::Immediate(text) => match_immediate(observed, text),
        Expectation::Choices {
            tokens,
            other_choices_ok,
        } => match_tokens(observed, tokens, *other_choices_ok),
        Expectation::Lines {
            lines,
            other_lines_ok,
        } => match_lines(observed, lines, *other_lines_ok),
        Expectation::NoChoices => match_tokens(observed, &BTreeSet::new(), false),
    }
}

fn match_immediate(observed: &CompletionResult, expected: &str) -> MatchOutcome {
    let Some(text) = observed.immediate_text() else {
        return wrong_kind(observed, format!("immediate {expected:?}"));
    };
    if text == expected {
        return MatchOutcome::Pass;
    }
    MatchOutcome::Fail(Mismatch {
        message: format!(
            "expected immediate completion {expected:?} (len {}), got {text:?} (len {})",
            expected.len(),
            text.len()
        ),
        detail: MismatchDetail::Immediate {
            observed: text.to_string(),
            observed_len: text.len(),
            expected: expected.to_string(),
            expected_len: expected.len(),
        },
    })
}

fn match_tokens(
    observed: &CompletionResult,
    expected: &BTreeSet<String>,
    other_choices_ok: bool,
) -> MatchOutcome {
    let Some(tokens) = observed.tokens() else {
        let wanted = if expected.is_empty() {
            "no choices".to_string()
        } else {
            format!("choices {expected:?}")
        };
        return wrong_kind(observed, wanted);
    };

    let missing: BTreeSet<String> = expected.difference(&tokens).cloned().collect();
    let unexpected: BTreeSet<String> = if other_choices_ok {
        BTreeSet::new()
    } else {
        tokens.difference(expected).cloned().collect()
    };
    if missing.is_empty() && unexpected.is_empty() {
        return MatchOutcome::Pass;
    }

    let mut message = format!(
        "expected {} choice(s), got {}",
        expected.len(),
        tokens.len()
    );
    if !missing.is_empty() {
        message.push_str(&format!("; missing {missing:?}"));
    }
    if !unexpected.is_empty() {
        message.push_str(&format!("; unexpected {unexpected:?}"));
    }
    MatchOutcome::Fail(Mismatch {
        message,
        detail: MismatchDetail::Tokens {
            observed_count: tokens.len(),
            expected_count: expected.len(),
            missing,
            unexpected,
            observed: tokens,
            expected: expected.clone(),
        },
    })
}

fn match_lines(observed: &CompletionResult, expected: &[String], other_lines_ok: bool) -> MatchOutcome {
    let Some(lines) = observed.lines() else {
        return wrong_kind(observed, format!("lines {expected:?}"));
    };
    let passed = if other_lines_ok {
        expected.iter().all(|line| lines.contains(line))
    } else {
        lines == expected
    };
    if passed {
        return MatchOutcome::Pass;
    }
    MatchOutcome::Fail(Mismatch {
        message: format!(
            "expected {} line(s) {expected:?}, got {} {lines:?}",
            expected.len(),
            lines.len()
        ),
        detail: MismatchDetail::Lines {
            observed_count: lines.len(),
            expected_count: expected.len(),
            observed: lines.to_vec(),
            expected: expected.to_vec(),
        },
    })
}

fn wrong_kind(observed: &CompletionResult, expected: String) -> MatchOutcome {
    MatchOutcome::Fail(Mismatch {
        message: format!("expected {expected}, got {} result", observed.kind()),
        detail: MismatchDetail::WrongKind {
            expected,
            observed: observed.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(lines: &[&str]) -> CompletionResult {
        CompletionResult::from_lines(lines)
    }

    #[test]
    fn immediate_requires_byte_equality() {
        let observed = CompletionResult::immediate("ALTER ");
        assert!(evaluate(&observed, &Expectation::immediate("ALTER ")).passed());

        let outcome = evaluate(&observed, &Expectation::immediate("ALTER"));
        let Some(Mismatch {
            detail:
                MismatchDetail::Immediate {
                    observed_len,
                    expected_len,
                    ..
                },
            ..
        }) = outcome.mismatch()
        else {
            panic!("expected immediate mismatch, got {outcome:?}");
        };
        assert_eq!((*observed_len, *expected_len), (6, 5));
    }

    #[test]
    fn immediate_expectation_fails_on_list() {
        let outcome = evaluate(&listed(&["A  B"]), &Expectation::immediate("A"));
        assert!(matches!(
            outcome.mismatch().map(|m| &m.detail),
            Some(MismatchDetail::WrongKind { .. })
        ));
    }

    #[test]
    fn exact_choices_fail_on_superset_and_subset() {
        let expected = Expectation::choices(["IF", "ks"]);
        assert!(evaluate(&listed(&["IF  ks"]), &expected).passed());
        assert!(!evaluate(&listed(&["IF  ks  system"]), &expected).passed());
        assert!(!evaluate(&listed(&["IF"]), &expected).passed());
    }

    #[test]
    fn tolerant_choices_pass_on_superset_only() {
        let expected = Expectation::choices_including(["SELECT", "INSERT"]);
        assert!(evaluate(&listed(&["ALTER  INSERT  SELECT"]), &expected).passed());
        assert!(!evaluate(&listed(&["ALTER  SELECT"]), &expected).passed());
    }

    #[test]
    fn token_mismatch_reports_symmetric_difference() {
        let outcome = evaluate(&listed(&["a  c"]), &Expectation::choices(["a", "b"]));
        let Some(MismatchDetail::Tokens {
            missing,
            unexpected,
            observed_count,
            expected_count,
            ..
        }) = outcome.mismatch().map(|m| &m.detail)
        else {
            panic!("expected token mismatch");
        };
        assert!(missing.contains("b"));
        assert!(unexpected.contains("c"));
        assert_eq!((*observed_count, *expected_count), (2, 2));
    }

    #[test]
    fn empty_expectation_passes_only_without_candidates() {
        assert!(evaluate(&CompletionResult::Empty, &Expectation::NoChoices).passed());
        assert!(evaluate(&CompletionResult::Empty, &Expectation::choices(Vec::<String>::new())).passed());
        assert!(!evaluate(&listed(&["x"]), &Expectation::NoChoices).passed());
        assert!(!evaluate(&CompletionResult::immediate(" "), &Expectation::NoChoices).passed());
    }

    #[test]
    fn lines_compare_in_order_or_by_inclusion() {
        let observed = listed(&["<value for name (text)>", "other line"]);
        assert!(!evaluate(&observed, &Expectation::lines(["<value for name (text)>"])).passed());
        let tolerant = Expectation::Lines {
            lines: vec!["<value for name (text)>".into()],
            other_lines_ok: true,
        };
        assert!(evaluate(&observed, &tolerant).passed());
        let reordered = Expectation::lines(["other line", "<value for name (text)>"]);
        assert!(!evaluate(&observed, &reordered).passed());
    }
}
