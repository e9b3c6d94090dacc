//! Prompt recognition.
//!
//! A prompt template is a regular expression in which `{context}` stands for
//! the session's context name (for example the active keyspace). The context
//! is inserted literally, so names containing regex metacharacters are safe.

use crate::model::CONTEXT_PLACEHOLDER;
use crate::runner::{HarnessError, HarnessResult};
use regex::Regex;

/// Matches any context name when the session has none.
const ANY_CONTEXT: &str = r"\S*";

#[derive(Clone, Debug)]
pub struct PromptPattern {
    template: String,
    context: Option<String>,
    source: String,
    /// `source` without its leading whitespace, literal or escaped.
    line_source: String,
    stream: regex::bytes::Regex,
    line_start: regex::bytes::Regex,
}

impl PromptPattern {
    pub fn new(template: &str, context: Option<String>) -> HarnessResult<Self> {
        let fill = match &context {
            Some(name) => regex::escape(name),
            None => ANY_CONTEXT.to_string(),
        };
        let source = template.replace(CONTEXT_PLACEHOLDER, &fill);
        let line_source = trim_leading_whitespace(&source).to_string();
        let stream = compile_bytes(&source)?;
        let line_start = compile_bytes(&line_source)?;
        Ok(Self {
            template: template.to_string(),
            context,
            source,
            line_source,
            stream,
            line_start,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Prompt as it appears in the byte stream after a cancelled line.
    pub fn stream_regex(&self) -> &regex::bytes::Regex {
        &self.stream
    }

    /// Prompt with its leading whitespace removed, for the first prompt after
    /// spawn where no preceding newline is printed.
    pub fn line_start_regex(&self) -> &regex::bytes::Regex {
        &self.line_start
    }

    /// Matcher for the prompt re-drawn after a candidate list, immediately
    /// followed by the literal probe input.
    ///
    /// Unanchored: line editors may print control sequences (such as the
    /// bracketed-paste toggle) ahead of the prompt on the same line.
    pub fn redraw_regex(&self, input: &str) -> HarnessResult<Regex> {
        let pattern = format!("(?:{}){}", self.line_source, regex::escape(input));
        Regex::new(&pattern).map_err(|err| {
            HarnessError::config(
                "prompt template does not form a valid redraw pattern",
                serde_json::json!({ "pattern": pattern, "source": err.to_string() }),
            )
        })
    }
}

/// Whitespace escapes a template may open with, as typed in a quoted shell argument.
const WHITESPACE_ESCAPES: [&str; 4] = ["\\n", "\\r", "\\t", "\\s"];

/// Strip leading whitespace from a regex source, including whitespace written
/// as an escape (with an optional quantifier).
fn trim_leading_whitespace(source: &str) -> &str {
    let mut rest = source;
    loop {
        let trimmed = rest.trim_start();
        let next = WHITESPACE_ESCAPES
            .iter()
            .find_map(|escape| trimmed.strip_prefix(*escape))
            .map_or(trimmed, |after| after.trim_start_matches(['*', '+', '?']));
        if next.len() == rest.len() {
            return rest;
        }
        rest = next;
    }
}

fn compile_bytes(source: &str) -> HarnessResult<regex::bytes::Regex> {
    regex::bytes::Regex::new(source).map_err(|err| {
        HarnessError::config(
            "invalid prompt template",
            serde_json::json!({ "pattern": source, "source": err.to_string() }),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ErrorCode;

    #[test]
    fn context_is_inserted_literally() {
        let prompt = PromptPattern::new("\nfake:{context}> ", Some("k.s".into())).unwrap();
        assert!(prompt.stream_regex().is_match(b"^C\r\nfake:k.s> "));
        assert!(!prompt.stream_regex().is_match(b"^C\r\nfake:kXs> "));
    }

    #[test]
    fn missing_context_matches_any_name() {
        let prompt = PromptPattern::new("\nfake:{context}> ", None).unwrap();
        assert!(prompt.stream_regex().is_match(b"\nfake:whatever> "));
        assert!(prompt.stream_regex().is_match(b"\nfake:> "));
    }

    #[test]
    fn line_start_regex_ignores_leading_newline() {
        let prompt = PromptPattern::new("\nfake:{context}> ", Some("ks".into())).unwrap();
        assert!(prompt.line_start_regex().is_match(b"fake:ks> "));
        assert!(!prompt.stream_regex().is_match(b"fake:ks> "));
    }

    #[test]
    fn redraw_regex_escapes_input() {
        let prompt = PromptPattern::new("\nfake:{context}> ", Some("ks".into())).unwrap();
        let redraw = prompt.redraw_regex("SELECT * FROM (").unwrap();
        assert!(redraw.is_match("fake:ks> SELECT * FROM ("));
        assert!(!redraw.is_match("fake:ks> SELECT  FROM ("));
    }

    #[test]
    fn escaped_leading_newline_is_trimmed_for_line_start() {
        let prompt = PromptPattern::new(r"\nfake:{context}> ", Some("ks".into())).unwrap();
        assert!(prompt.line_start_regex().is_match(b"fake:ks> "));
        assert!(prompt.stream_regex().is_match(b"^C\r\nfake:ks> "));
        let redraw = prompt.redraw_regex("DROP ").unwrap();
        assert!(redraw.is_match("fake:ks> DROP "));

        let prompt = PromptPattern::new(r"\r?\n\s*fake:{context}> ", Some("ks".into())).unwrap();
        assert!(prompt.line_start_regex().is_match(b"fake:ks> "));
    }

    #[test]
    fn trims_only_leading_whitespace() {
        assert_eq!(trim_leading_whitespace(r"\n fake\n> "), r"fake\n> ");
        assert_eq!(trim_leading_whitespace(r"\s*\r\n>"), ">");
        assert_eq!(trim_leading_whitespace(r"\\n>"), r"\\n>");
    }

    #[test]
    fn redraw_tolerates_bytes_before_prompt() {
        let prompt = PromptPattern::new("\nfake:{context}> ", Some("ks".into())).unwrap();
        let redraw = prompt.redraw_regex("DROP KEYSPACE ").unwrap();
        assert!(redraw.is_match("\x1b[?2004hfake:ks> DROP KEYSPACE "));
    }

    #[test]
    fn invalid_template_is_config_error() {
        let err = PromptPattern::new("fake:(unclosed", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::Config);
    }
}
