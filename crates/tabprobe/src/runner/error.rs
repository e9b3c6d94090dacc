use crate::model::ErrorInfo;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Machine-readable error classification.
///
/// Serialized as the stable `E_*` strings used in JSON reports and CLI output.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Echo prefix missing, or prompt re-draw missing after a listed completion.
    #[serde(rename = "E_PROTOCOL_VIOLATION")]
    ProtocolViolation,
    /// A bounded read exceeded its deadline.
    #[serde(rename = "E_TIMEOUT")]
    Timeout,
    /// The shell closed its end of the terminal.
    #[serde(rename = "E_STREAM_CLOSED")]
    StreamClosed,
    #[serde(rename = "E_IO")]
    Io,
    /// Captured output was not valid UTF-8 in strict encoding mode.
    #[serde(rename = "E_TERMINAL_PARSE")]
    TerminalParse,
    #[serde(rename = "E_CONFIG")]
    Config,
    /// Classification succeeded but the expectation was not met.
    #[serde(rename = "E_MATCH_FAILED")]
    MatchFailed,
    #[serde(rename = "E_CLI_INVALID_ARG")]
    CliInvalidArg,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProtocolViolation => "E_PROTOCOL_VIOLATION",
            Self::Timeout => "E_TIMEOUT",
            Self::StreamClosed => "E_STREAM_CLOSED",
            Self::Io => "E_IO",
            Self::TerminalParse => "E_TERMINAL_PARSE",
            Self::Config => "E_CONFIG",
            Self::MatchFailed => "E_MATCH_FAILED",
            Self::CliInvalidArg => "E_CLI_INVALID_ARG",
            Self::Internal => "E_INTERNAL",
        }
    }

    /// Whether the session must be considered corrupted after this error.
    ///
    /// Fatal errors abort the enclosing test case; the remaining probes in it
    /// are skipped and the next test case starts a fresh session.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::MatchFailed | Self::Config | Self::CliInvalidArg)
    }

    /// Process exit code used by the CLI for this error.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::MatchFailed => 1,
            Self::ProtocolViolation | Self::Timeout | Self::StreamClosed => 2,
            Self::CliInvalidArg | Self::Config => 3,
            Self::Io | Self::TerminalParse => 4,
            Self::Internal => 5,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct HarnessError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<Value>,
}

impl HarnessError {
    pub fn new(code: ErrorCode, message: impl Into<String>, context: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            context,
        }
    }

    pub fn protocol_violation(message: impl Into<String>, context: Value) -> Self {
        Self::new(ErrorCode::ProtocolViolation, message, Some(context))
    }

    pub fn timeout(message: impl Into<String>, context: Value) -> Self {
        Self::new(ErrorCode::Timeout, message, Some(context))
    }

    pub fn stream_closed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StreamClosed, message, None)
    }

    pub fn io(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Io,
            message,
            Some(serde_json::json!({ "source": err.to_string() })),
        )
    }

    pub fn terminal_parse(
        message: impl Into<String>,
        err: impl fmt::Display,
        valid_up_to: usize,
    ) -> Self {
        Self::new(
            ErrorCode::TerminalParse,
            message,
            Some(serde_json::json!({
                "source": err.to_string(),
                "valid_up_to": valid_up_to,
            })),
        )
    }

    pub fn config(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Config, message, context.into())
    }

    pub fn match_failed(message: impl Into<String>, context: Value) -> Self {
        Self::new(ErrorCode::MatchFailed, message, Some(context))
    }

    pub fn cli_invalid_arg(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CliInvalidArg, message, None)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message, None)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code,
            message: self.message.clone(),
            context: self.context.clone(),
        }
    }
}

impl Diagnostic for HarnessError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let hint = match self.code {
            ErrorCode::ProtocolViolation => {
                "the terminal output did not follow the echo/prompt conventions; the session is no longer trusted"
            }
            ErrorCode::Timeout => {
                "raise response_budget_ms or the resync timeouts for slow environments"
            }
            ErrorCode::StreamClosed => "the shell under test exited or closed its terminal",
            _ => return None,
        };
        Some(Box::new(hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_as_stable_strings() {
        let value = serde_json::to_value(ErrorCode::ProtocolViolation).unwrap();
        assert_eq!(value, serde_json::json!("E_PROTOCOL_VIOLATION"));
        let parsed: ErrorCode = serde_json::from_value(serde_json::json!("E_TIMEOUT")).unwrap();
        assert_eq!(parsed, ErrorCode::Timeout);
    }

    #[test]
    fn match_failures_are_not_fatal() {
        assert!(!ErrorCode::MatchFailed.is_fatal());
        assert!(ErrorCode::ProtocolViolation.is_fatal());
        assert!(ErrorCode::Timeout.is_fatal());
        assert!(ErrorCode::StreamClosed.is_fatal());
    }

    #[test]
    fn exit_codes_follow_documented_table() {
        let table = [
            (ErrorCode::MatchFailed, 1),
            (ErrorCode::ProtocolViolation, 2),
            (ErrorCode::Timeout, 2),
            (ErrorCode::StreamClosed, 2),
            (ErrorCode::Config, 3),
            (ErrorCode::CliInvalidArg, 3),
            (ErrorCode::Io, 4),
            (ErrorCode::TerminalParse, 4),
            (ErrorCode::Internal, 5),
        ];
        for (code, exit) in table {
            assert_eq!(code.exit_code(), exit, "{code}");
        }
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = HarnessError::stream_closed("shell exited");
        assert_eq!(err.to_string(), "E_STREAM_CLOSED: shell exited");
    }
}
