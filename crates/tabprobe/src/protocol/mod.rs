//! The two-phase completion probe.
//!
//! A line editor gives no "completion finished" signal and the harness cannot
//! know in advance whether a prefix completes immediately or ambiguously, so
//! the probe behaves like a user:
//!
//! 1. Type the input, press TAB once, and wait for the output to go quiet.
//! 2. If anything beyond the echoed input (and bells) appeared, that text is
//!    an [`Immediate`](CompletionResult::Immediate) completion.
//! 3. Otherwise press TAB again to request the candidate list, wait for
//!    quiet, cancel the line, and resynchronize to a clean prompt.
//! 4. The list's last line must be the re-drawn prompt followed by the input;
//!    the lines above it are the candidates.
//!
//! The machine is an explicit [`ProbeState`] advanced by [`CompletionProbe::step`]
//! over an injected [`Transport`], so it can be driven by a
//! [`ScriptedTransport`](crate::transport::ScriptedTransport) in tests.

use crate::config::HarnessConfig;
use crate::model::{CompletionResult, EncodingMode};
use crate::prompt::PromptPattern;
use crate::recovery;
use crate::runner::{HarnessError, HarnessResult};
use crate::transport::{preview, Transport};

/// Requests completion.
pub const TAB: u8 = b'\t';
/// Terminal bell: "nothing to complete" or "ambiguous" on the first TAB.
pub const BEL: u8 = 0x07;
/// Interrupt; abandons the current input line.
pub const CTRL_C: u8 = 0x03;
/// Space-backspace pair a line editor emits when erasing a placeholder.
pub const ERASE_PAIR: &[u8] = b" \x08";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    ProbeSent,
    AwaitingImmediate,
    ImmediateResolved(String),
    AwaitingList,
    /// Decoded output captured after the second TAB.
    ListResolved(String),
}

impl ProbeState {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::ImmediateResolved(_) | Self::ListResolved(_))
    }
}

/// One completion attempt against one shell.
#[derive(Debug)]
pub struct CompletionProbe<'a> {
    input: &'a str,
    prompt: &'a PromptPattern,
    config: &'a HarnessConfig,
    encoding: EncodingMode,
    state: ProbeState,
}

impl<'a> CompletionProbe<'a> {
    pub fn new(
        input: &'a str,
        prompt: &'a PromptPattern,
        config: &'a HarnessConfig,
        encoding: EncodingMode,
    ) -> Self {
        Self {
            input,
            prompt,
            config,
            encoding,
            state: ProbeState::Idle,
        }
    }

    pub fn state(&self) -> &ProbeState {
        &self.state
    }

    /// Perform one transition. Resolved states are terminal.
    pub fn step<T: Transport + ?Sized>(&mut self, transport: &mut T) -> HarnessResult<()> {
        let next = match &self.state {
            ProbeState::Idle => {
                transport.send(self.input.as_bytes())?;
                ProbeState::ProbeSent
            }
            ProbeState::ProbeSent => {
                transport.send(&[TAB])?;
                ProbeState::AwaitingImmediate
            }
            ProbeState::AwaitingImmediate => {
                let capture = transport.read_until_quiet(self.config.response_budget())?;
                let residual = self.strip_echo(&capture)?;
                if residual.is_empty() {
                    transport.send(&[TAB])?;
                    ProbeState::AwaitingList
                } else {
                    ProbeState::ImmediateResolved(decode(&residual, self.encoding)?)
                }
            }
            ProbeState::AwaitingList => {
                let capture = transport.read_until_quiet(self.config.response_budget())?;
                let capture = if capture == [BEL] { Vec::new() } else { capture };
                transport.send(&[CTRL_C])?;
                recovery::resync(transport, self.prompt, self.config)?;
                ProbeState::ListResolved(decode(&capture, self.encoding)?)
            }
            ProbeState::ImmediateResolved(_) | ProbeState::ListResolved(_) => return Ok(()),
        };
        tracing::trace!(from = ?self.state, to = ?next, "probe transition");
        self.state = next;
        Ok(())
    }

    /// Drive the machine to a resolved state and classify the result.
    pub fn run<T: Transport + ?Sized>(mut self, transport: &mut T) -> HarnessResult<CompletionResult> {
        while !self.state.is_resolved() {
            self.step(transport)?;
        }
        self.finish()
    }

    /// Classify a resolved probe.
    pub fn finish(self) -> HarnessResult<CompletionResult> {
        match self.state {
            ProbeState::ImmediateResolved(text) => Ok(CompletionResult::Immediate { text }),
            ProbeState::ListResolved(output) => classify_list(&output, self.input, self.prompt),
            state => Err(HarnessError::internal(format!(
                "probe classified before resolution (state {state:?})"
            ))),
        }
    }

    /// Check the echoed prefix and return what follows it, bells removed.
    fn strip_echo(&self, capture: &[u8]) -> HarnessResult<Vec<u8>> {
        let cleaned = remove_all(capture, ERASE_PAIR);
        let Some(rest) = cleaned.strip_prefix(self.input.as_bytes()) else {
            tracing::warn!(input = self.input, "capture does not start with echoed input");
            return Err(HarnessError::protocol_violation(
                "terminal did not echo the probe input",
                serde_json::json!({
                    "input": self.input,
                    "received": preview(&cleaned),
                }),
            ));
        };
        Ok(rest.iter().copied().filter(|byte| *byte != BEL).collect())
    }
}

/// Turn the output of the second TAB into a listed (or empty) result.
pub fn classify_list(
    output: &str,
    input: &str,
    prompt: &PromptPattern,
) -> HarnessResult<CompletionResult> {
    let lines = split_terminal_lines(output);
    let Some((last, candidates)) = lines.split_last() else {
        return Ok(CompletionResult::Empty);
    };
    let redraw = prompt.redraw_regex(input)?;
    if !redraw.is_match(last) {
        tracing::warn!(input, last_line = *last, "listed completion not followed by prompt");
        return Err(HarnessError::protocol_violation(
            format!("double-tab completion does not print prompt for input {input:?}"),
            serde_json::json!({
                "input": input,
                "last_line": last,
                "expected_pattern": redraw.as_str(),
            }),
        ));
    }
    Ok(CompletionResult::from_lines(candidates))
}

/// Split on `\r\n`, `\r` or `\n`, without a trailing empty line.
pub fn split_terminal_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let Some(idx) = rest.find(|c| c == '\r' || c == '\n') else {
            lines.push(rest);
            break;
        };
        let (line, tail) = rest.split_at(idx);
        lines.push(line);
        rest = tail
            .strip_prefix("\r\n")
            .or_else(|| tail.get(1..))
            .unwrap_or_default();
    }
    lines
}

/// Remove every non-overlapping occurrence of `needle`.
pub fn remove_all(haystack: &[u8], needle: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(needle) {
            rest = after;
        } else if let Some((first, after)) = rest.split_first() {
            out.push(*first);
            rest = after;
        }
    }
    out
}

/// Decode a complete capture according to the session's encoding mode.
pub fn decode(bytes: &[u8], encoding: EncodingMode) -> HarnessResult<String> {
    match encoding {
        EncodingMode::Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
        EncodingMode::Strict => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|err| {
                HarnessError::terminal_parse(
                    "terminal output was not valid UTF-8",
                    err,
                    err.valid_up_to(),
                )
            }),
    }
}
