use super::{preview, Transport};
use crate::runner::{ErrorCode, HarnessError, HarnessResult};
use regex::bytes::Regex;
use std::collections::VecDeque;
use std::time::Duration;

/// One canned response, consumed by one read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Bytes the shell "printed" during the read window.
    Output(Vec<u8>),
    /// Nothing arrived before the deadline.
    Silence,
    /// The shell closed the terminal.
    Closed,
}

/// A fake transport that replays queued replies and records what was sent.
///
/// `read_until_quiet` consumes exactly one reply. `read_until_match` keeps
/// consuming `Output` replies until the pattern matches, and times out on
/// `Silence` or an exhausted script.
///
/// ```
/// use tabprobe::transport::{ScriptedTransport, Transport};
/// use std::time::Duration;
///
/// let mut transport = ScriptedTransport::new().reply("alt\u{8}\u{8}\u{8}ALTER ");
/// transport.send(b"alt\t").unwrap();
/// let capture = transport.read_until_quiet(Duration::from_millis(1)).unwrap();
/// assert!(capture.starts_with(b"alt"));
/// assert_eq!(transport.sent(), b"alt\t");
/// ```
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<ScriptedReply>,
    pending: Vec<u8>,
    sent: Vec<u8>,
    writes: Vec<Vec<u8>>,
    closed: bool,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reply(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.push_reply(bytes);
        self
    }

    #[must_use]
    pub fn silence(mut self) -> Self {
        self.replies.push_back(ScriptedReply::Silence);
        self
    }

    #[must_use]
    pub fn closed(mut self) -> Self {
        self.replies.push_back(ScriptedReply::Closed);
        self
    }

    pub fn push_reply(&mut self, bytes: impl AsRef<[u8]>) {
        self.replies
            .push_back(ScriptedReply::Output(bytes.as_ref().to_vec()));
    }

    pub fn push(&mut self, reply: ScriptedReply) {
        self.replies.push_back(reply);
    }

    /// Every byte sent so far, concatenated.
    #[must_use]
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Each `send` call, in order.
    #[must_use]
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Replies not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, bytes: &[u8]) -> HarnessResult<()> {
        if self.closed {
            return Err(HarnessError::io(
                "failed to write to pty",
                "scripted stream is closed",
            ));
        }
        self.sent.extend_from_slice(bytes);
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    fn read_until_quiet(&mut self, _quiet: Duration) -> HarnessResult<Vec<u8>> {
        let mut total = std::mem::take(&mut self.pending);
        match self.replies.pop_front() {
            Some(ScriptedReply::Output(bytes)) => total.extend_from_slice(&bytes),
            Some(ScriptedReply::Silence) | None => {}
            Some(ScriptedReply::Closed) => {
                self.closed = true;
                if total.is_empty() {
                    return Err(HarnessError::stream_closed(
                        "shell closed the terminal before responding",
                    ));
                }
            }
        }
        Ok(total)
    }

    fn read_until_match(&mut self, pattern: &Regex, timeout: Duration) -> HarnessResult<Vec<u8>> {
        let mut total = std::mem::take(&mut self.pending);
        loop {
            if let Some(found) = pattern.find(&total) {
                self.pending = total.split_off(found.end());
                return Ok(total);
            }
            match self.replies.pop_front() {
                Some(ScriptedReply::Output(bytes)) => total.extend_from_slice(&bytes),
                Some(ScriptedReply::Closed) => {
                    self.closed = true;
                    return Err(HarnessError::new(
                        ErrorCode::StreamClosed,
                        "shell closed the terminal while waiting for a prompt",
                        Some(serde_json::json!({ "received": preview(&total) })),
                    ));
                }
                Some(ScriptedReply::Silence) | None => {
                    let context = serde_json::json!({
                        "pattern": pattern.as_str(),
                        "timeout_ms": u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "received": preview(&total),
                    });
                    self.pending = total;
                    return Err(HarnessError::timeout("timed out waiting for prompt", context));
                }
            }
        }
    }

    fn shutdown(&mut self, _grace: Duration) -> HarnessResult<()> {
        self.closed = true;
        Ok(())
    }
}
