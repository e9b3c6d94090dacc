//! Byte-stream transport to the shell under test.
//!
//! A [`Transport`] knows nothing about completion: it writes bytes verbatim and
//! reads bytes back under a deadline. Two implementations are provided:
//!
//! - [`PtyTransport`] drives a real process through a pseudo-terminal.
//! - [`ScriptedTransport`] replays canned replies, for testing the protocol
//!   without spawning anything.
//!
//! Reads never decode: captures are returned as raw bytes and decoded by the
//! protocol once the whole window has been accumulated.

mod pty;
mod scripted;

pub use pty::{PtyTransport, SpawnConfig};
pub use scripted::{ScriptedReply, ScriptedTransport};

use crate::runner::HarnessResult;
use regex::bytes::Regex;
use std::time::Duration;

pub trait Transport {
    /// Write `bytes` to the shell's input. No retries.
    fn send(&mut self, bytes: &[u8]) -> HarnessResult<()>;

    /// Accumulate output until nothing new arrives for `quiet`.
    ///
    /// Returns whatever was accumulated, possibly nothing. Fails with
    /// `E_STREAM_CLOSED` only when the stream closed before any byte arrived.
    fn read_until_quiet(&mut self, quiet: Duration) -> HarnessResult<Vec<u8>>;

    /// Accumulate output until `pattern` matches, up to `timeout`.
    ///
    /// Returns everything up to and including the match; later bytes stay
    /// buffered for the next read. Fails with `E_TIMEOUT` when the deadline
    /// passes and `E_STREAM_CLOSED` when the stream ends first.
    fn read_until_match(&mut self, pattern: &Regex, timeout: Duration) -> HarnessResult<Vec<u8>>;

    /// Stop the shell, waiting up to `grace` before forcing it.
    fn shutdown(&mut self, _grace: Duration) -> HarnessResult<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, bytes: &[u8]) -> HarnessResult<()> {
        (**self).send(bytes)
    }

    fn read_until_quiet(&mut self, quiet: Duration) -> HarnessResult<Vec<u8>> {
        (**self).read_until_quiet(quiet)
    }

    fn read_until_match(&mut self, pattern: &Regex, timeout: Duration) -> HarnessResult<Vec<u8>> {
        (**self).read_until_match(pattern, timeout)
    }

    fn shutdown(&mut self, grace: Duration) -> HarnessResult<()> {
        (**self).shutdown(grace)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> HarnessResult<()> {
        (**self).send(bytes)
    }

    fn read_until_quiet(&mut self, quiet: Duration) -> HarnessResult<Vec<u8>> {
        (**self).read_until_quiet(quiet)
    }

    fn read_until_match(&mut self, pattern: &Regex, timeout: Duration) -> HarnessResult<Vec<u8>> {
        (**self).read_until_match(pattern, timeout)
    }

    fn shutdown(&mut self, grace: Duration) -> HarnessResult<()> {
        (**self).shutdown(grace)
    }
}

/// Bounded, lossy rendering of captured bytes for error context.
pub(crate) fn preview(bytes: &[u8]) -> String {
    const LIMIT: usize = 200;
    let tail = bytes.len().saturating_sub(LIMIT);
    String::from_utf8_lossy(bytes.get(tail..).unwrap_or_default()).into_owned()
}
