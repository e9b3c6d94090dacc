//! Returning a session to a clean prompt.
//!
//! After every probe, pass or fail, the line is cancelled with Ctrl-C and the
//! harness waits for the prompt to come back. If the first wait times out the
//! cancel is sent once more with a longer deadline; a second timeout means the
//! session can no longer be trusted.

use crate::config::HarnessConfig;
use crate::prompt::PromptPattern;
use crate::protocol::CTRL_C;
use crate::runner::{HarnessError, HarnessResult};
use crate::transport::Transport;

/// Wait for the prompt after a cancel that has already been sent.
///
/// Retries once with another Ctrl-C and `resync_retry_timeout` if the first
/// wait times out. Non-timeout errors are returned immediately.
pub fn resync<T: Transport + ?Sized>(
    transport: &mut T,
    prompt: &PromptPattern,
    config: &HarnessConfig,
) -> HarnessResult<()> {
    let pattern = prompt.stream_regex();
    match transport.read_until_match(pattern, config.resync_timeout()) {
        Ok(_) => return Ok(()),
        Err(err) if err.is_timeout() => {
            tracing::warn!(
                timeout_ms = config.resync_timeout_ms,
                "no prompt after cancel; sending another cancel"
            );
        }
        Err(err) => return Err(err),
    }

    transport.send(&[CTRL_C])?;
    transport
        .read_until_match(pattern, config.resync_retry_timeout())
        .map(|_| ())
        .map_err(|err| {
            if err.is_timeout() {
                tracing::error!(
                    timeout_ms = config.resync_retry_timeout_ms,
                    "session did not return to a prompt"
                );
                HarnessError::timeout(
                    "session did not return to a prompt after two cancels",
                    serde_json::json!({
                        "resync_timeout_ms": config.resync_timeout_ms,
                        "resync_retry_timeout_ms": config.resync_retry_timeout_ms,
                        "last_read": err.context,
                    }),
                )
            } else {
                err
            }
        })
}

/// Cancel the current line and wait for a clean prompt.
pub fn cancel_and_resync<T: Transport + ?Sized>(
    transport: &mut T,
    prompt: &PromptPattern,
    config: &HarnessConfig,
) -> HarnessResult<()> {
    transport.send(&[CTRL_C])?;
    resync(transport, prompt, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ErrorCode;
    use crate::transport::ScriptedTransport;

    fn prompt() -> PromptPattern {
        PromptPattern::new("\nfake:{context}> ", Some("ks".into())).unwrap()
    }

    #[test]
    fn prompt_after_first_cancel() {
        let mut transport = ScriptedTransport::new().reply("^C\r\nfake:ks> ");
        cancel_and_resync(&mut transport, &prompt(), &HarnessConfig::default()).unwrap();
        assert_eq!(transport.writes(), [vec![CTRL_C]]);
    }

    #[test]
    fn retries_once_after_timeout() {
        let mut transport = ScriptedTransport::new()
            .silence()
            .reply("^C\r\nfake:ks> ");
        cancel_and_resync(&mut transport, &prompt(), &HarnessConfig::default()).unwrap();
        assert_eq!(transport.writes(), [vec![CTRL_C], vec![CTRL_C]]);
    }

    #[test]
    fn prompt_split_across_retry_is_found() {
        let mut transport = ScriptedTransport::new()
            .reply("^C\r")
            .silence()
            .reply("\nfake:ks> ");
        cancel_and_resync(&mut transport, &prompt(), &HarnessConfig::default()).unwrap();
    }

    #[test]
    fn second_timeout_is_fatal() {
        let mut transport = ScriptedTransport::new().silence().silence();
        let err =
            cancel_and_resync(&mut transport, &prompt(), &HarnessConfig::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
        assert!(err.code.is_fatal());
        assert_eq!(transport.writes().len(), 2);
    }

    #[test]
    fn closed_stream_is_not_retried() {
        let mut transport = ScriptedTransport::new().closed();
        let err =
            cancel_and_resync(&mut transport, &prompt(), &HarnessConfig::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::StreamClosed);
        assert_eq!(transport.writes().len(), 1);
    }
}
