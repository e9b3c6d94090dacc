//! Shell sessions under test.
//!
//! A [`Session`] owns one [`Transport`] exclusively and runs probes against it
//! strictly one at a time. Every probe ends with the line cancelled and the
//! shell back at a prompt, so consecutive probes are independent.
//!
//! # Example
//!
//! ```no_run
//! use tabprobe::config::HarnessConfig;
//! use tabprobe::session::Session;
//! use tabprobe::{Expectation, SessionConfig};
//!
//! # fn example() -> Result<(), tabprobe::runner::HarnessError> {
//! let config = SessionConfig::new("/usr/local/bin/my-shell", "\nmy:{context}> ")
//!     .with_context("ks");
//! let mut session = Session::spawn(&config, HarnessConfig::default())?;
//! let verdict = session.try_completions("DROP KEYSPACE ", &Expectation::choices(["IF", "{context}"]))?;
//! assert!(verdict.outcome.passed());
//! session.close()?;
//! # Ok(())
//! # }
//! ```

use crate::config::HarnessConfig;
use crate::matcher;
use crate::model::{
    CompletionResult, EncodingMode, Expectation, MatchOutcome, SessionConfig, SessionId,
    CONTEXT_PLACEHOLDER, DEFAULT_ROWS,
};
use crate::prompt::PromptPattern;
use crate::protocol::CompletionProbe;
use crate::recovery;
use crate::runner::{HarnessError, HarnessResult};
use crate::transport::{PtyTransport, SpawnConfig, Transport};
use std::collections::BTreeMap;

/// Locale forced on the shell when the harness itself is not running UTF-8.
pub const FALLBACK_LC_CTYPE: &str = "en_US.utf8";

/// Observed result and verdict for one probe.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeVerdict {
    /// Input as typed, with `{context}` filled in.
    pub input: String,
    pub observed: CompletionResult,
    /// Expectation as matched, with `{context}` filled in.
    pub expected: Expectation,
    pub outcome: MatchOutcome,
}

pub struct Session<T: Transport = PtyTransport> {
    id: SessionId,
    transport: T,
    prompt: PromptPattern,
    encoding: EncodingMode,
    config: HarnessConfig,
}

impl Session<PtyTransport> {
    /// Start the shell on a fresh PTY and wait for its first prompt.
    ///
    /// # Errors
    /// `E_CONFIG` for an invalid prompt template, `E_IO` if the shell cannot be
    /// started, `E_TIMEOUT` or `E_STREAM_CLOSED` if no prompt appears.
    pub fn spawn(config: &SessionConfig, harness: HarnessConfig) -> HarnessResult<Self> {
        let env = child_env(config, |key| std::env::var(key).ok());
        let spawn = SpawnConfig {
            command: config.command.clone(),
            args: config.args.clone(),
            cwd: config.cwd.clone(),
            env,
            rows: DEFAULT_ROWS,
            cols: u16::try_from(config.columns).unwrap_or(u16::MAX),
            poll_interval: harness.poll_interval(),
        };
        let transport = PtyTransport::spawn(&spawn)?;
        let mut session = Self::with_transport(transport, config, harness)?;
        tracing::info!(
            session_id = %session.id,
            command = %config.command,
            "session started"
        );
        session.wait_for_startup_prompt()?;
        Ok(session)
    }
}

impl<T: Transport> Session<T> {
    /// Wrap an already-connected transport. No prompt is awaited.
    pub fn with_transport(
        transport: T,
        config: &SessionConfig,
        harness: HarnessConfig,
    ) -> HarnessResult<Self> {
        harness.validate()?;
        let prompt = PromptPattern::new(&config.prompt, config.context.clone())?;
        Ok(Self {
            id: SessionId::new(),
            transport,
            prompt,
            encoding: config.encoding,
            config: harness,
        })
    }

    /// Block until the shell prints its first prompt.
    ///
    /// The first prompt is not preceded by a cancelled line, so it is matched
    /// without its leading whitespace.
    pub fn wait_for_startup_prompt(&mut self) -> HarnessResult<()> {
        let banner = self.transport.read_until_match(
            self.prompt.line_start_regex(),
            self.config.startup_timeout(),
        )?;
        tracing::debug!(session_id = %self.id, bytes = banner.len(), "startup prompt seen");
        Ok(())
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Context name shown in the prompt, for templating inputs and expectations.
    pub fn context(&self) -> Option<&str> {
        self.prompt.context()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Probe `input` and classify what the shell did.
    ///
    /// The immediate path leaves the typed text on the line; callers that go
    /// on probing should use [`Session::try_completions`], which always
    /// resynchronizes afterwards.
    pub fn get_completions(&mut self, input: &str) -> HarnessResult<CompletionResult> {
        tracing::debug!(session_id = %self.id, input, "probing");
        let probe = CompletionProbe::new(input, &self.prompt, &self.config, self.encoding);
        let result = probe.run(&mut self.transport)?;
        tracing::debug!(session_id = %self.id, input, kind = result.kind(), "probe classified");
        Ok(result)
    }

    /// Probe `input`, cancel the line, and match the result against `expected`.
    ///
    /// Recovery runs whether or not the probe succeeded. A probe error takes
    /// precedence over a recovery error.
    pub fn try_completions(
        &mut self,
        input: &str,
        expected: &Expectation,
    ) -> HarnessResult<ProbeVerdict> {
        let input = self.fill_context(input);
        let expected = expected.with_context(self.context());

        let probed = self.get_completions(&input);
        let recovered = recovery::cancel_and_resync(&mut self.transport, &self.prompt, &self.config);
        let observed = probed?;
        recovered?;

        let outcome = matcher::evaluate(&observed, &expected);
        if let Some(mismatch) = outcome.mismatch() {
            tracing::debug!(session_id = %self.id, input = %input, %mismatch, "completion mismatch");
        }
        Ok(ProbeVerdict {
            input,
            observed,
            expected,
            outcome,
        })
    }

    /// Like [`Session::try_completions`], but a mismatch is an `E_MATCH_FAILED` error.
    pub fn assert_completions(
        &mut self,
        input: &str,
        expected: &Expectation,
    ) -> HarnessResult<CompletionResult> {
        let verdict = self.try_completions(input, expected)?;
        match verdict.outcome {
            MatchOutcome::Pass => Ok(verdict.observed),
            MatchOutcome::Fail(mismatch) => Err(HarnessError::match_failed(
                format!("completion of {:?}: {mismatch}", verdict.input),
                serde_json::json!({
                    "input": verdict.input,
                    "detail": mismatch.detail,
                }),
            )),
        }
    }

    /// Stop the shell, escalating to SIGKILL after `teardown_grace_ms`.
    pub fn close(mut self) -> HarnessResult<()> {
        self.transport.shutdown(self.config.teardown_grace())?;
        tracing::info!(session_id = %self.id, "session closed");
        Ok(())
    }

    fn fill_context(&self, input: &str) -> String {
        match self.context() {
            Some(context) => input.replace(CONTEXT_PLACEHOLDER, context),
            None => input.to_string(),
        }
    }
}

/// Environment for the shell: very wide columns so lists never wrap, a UTF-8
/// locale when the harness lacks one, then the configured overrides.
pub fn child_env<F>(config: &SessionConfig, lookup: F) -> BTreeMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = BTreeMap::new();
    env.insert("COLUMNS".to_string(), config.columns.to_string());
    if !locale_is_utf8(&lookup) {
        env.insert("LC_CTYPE".to_string(), FALLBACK_LC_CTYPE.to_string());
    }
    env.extend(config.env.clone());
    env
}

/// Effective character encoding per POSIX precedence: `LC_ALL`, `LC_CTYPE`, `LANG`.
pub fn locale_is_utf8<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    ["LC_ALL", "LC_CTYPE", "LANG"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.is_empty())
        .is_some_and(|value| {
            let value = value.to_ascii_lowercase();
            value.contains("utf-8") || value.contains("utf8")
        })
}
