use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal width advertised to the shell so candidate lists never wrap.
pub const DEFAULT_COLUMNS: u32 = 100_000;
/// Terminal height of the PTY.
pub const DEFAULT_ROWS: u16 = 24;

/// How captured bytes are turned into text.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMode {
    /// Invalid UTF-8 in a capture is an `E_TERMINAL_PARSE` error.
    #[default]
    Strict,
    /// Invalid sequences are replaced with U+FFFD.
    Lossy,
}

/// How to launch and recognise the shell under test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Command to execute (absolute path recommended).
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Extra environment for the shell, applied after the harness defaults.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Prompt regex; `{context}` is replaced by the escaped context name.
    pub prompt: String,
    /// Context name shown in the prompt (for example the active keyspace).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub encoding: EncodingMode,
    #[serde(default = "default_columns")]
    pub columns: u32,
}

fn default_columns() -> u32 {
    DEFAULT_COLUMNS
}

impl SessionConfig {
    pub fn new(command: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            prompt: prompt.into(),
            context: None,
            encoding: EncodingMode::Strict,
            columns: DEFAULT_COLUMNS,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Shell commands that create and remove the backing data store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSpec {
    /// Run once, in order, before the first test case.
    #[serde(default)]
    pub setup: Vec<String>,
    /// Run once, in order, after the last test case (even when tests fail).
    #[serde(default)]
    pub teardown: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}
