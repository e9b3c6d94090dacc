use super::expectation::Expectation;
use super::shell::{FixtureSpec, SessionConfig};
use super::CONTEXT_PLACEHOLDER;
use crate::config::HarnessConfig;
use serde::{Deserialize, Serialize};

pub const SUITE_VERSION: u32 = 1;

/// An ordered collection of completion test cases against one shell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    #[serde(default = "default_suite_version")]
    pub suite_version: u32,
    pub name: String,
    pub shell: SessionConfig,
    /// Timing overrides; environment variables still take precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<HarnessConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<FixtureSpec>,
    pub tests: Vec<TestCase>,
}

fn default_suite_version() -> u32 {
    SUITE_VERSION
}

/// Probes that share one shell session, run strictly in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub probes: Vec<ProbeCase>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeCase {
    /// What the user typed before pressing TAB. May be empty.
    pub input: String,
    pub expect: Expectation,
}

impl ProbeCase {
    pub fn new(input: impl Into<String>, expect: Expectation) -> Self {
        Self {
            input: input.into(),
            expect,
        }
    }

    /// Input with `{context}` replaced by the session context name.
    #[must_use]
    pub fn input_for(&self, context: Option<&str>) -> String {
        match context {
            Some(context) => self.input.replace(CONTEXT_PLACEHOLDER, context),
            None => self.input.clone(),
        }
    }
}

impl Suite {
    #[must_use]
    pub fn total_probes(&self) -> usize {
        self.tests.iter().map(|test| test.probes.len()).sum()
    }
}
