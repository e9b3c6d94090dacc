//! Fluent builder for constructing [`Suite`] objects in tests.
//!
//! ```ignore
//! let suite = SuiteBuilder::new("drop", fake_shell_session(FAKE_SHELL, "ks"))
//!     .test("drop keyspace")
//!     .probe("DROP ", Expectation::choices(["INDEX", "KEYSPACE", "TABLE"]))
//!     .probe("DROP KEYSPACE \"{context}\" ", Expectation::choices([";"]))
//!     .build();
//! ```

use tabprobe::config::HarnessConfig;
use tabprobe::{Expectation, FixtureSpec, ProbeCase, SessionConfig, Suite, TestCase, SUITE_VERSION};

/// Builds a [`Suite`] one test case and probe at a time.
#[derive(Debug, Clone)]
pub struct SuiteBuilder {
    name: String,
    shell: SessionConfig,
    config: Option<HarnessConfig>,
    fixture: Option<FixtureSpec>,
    tests: Vec<TestCase>,
}

impl SuiteBuilder {
    #[must_use]
    pub fn new(name: &str, shell: SessionConfig) -> Self {
        Self {
            name: name.to_string(),
            shell,
            config: None,
            fixture: None,
            tests: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_fixture(mut self, setup: &[&str], teardown: &[&str]) -> Self {
        self.fixture = Some(FixtureSpec {
            setup: setup.iter().map(|line| (*line).to_string()).collect(),
            teardown: teardown.iter().map(|line| (*line).to_string()).collect(),
            cwd: None,
        });
        self
    }

    /// Start a new test case; following probes are added to it.
    #[must_use]
    pub fn test(mut self, name: &str) -> Self {
        self.tests.push(TestCase {
            name: name.to_string(),
            probes: Vec::new(),
        });
        self
    }

    /// Add a probe to the current test case, opening one named after the
    /// suite if none exists yet.
    #[must_use]
    pub fn probe(mut self, input: &str, expect: Expectation) -> Self {
        if self.tests.is_empty() {
            let name = self.name.clone();
            self = self.test(&name);
        }
        if let Some(test) = self.tests.last_mut() {
            test.probes.push(ProbeCase::new(input, expect));
        }
        self
    }

    #[must_use]
    pub fn build(self) -> Suite {
        Suite {
            suite_version: SUITE_VERSION,
            name: self.name,
            shell: self.shell,
            config: self.config,
            fixture: self.fixture,
            tests: self.tests,
        }
    }
}
