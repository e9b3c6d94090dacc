use super::completion::CompletionResult;
use super::expectation::{Expectation, MatchOutcome};
use super::ids::{RunId, SessionId};
use crate::runner::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serializable form of a [`crate::runner::HarnessError`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Passed,
    /// Classification succeeded but the expectation was not met.
    Failed,
    /// Protocol violation, unrecoverable timeout, or transport failure.
    Errored,
    /// Not run because an earlier probe in the same test case errored.
    Skipped,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
    Errored,
}

impl RunStatus {
    /// Fold probe statuses: any error wins over any failure, which wins over a pass.
    pub fn from_probes<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a ProbeStatus>,
    {
        let mut status = Self::Passed;
        for probe in statuses {
            match probe {
                ProbeStatus::Errored | ProbeStatus::Skipped => return Self::Errored,
                ProbeStatus::Failed => status = Self::Failed,
                ProbeStatus::Passed => {}
            }
        }
        status
    }

    /// Fold child statuses with the same precedence as [`RunStatus::from_probes`].
    pub fn combine<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        statuses.into_iter().fold(Self::Passed, |acc, next| match (acc, next) {
            (Self::Errored, _) | (_, Self::Errored) => Self::Errored,
            (Self::Failed, _) | (_, Self::Failed) => Self::Failed,
            _ => Self::Passed,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub input: String,
    pub expectation: Expectation,
    pub status: ProbeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<CompletionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MatchOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub elapsed_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub status: RunStatus,
    pub probes: Vec<ProbeReport>,
    /// Session start-up or teardown failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub report_version: u32,
    pub run_id: RunId,
    pub suite: String,
    pub status: RunStatus,
    pub tests: Vec<TestReport>,
    /// Fixture setup or teardown failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub elapsed_ms: u64,
}

impl SuiteReport {
    /// Count probes with the given status across all tests.
    #[must_use]
    pub fn count(&self, status: ProbeStatus) -> usize {
        self.tests
            .iter()
            .flat_map(|test| test.probes.iter())
            .filter(|probe| probe.status == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_status_precedence() {
        let statuses = [ProbeStatus::Passed, ProbeStatus::Failed, ProbeStatus::Passed];
        assert_eq!(RunStatus::from_probes(&statuses), RunStatus::Failed);

        let statuses = [ProbeStatus::Failed, ProbeStatus::Errored, ProbeStatus::Skipped];
        assert_eq!(RunStatus::from_probes(&statuses), RunStatus::Errored);

        assert_eq!(RunStatus::from_probes(&[]), RunStatus::Passed);
    }

    #[test]
    fn combine_prefers_errors_over_failures() {
        assert_eq!(
            RunStatus::combine([RunStatus::Passed, RunStatus::Failed]),
            RunStatus::Failed
        );
        assert_eq!(
            RunStatus::combine([RunStatus::Failed, RunStatus::Errored, RunStatus::Passed]),
            RunStatus::Errored
        );
    }
}
