//! Suite execution.
//!
//! A suite runs its fixture setup once, then each test case against a fresh
//! session, then its fixture teardown (always, even after failures). Inside a
//! test case probes run strictly in order: a mismatch is recorded and the run
//! continues, while a fatal error abandons the session and skips the rest of
//! that test case.

mod error;
mod progress;

pub use error::*;
pub use progress::*;

use crate::config::HarnessConfig;
use crate::fixture::{fixture_for, Fixture};
use crate::model::{
    ProbeCase, ProbeReport, ProbeStatus, RunId, RunStatus, SessionConfig, Suite, SuiteReport,
    TestCase, TestReport, REPORT_VERSION,
};
use crate::scenario::validate_suite;
use crate::session::Session;
use crate::transport::{PtyTransport, Transport};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Default)]
pub struct RunnerOptions {
    /// Replaces the suite's own `config` block. Environment overrides still apply.
    pub config: Option<HarnessConfig>,
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

/// Run a suite against real PTY sessions.
pub fn run_suite(suite: &Suite, options: RunnerOptions) -> HarnessResult<SuiteReport> {
    let mut fixture = fixture_for(suite.fixture.as_ref());
    run_suite_with(suite, options, fixture.as_mut(), Session::<PtyTransport>::spawn)
}

/// Run a suite, opening each test case's session with `open`.
///
/// # Errors
/// Only suite or config validation errors are returned; everything that
/// happens while running is recorded in the report.
pub fn run_suite_with<T, F>(
    suite: &Suite,
    options: RunnerOptions,
    fixture: &mut dyn Fixture,
    mut open: F,
) -> HarnessResult<SuiteReport>
where
    T: Transport,
    F: FnMut(&SessionConfig, HarnessConfig) -> HarnessResult<Session<T>>,
{
    validate_suite(suite)?;
    let harness = options
        .config
        .clone()
        .or_else(|| suite.config.clone())
        .unwrap_or_default()
        .with_env_overrides()?;
    let progress: Arc<dyn ProgressCallback> =
        options.progress.clone().unwrap_or_else(|| Arc::new(NoopProgress));

    let run_id = RunId::new();
    let started = Instant::now();
    tracing::info!(%run_id, suite = %suite.name, tests = suite.tests.len(), "suite started");
    progress.on_progress(&ProgressEvent::SuiteStarted {
        run_id,
        name: suite.name.clone(),
        total_tests: suite.tests.len(),
        total_probes: suite.total_probes(),
    });

    let mut error = None;
    let mut tests = Vec::new();
    match fixture.setup() {
        Ok(()) => {
            for (index, test) in suite.tests.iter().enumerate() {
                let ctx = TestContext {
                    index: index + 1,
                    shell: &suite.shell,
                    harness: &harness,
                    progress: progress.as_ref(),
                };
                tests.push(run_test(&ctx, test, &mut open));
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "fixture setup failed");
            error = Some(err.to_error_info());
        }
    }
    if let Err(err) = fixture.teardown() {
        tracing::error!(error = %err, "fixture teardown failed");
        error.get_or_insert_with(|| err.to_error_info());
    }

    let mut status = RunStatus::combine(tests.iter().map(|test: &TestReport| test.status));
    if error.is_some() {
        status = RunStatus::Errored;
    }
    let elapsed_ms = elapsed_ms(&started);
    tracing::info!(%run_id, ?status, elapsed_ms, "suite finished");
    progress.on_progress(&ProgressEvent::SuiteCompleted {
        run_id,
        status,
        duration_ms: elapsed_ms,
    });

    Ok(SuiteReport {
        report_version: REPORT_VERSION,
        run_id,
        suite: suite.name.clone(),
        status,
        tests,
        error,
        elapsed_ms,
    })
}

struct TestContext<'a> {
    index: usize,
    shell: &'a SessionConfig,
    harness: &'a HarnessConfig,
    progress: &'a dyn ProgressCallback,
}

fn run_test<T, F>(ctx: &TestContext<'_>, test: &TestCase, open: &mut F) -> TestReport
where
    T: Transport,
    F: FnMut(&SessionConfig, HarnessConfig) -> HarnessResult<Session<T>>,
{
    let _span = tracing::info_span!("test", name = %test.name).entered();
    ctx.progress.on_progress(&ProgressEvent::TestStarted {
        test_index: ctx.index,
        name: test.name.clone(),
        probes: test.probes.len(),
    });

    let (session_id, probes, error) = match open(ctx.shell, ctx.harness.clone()) {
        Ok(mut session) => {
            let session_id = session.id();
            let probes = run_probes(ctx, &mut session, &test.probes);
            let error = session.close().err().map(|err| {
                tracing::warn!(error = %err, "session teardown failed");
                err.to_error_info()
            });
            (Some(session_id), probes, error)
        }
        Err(err) => {
            tracing::error!(error = %err, "session failed to start");
            let probes = test
                .probes
                .iter()
                .map(|probe| skipped(probe, ctx.shell.context.as_deref()))
                .collect();
            (None, probes, Some(err.to_error_info()))
        }
    };

    let mut status = RunStatus::from_probes(probes.iter().map(|probe: &ProbeReport| &probe.status));
    if error.is_some() {
        status = RunStatus::Errored;
    }
    ctx.progress.on_progress(&ProgressEvent::TestCompleted {
        test_index: ctx.index,
        name: test.name.clone(),
        status,
    });
    TestReport {
        name: test.name.clone(),
        session_id,
        status,
        probes,
        error,
    }
}

/// Run probes in order; after a fatal error the rest are skipped.
fn run_probes<T: Transport>(
    ctx: &TestContext<'_>,
    session: &mut Session<T>,
    cases: &[ProbeCase],
) -> Vec<ProbeReport> {
    let mut reports = Vec::with_capacity(cases.len());
    let mut abandoned = false;
    for case in cases {
        if abandoned {
            reports.push(skipped(case, session.context()));
            continue;
        }
        let started = Instant::now();
        let report = match session.try_completions(&case.input, &case.expect) {
            Ok(verdict) => {
                let status = if verdict.outcome.passed() {
                    ProbeStatus::Passed
                } else {
                    ProbeStatus::Failed
                };
                ProbeReport {
                    input: verdict.input,
                    expectation: verdict.expected,
                    status,
                    observed: Some(verdict.observed),
                    outcome: Some(verdict.outcome),
                    error: None,
                    elapsed_ms: elapsed_ms(&started),
                }
            }
            Err(err) => {
                let input = case.input_for(session.context());
                if err.code.is_fatal() {
                    tracing::error!(input = %input, error = %err, "probe failed; abandoning session");
                    abandoned = true;
                } else {
                    tracing::warn!(input = %input, error = %err, "probe errored");
                }
                ProbeReport {
                    input,
                    expectation: case.expect.with_context(session.context()),
                    status: ProbeStatus::Errored,
                    observed: None,
                    outcome: None,
                    error: Some(err.to_error_info()),
                    elapsed_ms: elapsed_ms(&started),
                }
            }
        };
        ctx.progress.on_progress(&ProgressEvent::ProbeCompleted {
            test_index: ctx.index,
            input: report.input.clone(),
            status: report.status,
            duration_ms: report.elapsed_ms,
        });
        reports.push(report);
    }
    reports
}

fn skipped(case: &ProbeCase, context: Option<&str>) -> ProbeReport {
    ProbeReport {
        input: case.input_for(context),
        expectation: case.expect.with_context(context),
        status: ProbeStatus::Skipped,
        observed: None,
        outcome: None,
        error: None,
        elapsed_ms: 0,
    }
}

fn elapsed_ms(start: &Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
