//! Verbose progress output using indicatif.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;
use tabprobe::runner::{ProgressCallback, ProgressEvent};
use tabprobe::{ProbeStatus, RunStatus};

/// Prints per-test and per-probe progress to stderr, keeping stdout for JSON.
pub struct VerboseProgress {
    spinner: Mutex<Option<ProgressBar>>,
    total_tests: Mutex<usize>,
}

impl VerboseProgress {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
            total_tests: Mutex::new(0),
        }
    }

    fn clear_spinner(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressCallback for VerboseProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::SuiteStarted {
                run_id,
                name,
                total_tests,
                total_probes,
            } => {
                if let Ok(mut total) = self.total_tests.lock() {
                    *total = *total_tests;
                }
                let _ = writeln!(
                    std::io::stderr(),
                    "suite {name} started: {run_id} ({total_tests} tests, {total_probes} probes)"
                );
            }
            ProgressEvent::TestStarted {
                test_index,
                name,
                probes,
            } => {
                let total = self.total_tests.lock().map(|g| *g).unwrap_or(0);
                let _ = writeln!(std::io::stderr(), "[{test_index}/{total}] {name}");
                let pb = ProgressBar::new(u64::try_from(*probes).unwrap_or(u64::MAX));
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.cyan} [{elapsed_precise}] {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                pb.enable_steady_tick(std::time::Duration::from_millis(100));
                if let Ok(mut spinner) = self.spinner.lock() {
                    *spinner = Some(pb);
                }
            }
            ProgressEvent::ProbeCompleted {
                input,
                status,
                duration_ms,
                ..
            } => {
                let icon = match status {
                    ProbeStatus::Passed => "\x1b[32m✓\x1b[0m",
                    ProbeStatus::Failed => "\x1b[31m✗\x1b[0m",
                    ProbeStatus::Errored => "\x1b[31m!\x1b[0m",
                    ProbeStatus::Skipped => "\x1b[33m-\x1b[0m",
                };
                let line = format!("  {icon} {input:?} ({duration_ms}ms)");
                match self.spinner.lock().ok().and_then(|guard| guard.clone()) {
                    Some(pb) => {
                        pb.inc(1);
                        pb.println(line);
                    }
                    None => {
                        let _ = writeln!(std::io::stderr(), "{line}");
                    }
                }
            }
            ProgressEvent::TestCompleted { .. } => self.clear_spinner(),
            ProgressEvent::SuiteCompleted {
                status,
                duration_ms,
                ..
            } => {
                self.clear_spinner();
                let status_msg = match status {
                    RunStatus::Passed => "\x1b[32mpassed\x1b[0m",
                    RunStatus::Failed => "\x1b[31mfailed\x1b[0m",
                    RunStatus::Errored => "\x1b[31merrored\x1b[0m",
                };
                let _ = writeln!(
                    std::io::stderr(),
                    "suite {status_msg}: {duration_ms}ms total"
                );
            }
        }
    }
}
