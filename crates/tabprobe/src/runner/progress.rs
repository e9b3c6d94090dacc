//! Progress events emitted while a suite runs.

use crate::model::{ProbeStatus, RunId, RunStatus};

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    SuiteStarted {
        run_id: RunId,
        name: String,
        total_tests: usize,
        total_probes: usize,
    },
    TestStarted {
        /// 1-based.
        test_index: usize,
        name: String,
        probes: usize,
    },
    ProbeCompleted {
        test_index: usize,
        input: String,
        status: ProbeStatus,
        duration_ms: u64,
    },
    TestCompleted {
        test_index: usize,
        name: String,
        status: RunStatus,
    },
    SuiteCompleted {
        run_id: RunId,
        status: RunStatus,
        duration_ms: u64,
    },
}

/// Receives progress events during a suite run.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Discards all events.
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Collects events for inspection in tests.
#[derive(Default)]
pub struct CollectingProgress {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far. A poisoned lock yields whatever was recorded.
    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressCallback for CollectingProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
