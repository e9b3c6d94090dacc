//! Timing configuration for the completion protocol.
//!
//! There is no explicit "completion finished" signal from a line editor, so
//! every read is bounded by a quiet period or a deadline. The values here are
//! environment-dependent heuristics: slow machines need larger budgets.
//!
//! Configuration is layered: defaults, then an optional YAML/JSON file (or the
//! `config` block of a suite), then `TABPROBE_*` environment variables.

use crate::runner::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Quiet period after a TAB before the output is considered complete.
pub const DEFAULT_RESPONSE_BUDGET_MS: u64 = 500;
pub const DEFAULT_RESYNC_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_RESYNC_RETRY_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5;
pub const DEFAULT_TEARDOWN_GRACE_MS: u64 = 500;

pub const ENV_RESPONSE_BUDGET_MS: &str = "TABPROBE_RESPONSE_BUDGET_MS";
pub const ENV_RESYNC_TIMEOUT_MS: &str = "TABPROBE_RESYNC_TIMEOUT_MS";
pub const ENV_RESYNC_RETRY_TIMEOUT_MS: &str = "TABPROBE_RESYNC_RETRY_TIMEOUT_MS";
pub const ENV_STARTUP_TIMEOUT_MS: &str = "TABPROBE_STARTUP_TIMEOUT_MS";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Quiet period that ends each completion read.
    pub response_budget_ms: u64,
    /// Deadline for the first wait for a prompt after cancelling a line.
    pub resync_timeout_ms: u64,
    /// Deadline for the single retry when the first resync wait times out.
    pub resync_retry_timeout_ms: u64,
    /// Deadline for the shell's first prompt after spawn.
    pub startup_timeout_ms: u64,
    /// Sleep between non-blocking reads of the PTY.
    pub poll_interval_ms: u64,
    /// Grace period between SIGTERM and SIGKILL on teardown.
    pub teardown_grace_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            response_budget_ms: DEFAULT_RESPONSE_BUDGET_MS,
            resync_timeout_ms: DEFAULT_RESYNC_TIMEOUT_MS,
            resync_retry_timeout_ms: DEFAULT_RESYNC_RETRY_TIMEOUT_MS,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            teardown_grace_ms: DEFAULT_TEARDOWN_GRACE_MS,
        }
    }
}

impl HarnessConfig {
    pub fn response_budget(&self) -> Duration {
        Duration::from_millis(self.response_budget_ms)
    }

    pub fn resync_timeout(&self) -> Duration {
        Duration::from_millis(self.resync_timeout_ms)
    }

    pub fn resync_retry_timeout(&self) -> Duration {
        Duration::from_millis(self.resync_retry_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }

    /// Apply `TABPROBE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> HarnessResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&str, &mut u64); 4] = [
            (ENV_RESPONSE_BUDGET_MS, &mut self.response_budget_ms),
            (ENV_RESYNC_TIMEOUT_MS, &mut self.resync_timeout_ms),
            (ENV_RESYNC_RETRY_TIMEOUT_MS, &mut self.resync_retry_timeout_ms),
            (ENV_STARTUP_TIMEOUT_MS, &mut self.startup_timeout_ms),
        ];
        for (key, field) in fields {
            if let Some(raw) = lookup(key) {
                *field = raw.trim().parse().map_err(|_| {
                    HarnessError::config(
                        format!("{key} must be a whole number of milliseconds"),
                        serde_json::json!({ "var": key, "value": raw }),
                    )
                })?;
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        let budgets = [
            ("response_budget_ms", self.response_budget_ms),
            ("resync_timeout_ms", self.resync_timeout_ms),
            ("resync_retry_timeout_ms", self.resync_retry_timeout_ms),
            ("startup_timeout_ms", self.startup_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(HarnessError::config(
                    format!("{name} must be greater than zero"),
                    serde_json::json!({ "field": name }),
                ));
            }
        }
        if self.resync_retry_timeout_ms < self.resync_timeout_ms {
            return Err(HarnessError::config(
                "resync_retry_timeout_ms must not be shorter than resync_timeout_ms",
                serde_json::json!({
                    "resync_timeout_ms": self.resync_timeout_ms,
                    "resync_retry_timeout_ms": self.resync_retry_timeout_ms,
                }),
            ));
        }
        Ok(())
    }
}

/// Load a config file (YAML by `.yaml`/`.yml` extension, JSON otherwise).
pub fn load_config_file(path: &Path) -> HarnessResult<HarnessConfig> {
    let config: HarnessConfig = crate::scenario::read_structured(path, "config")?;
    config.validate()?;
    Ok(config)
}
