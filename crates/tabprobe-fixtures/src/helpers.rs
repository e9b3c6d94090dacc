//! Common test helper functions.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tabprobe::{SessionConfig, Suite};

/// Prompt template matching the fixture shell after a cancelled line.
pub const FAKE_PROMPT: &str = "\nfake:{context}> ";

/// Create a unique temporary directory for a test.
///
/// The directory name includes the process id and a timestamp to avoid
/// collisions between parallel test runs.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
pub fn temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("tabprobe-{prefix}-{}-{stamp}", std::process::id()));

    #[allow(clippy::expect_used)]
    fs::create_dir_all(&dir).expect("failed to create temp directory");

    dir
}

/// Session settings for the fixture shell at `binary`, opened in `keyspace`.
#[must_use]
pub fn fake_shell_session(binary: &str, keyspace: &str) -> SessionConfig {
    SessionConfig::new(binary, FAKE_PROMPT)
        .with_args(["--keyspace", keyspace])
        .with_context(keyspace)
}

/// Write a suite as YAML (`.yaml`/`.yml`) or JSON (anything else).
///
/// # Panics
///
/// Panics if serialization or file writing fails.
pub fn write_suite(path: &Path, suite: &Suite) {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml");

    #[allow(clippy::expect_used)]
    let data = if is_yaml {
        serde_yml::to_string(suite)
            .expect("failed to serialize suite")
            .into_bytes()
    } else {
        serde_json::to_vec_pretty(suite).expect("failed to serialize suite")
    };

    #[allow(clippy::expect_used)]
    fs::write(path, data).expect("failed to write suite file");
}
