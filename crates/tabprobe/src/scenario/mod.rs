//! Loading suite and config files from disk.

use crate::model::{Suite, SUITE_VERSION};
use crate::runner::{HarnessError, HarnessResult};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub fn load_suite_file(path: &Path) -> HarnessResult<Suite> {
    let suite: Suite = read_structured(path, "suite")?;
    validate_suite(&suite)?;
    Ok(suite)
}

/// Parse a YAML (`.yaml`/`.yml`) or JSON file.
pub(crate) fn read_structured<T: DeserializeOwned>(path: &Path, what: &str) -> HarnessResult<T> {
    let data = fs::read_to_string(path)
        .map_err(|err| HarnessError::io(format!("failed to read {what} file"), err))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if is_yaml {
        serde_yml::from_str(&data).map_err(|err| {
            HarnessError::config(
                format!("failed to parse {what} yaml"),
                serde_json::json!({ "path": path.display().to_string(), "source": err.to_string() }),
            )
        })
    } else {
        serde_json::from_str(&data).map_err(|err| {
            HarnessError::config(
                format!("failed to parse {what} json"),
                serde_json::json!({ "path": path.display().to_string(), "source": err.to_string() }),
            )
        })
    }
}

pub fn validate_suite(suite: &Suite) -> HarnessResult<()> {
    if suite.suite_version != SUITE_VERSION {
        return Err(HarnessError::config(
            "unsupported suite version",
            serde_json::json!({
                "provided_version": suite.suite_version,
                "supported_version": SUITE_VERSION,
            }),
        ));
    }
    if suite.shell.command.trim().is_empty() {
        return Err(HarnessError::config("shell command must not be empty", None));
    }
    if suite.shell.prompt.trim().is_empty() {
        return Err(HarnessError::config("shell prompt must not be empty", None));
    }
    crate::prompt::PromptPattern::new(&suite.shell.prompt, suite.shell.context.clone())?;
    if let Some(config) = &suite.config {
        config.validate()?;
    }
    for test in &suite.tests {
        if test.probes.is_empty() {
            return Err(HarnessError::config(
                "test case has no probes",
                serde_json::json!({ "test": test.name }),
            ));
        }
    }
    Ok(())
}
