//! Data-store setup and teardown around a suite.
//!
//! Completion of schema names only works against a populated store, so a
//! suite may declare shell commands that create it before the first test case
//! and drop it after the last one.

use crate::model::FixtureSpec;
use crate::runner::{HarnessError, HarnessResult};
use std::process::Command;

pub trait Fixture {
    fn setup(&mut self) -> HarnessResult<()>;
    fn teardown(&mut self) -> HarnessResult<()>;
}

/// Does nothing; used when a suite declares no fixture.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopFixture;

impl Fixture for NoopFixture {
    fn setup(&mut self) -> HarnessResult<()> {
        Ok(())
    }

    fn teardown(&mut self) -> HarnessResult<()> {
        Ok(())
    }
}

/// Runs each configured command line with `sh -c`, stopping at the first failure.
#[derive(Clone, Debug)]
pub struct CommandFixture {
    spec: FixtureSpec,
}

impl CommandFixture {
    pub fn new(spec: FixtureSpec) -> Self {
        Self { spec }
    }

    fn run_all(&self, phase: &str, commands: &[String]) -> HarnessResult<()> {
        for line in commands {
            tracing::info!(phase, command = %line, "running fixture command");
            let mut command = Command::new("sh");
            command.arg("-c").arg(line);
            if let Some(cwd) = &self.spec.cwd {
                command.current_dir(cwd);
            }
            let output = command
                .output()
                .map_err(|err| HarnessError::io(format!("failed to run {phase} command"), err))?;
            if !output.status.success() {
                return Err(HarnessError::new(
                    crate::runner::ErrorCode::Io,
                    format!("{phase} command exited unsuccessfully"),
                    Some(serde_json::json!({
                        "command": line,
                        "status": output.status.code(),
                        "stderr": String::from_utf8_lossy(&output.stderr),
                    })),
                ));
            }
        }
        Ok(())
    }
}

impl Fixture for CommandFixture {
    fn setup(&mut self) -> HarnessResult<()> {
        self.run_all("setup", &self.spec.setup)
    }

    fn teardown(&mut self) -> HarnessResult<()> {
        self.run_all("teardown", &self.spec.teardown)
    }
}

/// Fixture for an optional suite declaration.
pub fn fixture_for(spec: Option<&FixtureSpec>) -> Box<dyn Fixture> {
    match spec {
        Some(spec) => Box::new(CommandFixture::new(spec.clone())),
        None => Box::new(NoopFixture),
    }
}
