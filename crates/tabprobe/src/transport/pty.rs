use super::{preview, Transport};
use crate::runner::{HarnessError, HarnessResult};
#[cfg(unix)]
use nix::fcntl::{fcntl, FcntlArg, OFlag};
#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use regex::bytes::Regex;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Everything needed to start the shell under test on a fresh PTY.
#[derive(Clone, Debug)]
pub struct SpawnConfig {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    /// Applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    pub rows: u16,
    pub cols: u16,
    pub poll_interval: Duration,
}

enum ReadOutcome {
    Data,
    Idle,
    Closed,
}

/// A PTY-backed transport owning one shell process.
///
/// The master side is switched to non-blocking mode and polled, so every read
/// is bounded by its deadline even when the shell stays silent.
pub struct PtyTransport {
    // Held so the PTY stays open for the life of the transport.
    _master: Box<dyn portable_pty::MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    reader: Box<dyn Read + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    pending: Vec<u8>,
    closed: bool,
    poll_interval: Duration,
}

impl PtyTransport {
    /// Open a PTY and spawn the configured command on its slave side.
    ///
    /// # Errors
    /// Returns `E_IO` if PTY creation, command spawn, or fd setup fails.
    pub fn spawn(config: &SpawnConfig) -> HarnessResult<Self> {
        let system = native_pty_system();
        let pair = system
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| HarnessError::io("failed to open pty", err))?;

        let mut cmd = CommandBuilder::new(&config.command);
        cmd.args(&config.args);
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|err| HarnessError::io("failed to spawn shell", err))?;
        // The slave fd must not stay open in this process, or EOF is never seen.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| HarnessError::io("failed to clone pty reader", err))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| HarnessError::io("failed to take pty writer", err))?;

        #[cfg(unix)]
        {
            if let Some(fd) = pair.master.as_raw_fd() {
                let flags = OFlag::from_bits_truncate(
                    fcntl(fd, FcntlArg::F_GETFL)
                        .map_err(|err| HarnessError::io("failed to get fd flags", err))?,
                );
                fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
                    .map_err(|err| HarnessError::io("failed to set nonblocking", err))?;
            }
        }

        tracing::debug!(command = %config.command, "spawned shell on pty");

        Ok(Self {
            _master: pair.master,
            writer,
            reader,
            child,
            pending: Vec::new(),
            closed: false,
            poll_interval: config.poll_interval,
        })
    }

    fn read_available(&mut self, into: &mut Vec<u8>) -> HarnessResult<ReadOutcome> {
        if self.closed {
            return Ok(ReadOutcome::Closed);
        }
        let mut buffer = [0u8; 4096];
        match self.reader.read(&mut buffer) {
            Ok(0) => {
                self.closed = true;
                Ok(ReadOutcome::Closed)
            }
            Ok(count) => {
                into.extend_from_slice(buffer.get(..count).unwrap_or_default());
                Ok(ReadOutcome::Data)
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(ReadOutcome::Idle),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => Ok(ReadOutcome::Idle),
            // Linux reports EIO on the master once the slave side is gone.
            Err(err) if is_eio(&err) => {
                self.closed = true;
                Ok(ReadOutcome::Closed)
            }
            Err(err) => Err(HarnessError::io("failed to read pty", err)),
        }
    }

    /// Wait for the shell to exit.
    ///
    /// Returns `Some(ExitStatus)` if it exits within `timeout`, `None` otherwise.
    pub fn wait_for_exit(
        &mut self,
        timeout: Duration,
    ) -> HarnessResult<Option<portable_pty::ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(err) => return Err(HarnessError::io("failed to wait for shell", err)),
            }
        }
    }

    /// SIGTERM the shell's process group, falling back to SIGKILL after `grace`.
    pub fn terminate_process_group(
        &mut self,
        grace: Duration,
    ) -> HarnessResult<Option<portable_pty::ExitStatus>> {
        #[cfg(unix)]
        if let Some(pgid) = self.process_group() {
            signal_process_group(pgid, Signal::SIGTERM)?;
            if let Some(status) = self.wait_for_exit(grace)? {
                return Ok(Some(status));
            }
            signal_process_group(pgid, Signal::SIGKILL)?;
            return self.wait_for_exit(Duration::from_millis(200));
        }

        self.child
            .kill()
            .map_err(|err| HarnessError::io("failed to terminate shell", err))?;
        self.wait_for_exit(grace)
    }

    #[cfg(unix)]
    fn process_group(&self) -> Option<Pid> {
        let pid = self.child.process_id()?;
        i32::try_from(pid).ok().map(Pid::from_raw)
    }

    fn cleanup_process_best_effort(&mut self) {
        let _ = self.writer.flush();
        if self.child.try_wait().ok().flatten().is_some() {
            return;
        }

        #[cfg(unix)]
        if let Some(pgid) = self.process_group() {
            let _ = signal_process_group(pgid, Signal::SIGTERM);
            let deadline = Instant::now() + Duration::from_millis(100);
            while Instant::now() < deadline {
                if self.child.try_wait().ok().flatten().is_some() {
                    return;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            let _ = signal_process_group(pgid, Signal::SIGKILL);
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }
    }
}

impl Transport for PtyTransport {
    fn send(&mut self, bytes: &[u8]) -> HarnessResult<()> {
        self.writer
            .write_all(bytes)
            .map_err(|err| HarnessError::io("failed to write to pty", err))?;
        self.writer
            .flush()
            .map_err(|err| HarnessError::io("failed to flush pty", err))
    }

    fn read_until_quiet(&mut self, quiet: Duration) -> HarnessResult<Vec<u8>> {
        let mut total = std::mem::take(&mut self.pending);
        let mut last_activity = Instant::now();
        loop {
            match self.read_available(&mut total)? {
                ReadOutcome::Data => last_activity = Instant::now(),
                ReadOutcome::Closed => break,
                ReadOutcome::Idle => {
                    if last_activity.elapsed() >= quiet {
                        break;
                    }
                    std::thread::sleep(self.poll_interval);
                }
            }
        }
        if total.is_empty() && self.closed {
            return Err(HarnessError::stream_closed(
                "shell closed the terminal before responding",
            ));
        }
        tracing::trace!(bytes = total.len(), "quiet read complete");
        Ok(total)
    }

    fn read_until_match(&mut self, pattern: &Regex, timeout: Duration) -> HarnessResult<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut total = std::mem::take(&mut self.pending);
        loop {
            if let Some(found) = pattern.find(&total) {
                self.pending = total.split_off(found.end());
                return Ok(total);
            }
            let outcome = self.read_available(&mut total)?;
            match outcome {
                ReadOutcome::Data | ReadOutcome::Idle => {}
                ReadOutcome::Closed => {
                    return Err(HarnessError::new(
                        crate::runner::ErrorCode::StreamClosed,
                        "shell closed the terminal while waiting for a prompt",
                        Some(serde_json::json!({ "received": preview(&total) })),
                    ));
                }
            }
            if Instant::now() >= deadline {
                let context = serde_json::json!({
                    "pattern": pattern.as_str(),
                    "timeout_ms": u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "received": preview(&total),
                });
                // Keep what arrived so a retry can still find the prompt in it.
                self.pending = total;
                return Err(HarnessError::timeout("timed out waiting for prompt", context));
            }
            if matches!(outcome, ReadOutcome::Idle) {
                std::thread::sleep(self.poll_interval);
            }
        }
    }

    /// Flush pending input, then terminate the shell's process group.
    fn shutdown(&mut self, grace: Duration) -> HarnessResult<()> {
        self.writer
            .flush()
            .map_err(|err| HarnessError::io("failed to flush pty writer during close", err))?;
        let status = self.terminate_process_group(grace)?;
        tracing::debug!(exited = status.is_some(), "shell terminated");
        Ok(())
    }
}

impl Drop for PtyTransport {
    /// Best-effort SIGTERM then SIGKILL of the shell; errors are ignored.
    /// Use [`Transport::shutdown`] for controlled termination.
    fn drop(&mut self) {
        self.cleanup_process_best_effort();
    }
}

#[cfg(unix)]
fn signal_process_group(pgid: Pid, signal: Signal) -> HarnessResult<()> {
    match killpg(pgid, signal) {
        // ESRCH means the process is already gone
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(err) => Err(HarnessError::io("failed to signal process group", err)),
    }
}

#[cfg(unix)]
fn is_eio(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::EIO as i32)
}

#[cfg(not(unix))]
fn is_eio(_err: &std::io::Error) -> bool {
    false
}
