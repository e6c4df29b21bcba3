//! Streaming output of long-lived commands.
//!
//! Some commands are correct when they *keep* printing (tap, logs -f),
//! not when they finish. [`StreamHandle`] starts such a command, waits a
//! short grace period to make sure it did not die on startup, then hands
//! out its stdout line by line while it keeps running.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, ChildStdout, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use meshprobe_common::{HarnessError, HarnessResult};
use tracing::{debug, warn};

use crate::exec::{CommandInvocation, describe_status};

/// Lifecycle of a [`StreamHandle`]. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Live,
    Closed,
}

/// A running command and the read end of its stdout.
///
/// Dropping the handle kills and reaps the process.
#[derive(Debug)]
pub struct StreamHandle {
    program: String,
    pid: u32,
    started_at: Instant,
    child: Child,
    reader: Option<BufReader<ChildStdout>>,
    state: StreamState,
}

impl StreamHandle {
    /// Start `invocation` and return a live handle once it has survived `grace`.
    ///
    /// A process that has already exited when the grace period ends cannot
    /// be producing continuous output and is reported as
    /// [`HarnessError::ExitedEarly`].
    pub fn spawn(invocation: &CommandInvocation, grace: Duration) -> HarnessResult<Self> {
        let program = invocation.program_name();
        debug!(command = %invocation.command_line(), "Starting streamed command");

        let mut child = invocation
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| HarnessError::StartupFailed {
                program: program.clone(),
                reason: err.to_string(),
            })?;
        let started_at = Instant::now();

        thread::sleep(grace);

        let polled = child.try_wait();
        check_survived(&mut child, polled, &program)?;

        let pid = child.id();
        let reader = child.stdout.take().map(BufReader::new);
        debug!(program = %program, pid, "Streamed command is live");

        Ok(Self {
            program,
            pid,
            started_at,
            child,
            reader,
            state: StreamState::Live,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Time since the process was started.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Check if the process is still running
    pub fn is_running(&mut self) -> bool {
        self.state == StreamState::Live && matches!(self.child.try_wait(), Ok(None))
    }

    /// Read the next line, without its line terminator.
    ///
    /// Blocks only until a line is available. Invalid UTF-8 is replaced
    /// lossily, as in [`CommandResult`](crate::exec::CommandResult).
    /// Returns `Ok(None)` once the process closed its stdout; the process
    /// is then stopped and the handle closed.
    pub fn read_line(&mut self) -> HarnessResult<Option<String>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut buf = Vec::new();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            self.stop()?;
            return Ok(None);
        }
        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Iterate over lines until EOF.
    ///
    /// A read error is yielded as an item; iteration may continue after it.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines { handle: self }
    }

    /// Kill the process (if still running), reap it and release the pipe.
    ///
    /// Stopping an already closed handle does nothing.
    pub fn stop(&mut self) -> HarnessResult<()> {
        if self.state == StreamState::Closed {
            return Ok(());
        }
        if self.child.try_wait()?.is_none() {
            debug!(program = %self.program, pid = self.pid, "Stopping streamed command");
            if let Err(err) = self.child.kill() {
                // Exited between the check and the kill.
                if err.kind() != io::ErrorKind::InvalidInput {
                    return Err(err.into());
                }
            }
        }
        self.close()
    }

    fn close(&mut self) -> HarnessResult<()> {
        self.reader = None;
        self.state = StreamState::Closed;
        let status = self.child.wait()?;
        debug!(program = %self.program, pid = self.pid, status = %status, "Streamed command reaped");
        Ok(())
    }
}

/// Turn the post-grace poll into a verdict. A child that cannot be polled
/// is killed and reaped before the error is returned.
fn check_survived(
    child: &mut Child,
    polled: io::Result<Option<ExitStatus>>,
    program: &str,
) -> HarnessResult<()> {
    match polled {
        Ok(None) => Ok(()),
        Ok(Some(status)) => {
            warn!(program, status = %status, "Streamed command exited during grace period");
            Err(HarnessError::ExitedEarly {
                program: program.to_string(),
                status: describe_status(status),
            })
        }
        Err(err) => {
            warn!(program, error = %err, "Could not poll streamed command; killing it");
            let _ = child.kill();
            let _ = child.wait();
            Err(err.into())
        }
    }
}

impl Read for StreamHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };
        let n = reader.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.stop().map_err(io::Error::other)?;
        }
        Ok(n)
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(program = %self.program, pid = self.pid, error = %err, "Failed to stop streamed command");
        }
    }
}

/// Line iterator returned by [`StreamHandle::lines`].
pub struct Lines<'a> {
    handle: &'a mut StreamHandle,
}

impl Iterator for Lines<'_> {
    type Item = HarnessResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.handle.read_line().transpose()
    }
}
