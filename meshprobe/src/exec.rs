//! One-shot command execution with output capture.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use meshprobe_common::{HarnessError, HarnessResult};
use tracing::{debug, trace, warn};

/// A program, its arguments and optional stdin text.
///
/// Built once and then only run; the builder methods consume `self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    program: PathBuf,
    args: Vec<OsString>,
    stdin: Option<String>,
}

impl CommandInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Text written to the child's stdin. Empty text means no stdin.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Printable `program arg arg ...` form for logs and errors.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    pub(crate) fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn stdin_payload(&self) -> Option<&str> {
        self.stdin.as_deref().filter(|input| !input.is_empty())
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Run to completion and capture stdout and stderr separately.
    ///
    /// Never retries and never times out. A spawn failure or non-zero exit
    /// lands in [`CommandResult::error`], next to whatever output was
    /// captured.
    pub fn run(&self) -> CommandResult {
        let start = Instant::now();
        debug!(command = %self.command_line(), "Executing command");

        let payload = self.stdin_payload();
        let mut cmd = self.command();
        cmd.stdin(if payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(program = %self.program.display(), error = %err, "Command failed to start");
                return CommandResult {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: None,
                    duration: start.elapsed(),
                    error: Some(HarnessError::StartupFailed {
                        program: self.program_name(),
                        reason: err.to_string(),
                    }),
                };
            }
        };

        // Writer and readers run on their own threads so none of the three
        // pipes can fill up and stall the child.
        let stdin_handle = match (child.stdin.take(), payload) {
            (Some(mut stdin), Some(payload)) => {
                let payload = payload.to_owned();
                Some(thread::spawn(move || stdin.write_all(payload.as_bytes())))
            }
            _ => None,
        };
        let stdout_handle = child
            .stdout
            .take()
            .map(|mut stdout| thread::spawn(move || read_to_string(&mut stdout)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|mut stderr| thread::spawn(move || read_to_string(&mut stderr)));

        let status = child.wait();
        let stdout = join_output(stdout_handle);
        let stderr = join_output(stderr_handle);
        if let Some(Ok(Err(err))) = stdin_handle.map(|handle| handle.join()) {
            // The child may exit without reading its input; only the exit status matters.
            debug!(error = %err, "Could not write full stdin payload");
        }

        let duration = start.elapsed();
        let (exit_code, error) = match status {
            Ok(status) if status.success() => (status.code(), None),
            Ok(status) => (
                status.code(),
                Some(HarnessError::CommandFailed {
                    program: self.program_name(),
                    status: describe_status(status),
                    stderr: stderr.clone(),
                }),
            ),
            Err(err) => (None, Some(HarnessError::Io(err))),
        };

        debug!(
            program = %self.program.display(),
            exit_code = ?exit_code,
            duration_ms = duration.as_millis() as u64,
            "Command completed"
        );

        CommandResult {
            stdout,
            stderr,
            exit_code,
            duration,
            error,
        }
    }
}

/// Output of a finished command.
///
/// Check [`error`](Self::error) before trusting `stdout`.
#[derive(Debug)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process never started or was killed by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub error: Option<HarnessError>,
}

impl CommandResult {
    /// Check if the command started and exited with status 0.
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Check if stdout contains a pattern
    pub fn stdout_contains(&self, pattern: &str) -> bool {
        self.stdout.contains(pattern)
    }

    /// Check if stderr contains a pattern
    pub fn stderr_contains(&self, pattern: &str) -> bool {
        self.stderr.contains(pattern)
    }

    /// Stdout on success, the failure otherwise.
    pub fn into_stdout(self) -> HarnessResult<String> {
        match self.error {
            None => Ok(self.stdout),
            Some(err) => Err(err),
        }
    }

    /// Emit every captured line at trace level.
    pub(crate) fn trace_lines(&self, program: &str) {
        for line in self.stdout.lines() {
            trace!(target: "meshprobe::output", program, stream = "stdout", "{line}");
        }
        for line in self.stderr.lines() {
            trace!(target: "meshprobe::output", program, stream = "stderr", "{line}");
        }
    }
}

fn read_to_string<R: Read>(reader: &mut R) -> String {
    let mut buffer = Vec::new();
    if reader.read_to_end(&mut buffer).is_ok() {
        String::from_utf8_lossy(&buffer).to_string()
    } else {
        String::new()
    }
}

fn join_output(handle: Option<thread::JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.join().unwrap_or_default(),
        None => String::new(),
    }
}

pub(crate) fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => status.to_string(),
    }
}
