//! Error taxonomy for harness operations.
//!
//! Every failure is returned as a value. [`ErrorClass`] groups variants by
//! how a caller should react: startup and shape/decode failures are fatal
//! for the call, execution failures are what the retry engine polls through.

use std::fmt;

use crate::config::ConfigError;

/// Broad classification of a [`HarnessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The process never started, or a streamed process exited inside its grace window.
    Startup,
    /// Non-zero exit, non-2xx response or transport error.
    Execution,
    /// Output did not have the row/column/item shape the caller expected.
    ShapeMismatch,
    /// A JSON payload could not be decoded.
    Decode,
    /// Invalid configuration.
    Config,
    /// Local I/O failure.
    Io,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Startup => "startup",
            Self::Execution => "execution",
            Self::ShapeMismatch => "shape_mismatch",
            Self::Decode => "decode",
            Self::Config => "config",
            Self::Io => "io",
        };
        write!(f, "{label}")
    }
}

/// Error type for harness operations
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Process failed to start: {program}: {reason}")]
    StartupFailed { program: String, reason: String },

    #[error("Process exited during startup grace period: {program} ({status})")]
    ExitedEarly { program: String, status: String },

    #[error("Command {program} failed ({status})\n{stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("GET request to [{url}] returned status [{status}]\n{body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("GET request to [{url}] failed: {reason}")]
    HttpTransport { url: String, reason: String },

    #[error("Error stripping header and trailing newline; full output:\n{output}")]
    MissingHeader { output: String },

    #[error("Expected [{expected}] rows in stat output, got [{actual}]; full output:\n{output}")]
    RowCount {
        expected: usize,
        actual: usize,
        output: String,
    },

    #[error("Expected [{expected}] columns in stat output, got [{actual}]; full output:\n{row}")]
    ColumnCount {
        expected: usize,
        actual: usize,
        row: String,
    },

    #[error("Unsupported column count [{columns}]; at least [{minimum}] columns are required")]
    UnsupportedLayout { columns: usize, minimum: usize },

    #[error("no events found")]
    NoEvents,

    #[error("error unmarshaling event list: {0}")]
    EnvelopeDecode(#[source] serde_json::Error),

    #[error("error unmarshaling event list item {index}: {source}")]
    EventDecode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected:\n{expected}\nActual:\n{actual}")]
    OutputMismatch { expected: String, actual: String },

    #[error("Expected {component} version [{expected}], got:\n{output}")]
    VersionMismatch {
        component: &'static str,
        expected: String,
        output: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::StartupFailed { .. } | Self::ExitedEarly { .. } => ErrorClass::Startup,
            Self::CommandFailed { .. }
            | Self::HttpStatus { .. }
            | Self::HttpTransport { .. }
            | Self::OutputMismatch { .. }
            | Self::VersionMismatch { .. } => ErrorClass::Execution,
            Self::MissingHeader { .. }
            | Self::RowCount { .. }
            | Self::ColumnCount { .. }
            | Self::UnsupportedLayout { .. }
            | Self::NoEvents => ErrorClass::ShapeMismatch,
            Self::EnvelopeDecode(_) | Self::EventDecode { .. } => ErrorClass::Decode,
            Self::Config(_) => ErrorClass::Config,
            Self::Io(_) => ErrorClass::Io,
        }
    }

    /// Whether waiting and asking again could plausibly change the outcome.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Execution
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;
