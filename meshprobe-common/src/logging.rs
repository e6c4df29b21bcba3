//! Logging setup.
//!
//! Verbosity is carried as a value (in [`crate::HarnessConfig`] and the
//! harness built from it) rather than flipped on a process-wide switch.
//! [`build_dispatch`] produces a self-contained subscriber that parallel
//! test runs can scope with [`tracing::dispatcher::with_default`];
//! [`init_logging`] installs one globally for binaries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

/// How much the harness reports about what it is doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Nothing at all.
    #[default]
    Quiet,
    /// Progress of waits and commands.
    Info,
    /// Every poll attempt and command line.
    Debug,
    /// Also every line a command printed.
    Trace,
}

impl Verbosity {
    /// Filter directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "off",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Whether command output should be echoed line by line.
    pub fn echoes_output(self) -> bool {
        self >= Self::Trace
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Quiet => "quiet",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quiet" | "off" | "" => Ok(Self::Quiet),
            "info" => Ok(Self::Info),
            "debug" | "verbose" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown verbosity '{other}'")),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub verbosity: Verbosity,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl LogConfig {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            json: false,
        }
    }

    #[must_use]
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(self.verbosity.directive()).unwrap_or_else(|_| EnvFilter::new("off"))
    }
}

/// Build a subscriber for `config` writing to stderr, without installing it.
pub fn build_dispatch(config: &LogConfig) -> Dispatch {
    build_dispatch_with_writer(config, std::io::stderr)
}

/// Like [`build_dispatch`], with output sent to `writer`.
pub fn build_dispatch_with_writer<W>(config: &LogConfig, writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry().with(config.filter());
    if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true);
        Dispatch::new(registry.with(layer))
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();
        Dispatch::new(registry.with(layer))
    }
}

/// Install the subscriber for `config` as the global default.
///
/// Returns false when a global subscriber was already set.
pub fn init_logging(config: &LogConfig) -> bool {
    tracing::dispatcher::set_global_default(build_dispatch(config)).is_ok()
}

/// Subscriber for `cargo test` output; safe to call from every test.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_env("MESHPROBE_TEST_LOG")
        .unwrap_or_else(|_| EnvFilter::new("meshprobe=debug,meshprobe_common=debug"));
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}
