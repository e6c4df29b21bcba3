//! Facade over a control-plane CLI under test.
//!
//! [`ControlPlaneHarness`] owns the validated config, the client version
//! reported by the binary, and an [`HttpPoller`]. Every command it runs is
//! prefixed with the namespace and context flags, so tests only pass the
//! subcommand they care about.
//!
//! Each harness carries its own [`Dispatch`] built from its verbosity, and
//! its operations log only through it. Two harnesses with different
//! verbosity can run side by side without touching the global subscriber.

use std::ffi::OsString;
use std::fmt::Display;
use std::time::Duration;

use meshprobe_common::{
    HarnessConfig, HarnessError, HarnessResult, KubeEvent, Verbosity, build_dispatch,
    parse_kube_events,
};
use tracing::dispatcher::{self, Dispatch};
use tracing::{debug, info};

use crate::exec::{CommandInvocation, CommandResult};
use crate::http::HttpPoller;
use crate::retry::{RetryPolicy, retry_for};
use crate::stream::StreamHandle;

/// Read access to cluster events, supplied by whatever Kubernetes client
/// the caller uses.
pub trait KubeApi {
    /// Raw JSON of the `v1.EventList` for `namespace`.
    fn events_json(&self, namespace: &str) -> HarnessResult<String>;
}

/// Drives the control-plane binary named in [`HarnessConfig::binary`].
#[derive(Debug)]
pub struct ControlPlaneHarness {
    config: HarnessConfig,
    version: String,
    http: HttpPoller,
    dispatch: Dispatch,
}

impl ControlPlaneHarness {
    /// Validate `config` and record the binary's client version.
    ///
    /// Logs go to stderr at the config's verbosity. Runs
    /// `<binary> <prefix> version --client --short`; its trimmed stdout
    /// becomes [`version`](Self::version).
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        let dispatch = build_dispatch(&config.log_config());
        Self::with_dispatch(config, dispatch)
    }

    /// Like [`new`](Self::new), logging through `dispatch` instead.
    pub fn with_dispatch(config: HarnessConfig, dispatch: Dispatch) -> HarnessResult<Self> {
        config.validate()?;
        let http = HttpPoller::from_config(&config);
        let mut harness = Self {
            config,
            version: String::new(),
            http,
            dispatch,
        };

        let version = harness
            .run(["version", "--client", "--short"])
            .into_stdout()?;
        harness.version = version.trim().to_string();
        harness.scoped(|| {
            info!(
                binary = %harness.config.binary.display(),
                version = %harness.version,
                namespace = %harness.config.namespace,
                "Harness ready"
            );
        });
        Ok(harness)
    }

    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Client version reported by the binary at construction.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Namespace reserved for one test: `<namespace>-<name>`.
    pub fn test_namespace(&self, name: &str) -> String {
        format!("{}-{}", self.config.namespace, name)
    }

    pub fn cluster_domain(&self) -> &str {
        &self.config.cluster_domain
    }

    pub fn verbosity(&self) -> Verbosity {
        self.config.verbosity
    }

    fn invocation<I, S>(&self, args: I) -> CommandInvocation
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        CommandInvocation::new(&self.config.binary)
            .arg(&self.config.namespace_flag)
            .arg(&self.config.namespace)
            .arg(format!("--context={}", self.config.k8s_context))
            .args(args)
    }

    /// Run the binary with the namespace and context prefix.
    pub fn run<I, S>(&self, args: I) -> CommandResult
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.execute(self.invocation(args))
    }

    /// Like [`run`](Self::run), with `stdin` written to the process.
    pub fn pipe_run<I, S>(&self, stdin: &str, args: I) -> CommandResult
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.execute(self.invocation(args).stdin(stdin))
    }

    fn execute(&self, invocation: CommandInvocation) -> CommandResult {
        self.scoped(|| {
            let result = invocation.run();
            if self.config.verbosity.echoes_output() {
                result.trace_lines(&invocation.program_name());
            }
            result
        })
    }

    /// Start a long-running command and return its live output stream.
    ///
    /// Only startup is logged through the harness; later reads on the
    /// handle log to the caller's subscriber.
    pub fn run_stream<I, S>(&self, args: I) -> HarnessResult<StreamHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let invocation = self.invocation(args);
        self.scoped(|| StreamHandle::spawn(&invocation, self.config.stream_grace))
    }

    /// Poll `check` at the configured interval for up to `timeout`.
    pub fn retry_for<T, E, F>(&self, timeout: Duration, check: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let policy = RetryPolicy::new(timeout).with_interval(self.config.poll_interval);
        self.scoped(|| retry_for(&policy, check))
    }

    /// GET `url` until it answers 2xx or the HTTP retry budget runs out.
    pub fn http_get(&self, url: &str) -> HarnessResult<String> {
        self.scoped(|| self.http.get(url))
    }

    /// Check that `version` reports this client and `server_version`.
    pub fn check_version(&self, server_version: &str) -> HarnessResult<()> {
        let out = self.run(["version"]).into_stdout()?;
        if !out.contains(&format!("Client version: {}", self.version)) {
            return Err(HarnessError::VersionMismatch {
                component: "client",
                expected: self.version.clone(),
                output: out,
            });
        }
        if !out.contains(&format!("Server version: {server_version}")) {
            return Err(HarnessError::VersionMismatch {
                component: "server",
                expected: server_version.to_string(),
                output: out,
            });
        }
        Ok(())
    }

    /// Compare `out` byte for byte with the golden file `<fixture_dir>/<fixture>`.
    pub fn validate_output(&self, out: &str, fixture: &str) -> HarnessResult<()> {
        let path = self.config.fixture_dir.join(fixture);
        let expected = std::fs::read_to_string(&path)?;
        if out != expected {
            self.scoped(|| debug!(fixture = %path.display(), "Output differs from fixture"));
            return Err(HarnessError::OutputMismatch {
                expected,
                actual: out.to_string(),
            });
        }
        Ok(())
    }

    /// Fetch and decode the events of `namespace`.
    pub fn events(&self, api: &dyn KubeApi, namespace: &str) -> HarnessResult<Vec<KubeEvent>> {
        self.scoped(|| {
            let raw = api.events_json(namespace)?;
            parse_kube_events(&raw)
        })
    }
}
