//! Drive a service-mesh control-plane CLI from integration tests.
//!
//! The pieces:
//! - [`exec`]: one-shot commands with separately captured stdout/stderr
//! - [`stream`]: long-running commands read line by line while they run
//! - [`retry`]: poll an idempotent check until it passes or time runs out
//! - [`http`]: poll an HTTP endpoint until it answers 2xx
//! - [`harness`]: all of the above bound to one configured binary
//!
//! Parsers, config and logging live in `meshprobe-common` and are
//! re-exported here.

pub mod exec;
pub mod harness;
pub mod http;
pub mod retry;
pub mod stream;

pub use exec::{CommandInvocation, CommandResult};
pub use harness::{ControlPlaneHarness, KubeApi};
pub use http::HttpPoller;
pub use retry::{RetryPolicy, retry_for};
pub use stream::{Lines, StreamHandle, StreamState};

pub use meshprobe_common::{
    BASELINE_COLUMNS, ColumnLayout, ConfigError, ErrorClass, HarnessConfig, HarnessError,
    HarnessResult, KubeEvent, LogConfig, RowStat, Verbosity, build_dispatch,
    build_dispatch_with_writer, check_row_count, init_logging, parse_events, parse_kube_events,
    parse_rows,
};
