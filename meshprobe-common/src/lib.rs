//! Shared types for meshprobe.
//!
//! Everything here is free of process and network side effects: the error
//! taxonomy, configuration, logging setup, and the parsers that turn
//! command output into typed records.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod stat;

pub use config::{ConfigError, EnvError, EnvParser, HarnessConfig};
pub use error::{ErrorClass, HarnessError, HarnessResult};
pub use events::{KubeEvent, parse_events, parse_kube_events};
pub use logging::{
    LogConfig, Verbosity, build_dispatch, build_dispatch_with_writer, init_logging,
    init_test_logging,
};
pub use stat::{BASELINE_COLUMNS, ColumnLayout, RowStat, check_row_count, parse_rows};
