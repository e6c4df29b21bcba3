//! Harness configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `MESHPROBE_*` environment variables.

pub mod env;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{LogConfig, Verbosity};

pub use env::{EnvError, EnvParser};

/// Reference poll cadence of the retry engine.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Per-request HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Overall budget for polling an HTTP endpoint.
pub const DEFAULT_HTTP_RETRY_TIMEOUT: Duration = Duration::from_secs(60);
/// How long a streamed command must survive before it is considered live.
pub const DEFAULT_STREAM_GRACE: Duration = Duration::from_millis(500);

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid environment: {}", join_env_errors(.0))]
    Env(Vec<EnvError>),

    #[error("binary path is required")]
    MissingBinary,

    #[error("binary path must be absolute: {}", .0.display())]
    RelativeBinary(PathBuf),

    #[error("binary does not exist: {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
}

fn join_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Settings for driving a control-plane binary under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Absolute path to the control-plane CLI being tested.
    pub binary: PathBuf,
    /// Namespace the control plane is installed in.
    pub namespace: String,
    /// Flag used to pass the namespace to the binary.
    pub namespace_flag: String,
    /// Kubernetes context of the test cluster; empty means current context.
    pub k8s_context: String,
    pub cluster_domain: String,
    /// Directory holding golden output files.
    pub fixture_dir: PathBuf,
    pub verbosity: Verbosity,
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    #[serde(with = "duration_str")]
    pub http_timeout: Duration,
    #[serde(with = "duration_str")]
    pub http_retry_timeout: Duration,
    #[serde(with = "duration_str")]
    pub stream_grace: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::new(),
            namespace: "linkerd".to_string(),
            namespace_flag: "--linkerd-namespace".to_string(),
            k8s_context: String::new(),
            cluster_domain: "cluster.local".to_string(),
            fixture_dir: PathBuf::from("testdata"),
            verbosity: Verbosity::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            http_retry_timeout: DEFAULT_HTTP_RETRY_TIMEOUT,
            stream_grace: DEFAULT_STREAM_GRACE,
        }
    }
}

impl HarnessConfig {
    /// Config for the given binary with everything else defaulted.
    pub fn for_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }

    /// Default location of the config file (`<config dir>/meshprobe/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meshprobe").join("config.toml"))
    }

    /// Parse TOML text; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then a TOML file, then the process environment.
    ///
    /// The file is `path` when given (and must exist), otherwise
    /// [`default_path`](Self::default_path) if that file exists.
    pub fn load_layered(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = config_file(path, Self::default_path());
        Self::load_layered_with(file.as_deref(), &mut EnvParser::new())
    }

    /// Defaults, then `path` (if given), then the variables in `env`.
    pub fn load_layered_with(
        path: Option<&Path>,
        env: &mut EnvParser,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    /// Override fields from `MESHPROBE_*` variables.
    ///
    /// All invalid variables are reported together.
    pub fn apply_env(&mut self, parser: &mut EnvParser) -> Result<(), ConfigError> {
        if let Some(binary) = parser.get_path("BINARY") {
            self.binary = binary;
        }
        if let Some(namespace) = parser.get_string("NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(flag) = parser.get_string("NAMESPACE_FLAG") {
            self.namespace_flag = flag;
        }
        if let Some(context) = parser.get_string("K8S_CONTEXT") {
            self.k8s_context = context;
        }
        if let Some(domain) = parser.get_string("CLUSTER_DOMAIN") {
            self.cluster_domain = domain;
        }
        if let Some(dir) = parser.get_path("FIXTURE_DIR") {
            self.fixture_dir = dir;
        }
        if let Some(verbosity) = parser.get_verbosity("VERBOSITY") {
            self.verbosity = verbosity;
        }
        if parser.get_bool("VERBOSE") == Some(true) {
            self.verbosity = self.verbosity.max(Verbosity::Debug);
        }
        if let Some(interval) = parser.get_duration("POLL_INTERVAL") {
            self.poll_interval = interval;
        }
        if let Some(timeout) = parser.get_duration("HTTP_TIMEOUT") {
            self.http_timeout = timeout;
        }
        if let Some(timeout) = parser.get_duration("HTTP_RETRY_TIMEOUT") {
            self.http_retry_timeout = timeout;
        }
        if let Some(grace) = parser.get_duration("STREAM_GRACE") {
            self.stream_grace = grace;
        }

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }
        Ok(())
    }

    /// Check that the binary is usable and the timings make sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary.as_os_str().is_empty() {
            return Err(ConfigError::MissingBinary);
        }
        if !self.binary.is_absolute() {
            return Err(ConfigError::RelativeBinary(self.binary.clone()));
        }
        if !self.binary.exists() {
            return Err(ConfigError::BinaryNotFound(self.binary.clone()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "poll_interval",
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "http_timeout",
            });
        }
        Ok(())
    }

    /// Logging settings matching this config's verbosity.
    pub fn log_config(&self) -> LogConfig {
        LogConfig::new(self.verbosity)
    }
}

fn config_file(explicit: Option<&Path>, default: Option<PathBuf>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default.filter(|path| path.is_file()),
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
