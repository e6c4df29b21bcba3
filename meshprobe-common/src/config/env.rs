//! Environment variable parsing with type safety.
//!
//! Reads `MESHPROBE_*` variables, validating each one and collecting the
//! problems so all of them can be reported at once.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::logging::Verbosity;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Invalid duration format.
    #[error("Invalid duration for {var}: {value}")]
    InvalidDuration { var: String, value: String },

    /// Invalid verbosity.
    #[error("Invalid verbosity for {var}: {value}")]
    InvalidVerbosity { var: String, value: String },
}

/// Type-safe environment variable parser.
///
/// Every getter returns `None` when the variable is unset, so callers only
/// override values that were actually provided.
pub struct EnvParser {
    prefix: &'static str,
    vars: HashMap<String, String>,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Snapshot the process environment with the MESHPROBE_ prefix.
    pub fn new() -> Self {
        Self::from_vars(env::vars())
    }

    /// Parse from an explicit set of variables instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: "MESHPROBE_",
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            errors: Vec::new(),
        }
    }

    /// Get all accumulated errors.
    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take ownership of errors.
    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// Get the full variable name with prefix.
    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn raw(&self, name: &str) -> Option<(String, String)> {
        let var_name = self.var_name(name);
        self.vars
            .get(&var_name)
            .map(|value| (var_name, value.clone()))
    }

    /// Get a string value.
    pub fn get_string(&mut self, name: &str) -> Option<String> {
        self.raw(name).map(|(_, value)| value)
    }

    /// Get a path value with ~ expansion.
    pub fn get_path(&mut self, name: &str) -> Option<PathBuf> {
        let (_, value) = self.raw(name)?;
        if value.is_empty() {
            return None;
        }
        let expanded = match value.strip_prefix("~/") {
            Some(stripped) => dirs::home_dir()
                .map(|home| home.join(stripped))
                .unwrap_or_else(|| PathBuf::from(&value)),
            None => PathBuf::from(&value),
        };
        Some(expanded)
    }

    /// Get a boolean value.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    pub fn get_bool(&mut self, name: &str) -> Option<bool> {
        let (var_name, value) = self.raw(name)?;
        match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Get a duration such as `500ms`, `10s` or `1m`.
    pub fn get_duration(&mut self, name: &str) -> Option<Duration> {
        let (var_name, value) = self.raw(name)?;
        match humantime::parse_duration(value.trim()) {
            Ok(duration) => Some(duration),
            Err(_) => {
                self.errors.push(EnvError::InvalidDuration {
                    var: var_name,
                    value,
                });
                None
            }
        }
    }

    /// Get a verbosity level.
    pub fn get_verbosity(&mut self, name: &str) -> Option<Verbosity> {
        let (var_name, value) = self.raw(name)?;
        match value.parse::<Verbosity>() {
            Ok(verbosity) => Some(verbosity),
            Err(_) => {
                self.errors.push(EnvError::InvalidVerbosity {
                    var: var_name,
                    value,
                });
                None
            }
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}
