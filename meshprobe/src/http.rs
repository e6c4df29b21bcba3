//! HTTP GET polling for endpoints that take a while to come up.

use std::time::Duration;

use meshprobe_common::config::{DEFAULT_HTTP_RETRY_TIMEOUT, DEFAULT_HTTP_TIMEOUT};
use meshprobe_common::{HarnessConfig, HarnessError, HarnessResult};
use tracing::debug;
use ureq::Agent;

use crate::retry::{RetryPolicy, retry_for};

/// Polls a URL until it answers with a 2xx status.
///
/// Each request is bounded by the agent's timeout; the whole poll is
/// bounded by the retry policy.
#[derive(Debug, Clone)]
pub struct HttpPoller {
    agent: Agent,
    policy: RetryPolicy,
}

impl Default for HttpPoller {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT, RetryPolicy::new(DEFAULT_HTTP_RETRY_TIMEOUT))
    }
}

impl HttpPoller {
    pub fn new(request_timeout: Duration, policy: RetryPolicy) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(request_timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: Agent::new_with_config(config),
            policy,
        }
    }

    /// Timeouts and poll interval taken from `config`.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(
            config.http_timeout,
            RetryPolicy::new(config.http_retry_timeout).with_interval(config.poll_interval),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url` until it succeeds, returning the body.
    ///
    /// On timeout the last failure is returned as-is, including the status
    /// and body of the last non-2xx response.
    pub fn get(&self, url: &str) -> HarnessResult<String> {
        retry_for(&self.policy, || self.get_once(url))
    }

    /// A single GET. Only the status decides success; the body is not inspected.
    pub fn get_once(&self, url: &str) -> HarnessResult<String> {
        let mut response =
            self.agent
                .get(url)
                .call()
                .map_err(|err| HarnessError::HttpTransport {
                    url: url.to_string(),
                    reason: err.to_string(),
                })?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| HarnessError::HttpTransport {
                url: url.to_string(),
                reason: format!("Error reading response body: {err}"),
            })?;

        debug!(url, status = status.as_u16(), bytes = body.len(), "GET completed");
        if !status.is_success() {
            return Err(HarnessError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
