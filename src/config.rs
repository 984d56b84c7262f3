//! Client configuration.
//!
//! [`ClientConfig`] holds the request timeout and the two retry ceilings. The older
//! flat [`BaseClientConfig`] is still accepted and converted with
//! [`ClientConfig::migrate`].

use crate::retry::TimeoutRetryWait;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for request dispatch and retries.
///
/// A ceiling of `None` means "retry forever", which suits long-running background
/// clients that should never give up on rate limits.
///
/// # Examples
///
/// ```
/// use wire_client::{ClientConfig, TimeoutRetryWait};
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .request_timeout(Duration::from_secs(30))
///     .max_rate_limit_retries(Some(5))
///     .max_timeout_retries(Some(3))
///     .timeout_retry_wait(TimeoutRetryWait::Fixed(Duration::from_secs(1)))
///     .build();
///
/// assert_eq!(config.max_timeout_retries, Some(3));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Default total timeout of a single request.
    ///
    /// Defaults to 60 seconds.
    pub request_timeout: Duration,

    /// How many rate-limited or error responses a call may retry.
    ///
    /// Once exceeded, the last error response is returned. Defaults to unlimited.
    pub max_rate_limit_retries: Option<usize>,

    /// How many connection errors or timeouts a call may retry.
    ///
    /// Once exceeded, the transport error is returned. Defaults to unlimited.
    pub max_timeout_retries: Option<usize>,

    /// Wait policy between transport retries.
    pub timeout_retry_wait: TimeoutRetryWait,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_rate_limit_retries: None,
            max_timeout_retries: None,
            timeout_retry_wait: TimeoutRetryWait::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a new builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Converts a deprecated [`BaseClientConfig`].
    ///
    /// Logs a deprecation warning. Negative or non-finite durations fall back to the
    /// defaults.
    pub fn migrate(base: BaseClientConfig) -> Self {
        tracing::warn!("BaseClientConfig is deprecated, pass a ClientConfig instead");

        let default = Self::default();
        let request_timeout =
            secs_to_duration(base.request_timeout).unwrap_or(default.request_timeout);
        let timeout_retry_wait = match (
            secs_to_duration(base.backoff_factor),
            secs_to_duration(base.max_timeout_retry_wait_time),
        ) {
            (Some(backoff_factor), Some(max_wait)) => TimeoutRetryWait::Exponential {
                backoff_factor,
                max_wait,
                jitter: false,
            },
            _ => default.timeout_retry_wait,
        };

        Self {
            request_timeout,
            max_rate_limit_retries: base.max_limit_exceeded,
            max_timeout_retries: base.max_timeouts,
            timeout_retry_wait,
        }
    }
}

impl From<BaseClientConfig> for ClientConfig {
    fn from(base: BaseClientConfig) -> Self {
        Self::migrate(base)
    }
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// Builder for [`ClientConfig`].
#[derive(Default)]
pub struct ClientConfigBuilder {
    request_timeout: Option<Duration>,
    max_rate_limit_retries: Option<Option<usize>>,
    max_timeout_retries: Option<Option<usize>>,
    timeout_retry_wait: Option<TimeoutRetryWait>,
}

impl ClientConfigBuilder {
    /// Sets the default request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the rate-limit retry ceiling; `None` is unlimited.
    pub fn max_rate_limit_retries(mut self, max: Option<usize>) -> Self {
        self.max_rate_limit_retries = Some(max);
        self
    }

    /// Sets the transport retry ceiling; `None` is unlimited.
    pub fn max_timeout_retries(mut self, max: Option<usize>) -> Self {
        self.max_timeout_retries = Some(max);
        self
    }

    /// Sets the wait policy between transport retries.
    pub fn timeout_retry_wait(mut self, wait: TimeoutRetryWait) -> Self {
        self.timeout_retry_wait = Some(wait);
        self
    }

    /// Builds the `ClientConfig`.
    pub fn build(self) -> ClientConfig {
        let default = ClientConfig::default();
        ClientConfig {
            request_timeout: self.request_timeout.unwrap_or(default.request_timeout),
            max_rate_limit_retries: self
                .max_rate_limit_retries
                .unwrap_or(default.max_rate_limit_retries),
            max_timeout_retries: self
                .max_timeout_retries
                .unwrap_or(default.max_timeout_retries),
            timeout_retry_wait: self
                .timeout_retry_wait
                .unwrap_or(default.timeout_retry_wait),
        }
    }
}

/// The flat configuration format used by older clients.
///
/// Times are in seconds. Deprecated: convert with [`ClientConfig::migrate`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BaseClientConfig {
    pub request_timeout: f64,
    pub max_limit_exceeded: Option<usize>,
    pub max_timeouts: Option<usize>,
    pub backoff_factor: f64,
    pub max_timeout_retry_wait_time: f64,
}

impl Default for BaseClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: 60.0,
            max_limit_exceeded: None,
            max_timeouts: None,
            backoff_factor: 0.1,
            max_timeout_retry_wait_time: 60.0,
        }
    }
}
