//! Retry bookkeeping for a single API call.
//!
//! A call can fail in two unrelated ways: the network misbehaves (connection errors,
//! timeouts) or the server pushes back (HTTP 429, error bodies). Each has its own
//! counter and ceiling in [`RetryState`], and its own wait rule:
//!
//! - transport failures wait according to the configured [`TimeoutRetryWait`]
//! - rate limits wait for the server's `retry_after_ms`, or [`DEFAULT_RATE_LIMIT_WAIT`]

use crate::response::WireResponse;
use rand::Rng;
use std::time::Duration;

/// Wait applied to a rate-limited attempt when the server does not suggest one.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_millis(5000);

/// How long to wait before retrying after a connection error or timeout.
///
/// # Examples
///
/// ```
/// use wire_client::TimeoutRetryWait;
/// use std::time::Duration;
///
/// // 0, 200ms, 400ms, 800ms ... capped at 60s
/// let exponential = TimeoutRetryWait::Exponential {
///     backoff_factor: Duration::from_millis(100),
///     max_wait: Duration::from_secs(60),
///     jitter: false,
/// };
/// assert_eq!(exponential.wait_for(1), Duration::ZERO);
/// assert_eq!(exponential.wait_for(2), Duration::from_millis(200));
///
/// let fixed = TimeoutRetryWait::Fixed(Duration::from_secs(1));
/// assert_eq!(fixed.wait_for(7), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub enum TimeoutRetryWait {
    /// Retry immediately.
    Immediate,

    /// Exponentially growing waits.
    ///
    /// The first retry happens immediately; retry `n >= 2` waits
    /// `backoff_factor * 2^(n - 1)`, capped at `max_wait`.
    Exponential {
        /// Base unit of the exponential series.
        backoff_factor: Duration,
        /// Upper bound for a single wait.
        max_wait: Duration,
        /// Scale each wait by a random factor between 50% and 100%.
        jitter: bool,
    },

    /// The same wait before every retry.
    Fixed(Duration),

    /// Custom wait function.
    Custom {
        /// Takes the retry number (1-indexed) and returns the wait before it.
        wait_fn: fn(attempt: usize) -> Duration,
    },
}

impl Default for TimeoutRetryWait {
    fn default() -> Self {
        TimeoutRetryWait::Exponential {
            backoff_factor: Duration::from_millis(100),
            max_wait: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl TimeoutRetryWait {
    /// Returns the wait before the given retry.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The number of transport failures seen so far in this call (1-indexed)
    pub fn wait_for(&self, attempt: usize) -> Duration {
        match self {
            TimeoutRetryWait::Immediate => Duration::ZERO,
            TimeoutRetryWait::Exponential {
                backoff_factor,
                max_wait,
                jitter,
            } => {
                if attempt < 2 {
                    return Duration::ZERO;
                }

                // Past 2^31 the cap has long since won.
                let exponent = (attempt - 1).min(31) as u32;
                let wait = backoff_factor
                    .saturating_mul(2u32.saturating_pow(exponent))
                    .min(*max_wait);

                if *jitter {
                    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                    wait.mul_f64(jitter_factor)
                } else {
                    wait
                }
            }
            TimeoutRetryWait::Fixed(wait) => *wait,
            TimeoutRetryWait::Custom { wait_fn } => wait_fn(attempt),
        }
    }
}

/// Returns how long to wait after a rate-limited attempt.
///
/// Uses the server's `retry_after_ms` when it is present and non-zero.
pub fn rate_limit_wait(response: &WireResponse) -> Duration {
    match response.retry_after_ms() {
        Some(ms) if ms > 0 => Duration::from_millis(ms),
        _ => DEFAULT_RATE_LIMIT_WAIT,
    }
}

/// What the retry loop does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryStep {
    /// Sleep for the given duration, then send again.
    Retry(Duration),
    /// The relevant ceiling was exceeded.
    GiveUp,
}

/// The two independent retry counters of one call.
///
/// Created fresh for every call, so concurrent calls never share counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RetryState {
    pub(crate) rate_limit_hits: usize,
    pub(crate) timeout_hits: usize,
}

impl RetryState {
    /// Records a connection error or timeout.
    ///
    /// `GiveUp` means the caller must surface the transport error.
    pub(crate) fn on_transport_failure(
        &mut self,
        max_timeout_retries: Option<usize>,
        wait: &TimeoutRetryWait,
    ) -> RetryStep {
        self.timeout_hits += 1;

        if exceeds(self.timeout_hits, max_timeout_retries) {
            return RetryStep::GiveUp;
        }

        RetryStep::Retry(wait.wait_for(self.timeout_hits))
    }

    /// Records a rate-limited or error-shaped response.
    ///
    /// `GiveUp` means the response is accepted as the call's result.
    pub(crate) fn on_rate_limited(
        &mut self,
        max_rate_limit_retries: Option<usize>,
        response: &WireResponse,
    ) -> RetryStep {
        self.rate_limit_hits += 1;

        if exceeds(self.rate_limit_hits, max_rate_limit_retries) {
            return RetryStep::GiveUp;
        }

        RetryStep::Retry(rate_limit_wait(response))
    }
}

fn exceeds(hits: usize, ceiling: Option<usize>) -> bool {
    ceiling.is_some_and(|max| hits > max)
}
