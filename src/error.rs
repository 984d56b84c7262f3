//! Error types for Wire API calls.
//!
//! Retryable conditions (connection failures, timeouts, rate limits) are absorbed by
//! the client's retry loop. What reaches the caller is either a connection or timeout
//! error that outlived its retry ceiling, or a failure no retry could fix.
//!
//! Rate limiting is deliberately *not* an error here: a call that keeps getting rate
//! limited returns its last [`ErrorResponse`](crate::ErrorResponse) as a normal value.

use http::StatusCode;

/// The main error type for Wire API calls.
///
/// # Examples
///
/// ```no_run
/// use wire_client::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().email("alice@example.com").build()?;
///
/// match client.login("secret", false).await {
///     Ok(reply) => println!("Logged in: {:?}", reply.response),
///     Err(Error::DecodeFailed { raw_response, serde_error, .. }) => {
///         eprintln!("Server sent something that is not JSON: {}", raw_response);
///         eprintln!("Parser said: {}", serde_error);
///     }
///     Err(e) if e.is_transport() => eprintln!("Network kept failing: {}", e),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The connection to the server could not be established or was lost.
    ///
    /// Retried with the timeout retry policy; surfaced once the timeout retry
    /// ceiling is exceeded.
    #[error("Connection error: {0}")]
    Connection(reqwest::Error),

    /// The request did not complete within its timeout.
    ///
    /// Shares the retry counter and wait policy with [`Error::Connection`].
    #[error("Request timed out")]
    Timeout,

    /// The HTTP layer rejected the request before or after the network was involved.
    ///
    /// Covers unsupported URL schemes, redirect policy violations and other
    /// builder errors. Never retried.
    #[error("Request error: {0}")]
    Request(reqwest::Error),

    /// The response body could not be parsed as JSON.
    ///
    /// Never retried: sending the same request again has no way of repairing
    /// a body the server already produced.
    ///
    /// # Fields
    ///
    /// * `raw_response` - The raw response body as a string
    /// * `serde_error` - The error message from serde
    /// * `status` - The HTTP status code
    #[error("Failed to decode response (status {status}): {serde_error}")]
    DecodeFailed {
        /// The raw response body that failed to decode
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A response was handed to the state receiver that the call did not ask for.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An authenticated call was attempted without an access token.
    #[error("Not logged in")]
    NotLoggedIn,

    /// Invalid configuration was provided.
    ///
    /// Covers invalid header values, an unusable proxy URL and a session that could
    /// not be created.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize a request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Classifies a `reqwest` failure. Only timeouts and connect, send or body
    /// failures end up in the retryable transport class.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() {
            Error::Connection(err)
        } else {
            Error::Request(err)
        }
    }

    /// Returns `true` for the failure class handled by the timeout retry policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use wire_client::Error;
    ///
    /// assert!(Error::Timeout.is_transport());
    /// assert!(!Error::NotLoggedIn.is_transport());
    /// ```
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Timeout)
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::DecodeFailed { status, .. } => Some(*status),
            Error::Connection(e) | Error::Request(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::DecodeFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for Wire API calls.
pub type Result<T> = std::result::Result<T, Error>;
