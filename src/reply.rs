//! The value returned by every API call.
//!
//! A [`Reply`] wraps the terminal [`WireResponse`] together with what happened on the
//! way there: the final status and headers, total latency, and how often the call
//! was retried for each failure class.

use crate::response::WireResponse;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// The terminal response of an API call plus transport details.
///
/// # Examples
///
/// ```no_run
/// use wire_client::{Client, WireResponse};
///
/// # async fn example() -> Result<(), wire_client::Error> {
/// let client = Client::builder().email("alice@example.com").build()?;
/// let reply = client.login("secret", false).await?;
///
/// match &reply.response {
///     WireResponse::Login(login) => println!("Logged in as {}", login.user),
///     WireResponse::Error(error) => println!("Login refused: {:?}", error.message),
///     _ => unreachable!(),
/// }
/// println!("Took {:?} over {} attempts", reply.latency, reply.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Reply {
    /// The decoded response.
    pub response: WireResponse,

    /// HTTP status code of the final attempt.
    pub status: StatusCode,

    /// Response headers of the final attempt.
    pub headers: HeaderMap,

    /// Time from the first send until the final response was decoded, including waits.
    pub latency: Duration,

    /// Total number of requests sent.
    pub attempts: usize,

    /// Rate-limited or error responses seen.
    pub rate_limit_hits: usize,

    /// Connection errors and timeouts seen.
    pub timeout_hits: usize,
}

impl Reply {
    /// Returns `true` if the call needed more than one request.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns `true` if the call ended in an error response.
    pub fn is_error(&self) -> bool {
        self.response.is_error()
    }

    /// Returns a reference to a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use wire_client::{Reply, WireResponse};
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let reply = Reply {
    ///     response: WireResponse::Raw(serde_json::json!({})),
    ///     status: StatusCode::OK,
    ///     headers,
    ///     latency: Duration::from_millis(10),
    ///     attempts: 1,
    ///     rate_limit_hits: 0,
    ///     timeout_hits: 0,
    /// };
    ///
    /// assert_eq!(reply.header("content-type"), Some("application/json"));
    /// assert!(!reply.was_retried());
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Consumes the reply, keeping only the response.
    pub fn into_response(self) -> WireResponse {
        self.response
    }
}

impl AsRef<WireResponse> for Reply {
    fn as_ref(&self) -> &WireResponse {
        &self.response
    }
}

impl std::ops::Deref for Reply {
    type Target = WireResponse;

    fn deref(&self) -> &Self::Target {
        &self.response
    }
}
