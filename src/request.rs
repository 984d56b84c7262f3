//! Per-call request description and options.

use crate::api::ApiCall;
use crate::Error;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;
use std::time::Duration;

/// Identifier sent as `User-Agent` with every request.
pub const CLIENT_USER_AGENT: &str = concat!("wire-client/", env!("CARGO_PKG_VERSION"));

/// Content type used when a call does not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Optional knobs for a single API call.
///
/// # Examples
///
/// ```
/// use wire_client::SendOptions;
/// use std::time::Duration;
///
/// let options = SendOptions::new()
///     .timeout(Duration::from_secs(5))
///     .content_type("application/x-protobuf")
///     .extra(serde_json::json!("conversation-id"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// `Content-Type` header; defaults to [`DEFAULT_CONTENT_TYPE`].
    pub content_type: Option<String>,

    /// Overrides the client-wide request timeout for this call.
    pub timeout: Option<Duration>,

    /// Sent as `Content-Length` when set.
    pub content_length: Option<u64>,

    /// Context values handed to the response constructor.
    pub extra: Vec<Value>,
}

impl SendOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets an explicit content length.
    pub fn content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Appends a context value for the response constructor.
    pub fn extra(mut self, value: Value) -> Self {
        self.extra.push(value);
        self
    }
}

/// Everything needed to send one request; reused unchanged across retries of a call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// The HTTP method.
    pub method: Method,

    /// The request path, appended to the server base URL. May carry a query string.
    pub path: String,

    /// Opaque request body.
    pub body: Option<String>,

    /// Request headers.
    pub headers: HeaderMap,

    /// Per-request timeout; the client default applies when `None`.
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    /// Creates a spec with no body, headers or timeout.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// Builds the spec for an API call, including the standard header set.
    ///
    /// `Authorization` is only added when the call requires it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoggedIn`] if the call requires auth and no token is given,
    /// and a configuration error if a header value is invalid.
    pub fn for_call(
        call: &ApiCall,
        options: &SendOptions,
        access_token: Option<&str>,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();

        let content_type = options.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
        headers.insert(CONTENT_TYPE, header_value(content_type)?);
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        if call.requires_auth {
            let token = access_token.ok_or(Error::NotLoggedIn)?;
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        }

        if let Some(length) = options.content_length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        }

        Ok(Self {
            method: call.method.clone(),
            path: call.path.clone(),
            body: call.body.clone(),
            headers,
            timeout: options.timeout,
        })
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))
}
