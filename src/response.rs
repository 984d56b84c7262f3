//! Typed responses of the Wire API and the decoder that produces them.
//!
//! Every call names the [`ResponseKind`] it expects. The decoder parses the body as
//! JSON and hands it to [`ResponseKind::parse`], which decides between the expected
//! success variant and [`ErrorResponse`]. Parsing never fails on well-formed JSON of
//! an unexpected shape; such payloads degrade to an `ErrorResponse`.

use crate::{Error, Result};
use http::{header::CONTENT_TYPE, StatusCode};
use serde::Deserialize;
use serde_json::Value;

/// The variant a call expects the server to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Result of `POST /login`.
    Login,
    /// Result of `GET /users`.
    Users,
    /// Result of `GET /conversations`.
    Conversations,
    /// Result of `GET /clients`.
    Clients,
    /// Result of `GET /notifications`.
    Notifications,
    /// Any endpoint; the decoded JSON is returned as is.
    Raw,
}

/// Discriminant of a [`WireResponse`], used to filter response callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// [`WireResponse::Login`]
    Login,
    /// [`WireResponse::Users`]
    Users,
    /// [`WireResponse::Conversations`]
    Conversations,
    /// [`WireResponse::Clients`]
    Clients,
    /// [`WireResponse::Notifications`]
    Notifications,
    /// [`WireResponse::Raw`]
    Raw,
    /// [`WireResponse::Error`], whatever call produced it.
    Error,
}

impl From<ResponseKind> for ResponseType {
    fn from(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::Login => ResponseType::Login,
            ResponseKind::Users => ResponseType::Users,
            ResponseKind::Conversations => ResponseType::Conversations,
            ResponseKind::Clients => ResponseType::Clients,
            ResponseKind::Notifications => ResponseType::Notifications,
            ResponseKind::Raw => ResponseType::Raw,
        }
    }
}

/// A decoded response of the Wire API.
#[derive(Debug, Clone, PartialEq)]
pub enum WireResponse {
    Login(LoginResponse),
    Users(UsersResponse),
    Conversations(ConversationsResponse),
    Clients(ClientsResponse),
    Notifications(NotificationsResponse),
    Raw(Value),
    /// The server reported an error, or the payload did not have the expected shape.
    Error(ErrorResponse),
}

impl WireResponse {
    /// Returns the discriminant of this response.
    pub fn response_type(&self) -> ResponseType {
        match self {
            WireResponse::Login(_) => ResponseType::Login,
            WireResponse::Users(_) => ResponseType::Users,
            WireResponse::Conversations(_) => ResponseType::Conversations,
            WireResponse::Clients(_) => ResponseType::Clients,
            WireResponse::Notifications(_) => ResponseType::Notifications,
            WireResponse::Raw(_) => ResponseType::Raw,
            WireResponse::Error(_) => ResponseType::Error,
        }
    }

    /// Returns `true` if this is an [`ErrorResponse`].
    pub fn is_error(&self) -> bool {
        matches!(self, WireResponse::Error(_))
    }

    /// Returns the error payload, if this is an error response.
    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            WireResponse::Error(e) => Some(e),
            _ => None,
        }
    }

    /// The server's suggested wait before retrying, in milliseconds.
    pub fn retry_after_ms(&self) -> Option<u64> {
        self.as_error()?.retry_after_ms
    }

    /// Returns `true` if this response is a valid answer to a call expecting `kind`.
    ///
    /// Error responses answer every kind.
    pub fn answers(&self, kind: ResponseKind) -> bool {
        self.is_error() || self.response_type() == ResponseType::from(kind)
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
    /// Id of the logged in user.
    pub user: String,
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub accent_id: Option<i64>,
}

/// Result of a user lookup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// A conversation the user is a member of.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: i64,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub members: Value,
}

/// One page of conversations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub has_more: bool,
}

/// A device registered for the user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceClient {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// The user's registered devices.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ClientsResponse {
    pub clients: Vec<DeviceClient>,
}

/// An event from the notification stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub payload: Vec<Value>,
}

/// One page of the notification stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub time: Option<String>,
}

/// An error reported by the server, or a payload that did not match the expected shape.
///
/// Wire error bodies look like `{"code": 403, "message": "...", "label": "..."}`;
/// rate-limit bodies may add `retry_after_ms`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorResponse {
    pub code: Option<u16>,
    pub message: Option<String>,
    pub label: Option<String>,
    pub retry_after_ms: Option<u64>,
    /// Extra values the caller passed along with the request.
    pub context: Vec<Value>,
}

impl ErrorResponse {
    /// Returns `true` if `data` is shaped like a Wire error body.
    pub fn is_error_shape(data: &Value) -> bool {
        data.get("code").is_some_and(Value::is_u64)
            && (data.get("message").is_some() || data.get("label").is_some())
    }

    /// Builds an error response from a JSON payload, ignoring fields of the wrong type.
    pub fn from_value(data: &Value) -> Self {
        let string_field = |name: &str| data.get(name).and_then(Value::as_str).map(String::from);

        Self {
            code: data
                .get("code")
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok()),
            message: string_field("message"),
            label: string_field("label"),
            retry_after_ms: data.get("retry_after_ms").and_then(Value::as_u64),
            context: Vec::new(),
        }
    }

    fn unexpected_shape(kind: ResponseKind, error: &serde_json::Error) -> Self {
        Self {
            message: Some(format!("unexpected {:?} payload: {}", kind, error)),
            label: Some("unexpected-shape".to_string()),
            ..Default::default()
        }
    }

    fn with_context(mut self, extra: &[Value]) -> Self {
        self.context = extra.to_vec();
        self
    }
}

impl ResponseKind {
    /// Builds the response variant for this kind from decoded JSON.
    ///
    /// # Arguments
    ///
    /// * `data` - The decoded response body
    /// * `extra` - Context values supplied by the caller, attached to error responses
    ///
    /// # Examples
    ///
    /// ```
    /// use wire_client::{ResponseKind, WireResponse};
    /// use serde_json::json;
    ///
    /// let body = json!({"code": 429, "message": "rate limited", "retry_after_ms": 1500});
    /// let response = ResponseKind::Login.parse(body, &[]);
    ///
    /// assert!(response.is_error());
    /// assert_eq!(response.retry_after_ms(), Some(1500));
    /// ```
    pub fn parse(self, data: Value, extra: &[Value]) -> WireResponse {
        if ErrorResponse::is_error_shape(&data) {
            return WireResponse::Error(ErrorResponse::from_value(&data).with_context(extra));
        }

        let parsed = match self {
            ResponseKind::Login => serde_json::from_value(data).map(WireResponse::Login),
            ResponseKind::Users => serde_json::from_value(data).map(WireResponse::Users),
            ResponseKind::Conversations => {
                serde_json::from_value(data).map(WireResponse::Conversations)
            }
            ResponseKind::Clients => serde_json::from_value(data).map(WireResponse::Clients),
            ResponseKind::Notifications => {
                serde_json::from_value(data).map(WireResponse::Notifications)
            }
            ResponseKind::Raw => Ok(WireResponse::Raw(data)),
        };

        parsed.unwrap_or_else(|e| {
            tracing::warn!(kind = ?self, error = %e, "Response payload has an unexpected shape");
            WireResponse::Error(ErrorResponse::unexpected_shape(self, &e).with_context(extra))
        })
    }
}

/// Decodes a raw body into a response variant.
///
/// Fails only when the body is not JSON.
pub fn decode_body(
    kind: ResponseKind,
    status: StatusCode,
    raw_body: &str,
    extra: &[Value],
) -> Result<WireResponse> {
    match serde_json::from_str::<Value>(raw_body) {
        Ok(data) => Ok(kind.parse(data, extra)),
        Err(e) => {
            tracing::error!(
                error = %e,
                status = status.as_u16(),
                raw_response = %raw_body,
                "Failed to decode response"
            );

            Err(Error::DecodeFailed {
                raw_response: raw_body.to_string(),
                serde_error: e.to_string(),
                status,
            })
        }
    }
}

/// Reads a transport response and decodes it.
///
/// The declared content type is only logged; the body is always decoded as JSON.
pub(crate) async fn decode(
    kind: ResponseKind,
    response: reqwest::Response,
    extra: &[Value],
) -> Result<WireResponse> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !content_type.starts_with("application/json") {
        tracing::debug!(
            status = status.as_u16(),
            content_type = %content_type,
            "Response is not declared as JSON, decoding anyway"
        );
    }

    let raw_body = response.text().await.map_err(Error::from_transport)?;
    decode_body(kind, status, &raw_body, extra)
}
