//! Builders for the Wire API endpoints.
//!
//! Each builder only describes the call; nothing here touches the network.

use crate::{Error, Result};
use http::Method;
use serde::Serialize;
use url::form_urlencoded;

/// Method, path and body of one API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub method: Method,
    /// Path relative to the server base URL, including any query string.
    pub path: String,
    /// JSON-encoded body.
    pub body: Option<String>,
    /// Whether the call carries `Authorization: Bearer <token>`.
    pub requires_auth: bool,
}

impl ApiCall {
    /// Creates an authenticated call without a body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            requires_auth: true,
        }
    }

    /// Attaches a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json =
            serde_json::to_string(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        self.body = Some(json);
        Ok(self)
    }

    /// Marks the call as not needing an access token.
    pub fn without_auth(mut self) -> Self {
        self.requires_auth = false;
        self
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

/// Builders for the endpoints the client knows about.
pub struct Api;

impl Api {
    /// `POST /login`, the only call sent without a bearer token.
    ///
    /// # Examples
    ///
    /// ```
    /// use wire_client::Api;
    ///
    /// let call = Api::login("alice@example.com", "secret", true).unwrap();
    /// assert_eq!(call.path, "/login?persist=true");
    /// assert!(!call.requires_auth);
    /// ```
    pub fn login(email: &str, password: &str, persist: bool) -> Result<ApiCall> {
        let path = if persist { "/login?persist=true" } else { "/login" };
        Ok(ApiCall::new(Method::POST, path)
            .with_json(&LoginBody { email, password })?
            .without_auth())
    }

    /// `GET /users`, looked up by handles or ids (comma separated).
    pub fn users(handles: Option<&str>, ids: Option<&str>) -> ApiCall {
        let query = query_string(&[("handles", handles), ("ids", ids)]);
        ApiCall::new(Method::GET, format!("/users{}", query))
    }

    /// `GET /conversations`, paged by `start` and `size`.
    pub fn conversations(start: Option<&str>, size: Option<u32>) -> ApiCall {
        let size = size.map(|s| s.to_string());
        let query = query_string(&[("size", size.as_deref()), ("start", start)]);
        ApiCall::new(Method::GET, format!("/conversations{}", query))
    }

    /// `GET /clients`
    pub fn clients() -> ApiCall {
        ApiCall::new(Method::GET, "/clients")
    }

    /// `GET /notifications`
    pub fn notifications() -> ApiCall {
        ApiCall::new(Method::GET, "/notifications")
    }
}

fn query_string(params: &[(&str, Option<&str>)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;

    for (key, value) in params {
        if let Some(value) = value {
            serializer.append_pair(key, value);
            any = true;
        }
    }

    if any {
        format!("?{}", serializer.finish())
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_body() {
        let call = Api::login("alice@example.com", "p@ss", false).unwrap();
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.path, "/login");

        let body: serde_json::Value = serde_json::from_str(call.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["password"], "p@ss");
    }

    #[test]
    fn test_users_query() {
        assert_eq!(Api::users(None, None).path, "/users");
        assert_eq!(Api::users(Some("alice,bob"), None).path, "/users?handles=alice%2Cbob");
        assert_eq!(Api::users(None, Some("u1")).path, "/users?ids=u1");
    }

    #[test]
    fn test_conversations_query() {
        assert_eq!(Api::conversations(None, None).path, "/conversations");
        assert_eq!(
            Api::conversations(Some("c9"), Some(50)).path,
            "/conversations?size=50&start=c9"
        );
    }

    #[test]
    fn test_authenticated_by_default() {
        for call in [Api::clients(), Api::notifications(), Api::users(None, None)] {
            assert!(call.requires_auth);
            assert_eq!(call.method, Method::GET);
            assert!(call.body.is_none());
        }
    }
}
