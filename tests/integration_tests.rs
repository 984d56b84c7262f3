//! Integration tests using wiremock to simulate the Wire API.

use http::Method;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wire_client::{
    ApiCall, BaseClientConfig, Client, ClientConfig, Error, RequestSpec, ResponseKind,
    ResponseType, SendOptions, StateHook, TimeoutRetryWait, WireResponse, CLIENT_USER_AGENT,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn login_body() -> Value {
    json!({
        "access_token": "token-1",
        "expires_in": 900,
        "token_type": "Bearer",
        "user": "user-1"
    })
}

fn rate_limit_body(retry_after_ms: Option<u64>) -> Value {
    let mut body = json!({"code": 429, "message": "rate limited"});
    if let Some(ms) = retry_after_ms {
        body["retry_after_ms"] = json!(ms);
    }
    body
}

fn fast_config() -> ClientConfig {
    ClientConfig::builder()
        .request_timeout(Duration::from_secs(5))
        .timeout_retry_wait(TimeoutRetryWait::Fixed(Duration::from_millis(10)))
        .build()
}

fn client_for(server: &MockServer, config: ClientConfig) -> Client {
    Client::builder()
        .server(server.uri())
        .unwrap()
        .email("alice@example.com")
        .access_token("token-0")
        .config(config)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_login_succeeds_on_first_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"email": "alice@example.com", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .server(mock_server.uri())
        .unwrap()
        .email("alice@example.com")
        .build()
        .unwrap();

    let reply = client.login("secret", false).await.unwrap();

    match &reply.response {
        WireResponse::Login(login) => assert_eq!(login.access_token, "token-1"),
        other => panic!("Expected login response, got {:?}", other),
    }
    assert_eq!(reply.status.as_u16(), 200);
    assert_eq!(reply.attempts, 1);
    assert_eq!(reply.rate_limit_hits, 0);
    assert_eq!(reply.timeout_hits, 0);
    assert!(!reply.was_retried());
    assert_eq!(client.access_token().as_deref(), Some("token-1"));
    assert_eq!(client.user_id().as_deref(), Some("user-1"));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(requests[0].headers.get("content-type").unwrap(), "application/json");
}

#[tokio::test]
async fn test_persistent_login_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(query_param("persist", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, fast_config());
    let reply = client.login("secret", true).await.unwrap();
    assert_eq!(reply.response.response_type(), ResponseType::Login);
}

#[tokio::test]
async fn test_authenticated_calls_carry_current_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/clients"))
        .and(header("authorization", "Bearer token-1"))
        .and(header("accept", "*/*"))
        .and(header("user-agent", CLIENT_USER_AGENT))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "c1", "class": "desktop"}])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, fast_config());
    client.login("secret", false).await.unwrap();

    let reply = client.clients().await.unwrap();
    match &reply.response {
        WireResponse::Clients(devices) => {
            assert_eq!(devices.clients.len(), 1);
            assert_eq!(devices.clients[0].class.as_deref(), Some("desktop"));
        }
        other => panic!("Expected clients response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limited_then_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests are rate limited, third succeeds
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(429).set_body_json(rate_limit_body(Some(100)))
            } else {
                ResponseTemplate::new(200).set_body_json(json!([{"id": "u1", "handle": "bob"}]))
            }
        })
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .max_rate_limit_retries(Some(3))
        .build();
    let client = client_for(&mock_server, config);

    let start = std::time::Instant::now();
    let reply = client.users(Some("bob"), None).await.unwrap();

    assert_eq!(reply.response.response_type(), ResponseType::Users);
    assert_eq!(reply.attempts, 3);
    assert_eq!(reply.rate_limit_hits, 2);
    assert_eq!(reply.timeout_hits, 0);
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    // Two waits of the server-suggested 100ms
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_rate_limit_ceiling_returns_last_error_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(429).set_body_json(rate_limit_body(Some(10))))
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .max_rate_limit_retries(Some(2))
        .build();
    let client = client_for(&mock_server, config);

    let reply = client.notifications().await.unwrap();

    assert!(reply.is_error());
    assert_eq!(reply.status.as_u16(), 429);
    assert_eq!(reply.response.retry_after_ms(), Some(10));
    // 1 initial attempt + 2 retries
    assert_eq!(reply.attempts, 3);
    assert_eq!(reply.rate_limit_hits, 3);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_rate_limit_without_hint_waits_default() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(429).set_body_json(rate_limit_body(None))
            } else {
                ResponseTemplate::new(200).set_body_json(json!([]))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, fast_config());

    let start = std::time::Instant::now();
    let reply = client.clients().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(reply.attempts, 2);
    assert!(elapsed >= Duration::from_secs(5), "Expected 5s wait, got {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(8), "Expected 5s wait, got {:?}", elapsed);
}

#[tokio::test]
async fn test_429_with_success_body_is_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .max_rate_limit_retries(Some(0))
        .build();
    let client = client_for(&mock_server, config);

    let reply = client.clients().await.unwrap();

    assert_eq!(reply.status.as_u16(), 429);
    assert_eq!(reply.attempts, 1);
    assert_eq!(reply.rate_limit_hits, 1);
    assert!(!reply.is_error());
    match reply.into_response() {
        WireResponse::Clients(devices) => assert!(devices.clients.is_empty()),
        other => panic!("Expected clients response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_429_with_success_body_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .max_rate_limit_retries(Some(1))
        .build();
    let client = client_for(&mock_server, config);

    let start = std::time::Instant::now();
    let reply = client.clients().await.unwrap();
    let elapsed = start.elapsed();

    // No retry_after_ms in a success-shaped body, so the default wait applies
    assert!(elapsed >= Duration::from_secs(5), "Expected 5s wait, got {:?}", elapsed);
    assert_eq!(reply.attempts, 2);
    assert_eq!(reply.rate_limit_hits, 2);
    assert_eq!(reply.response.response_type(), ResponseType::Clients);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_error_body_counts_against_rate_limit_ceiling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": 403,
            "message": "Authentication failed.",
            "label": "invalid-credentials"
        })))
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .max_rate_limit_retries(Some(0))
        .build();
    let client = Client::builder()
        .server(mock_server.uri())
        .unwrap()
        .email("alice@example.com")
        .config(config)
        .build()
        .unwrap();

    let reply = client.login("wrong", false).await.unwrap();

    let error = reply.response.as_error().unwrap();
    assert_eq!(error.code, Some(403));
    assert_eq!(error.label.as_deref(), Some("invalid-credentials"));
    assert_eq!(reply.attempts, 1);
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_timeouts_then_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests are too slow, third answers immediately
    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            let template = ResponseTemplate::new(200).set_body_json(json!([]));
            if count < 2 {
                template.set_delay(Duration::from_millis(1000))
            } else {
                template
            }
        })
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .request_timeout(Duration::from_millis(200))
        .max_timeout_retries(Some(3))
        .timeout_retry_wait(TimeoutRetryWait::Fixed(Duration::from_millis(10)))
        .build();
    let client = client_for(&mock_server, config);

    let reply = client.clients().await.unwrap();

    assert_eq!(reply.response.response_type(), ResponseType::Clients);
    assert_eq!(reply.attempts, 3);
    assert_eq!(reply.timeout_hits, 2);
    assert_eq!(reply.rate_limit_hits, 0);
}

#[tokio::test]
async fn test_timeout_ceiling_returns_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(1000)),
        )
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .request_timeout(Duration::from_millis(100))
        .max_timeout_retries(Some(2))
        .timeout_retry_wait(TimeoutRetryWait::Immediate)
        .build();
    let client = client_for(&mock_server, config);

    let result = client.clients().await;

    match result {
        Err(Error::Timeout) => {}
        other => panic!("Expected Timeout, got {:?}", other),
    }
    // 1 initial attempt + 2 retries
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_per_call_timeout_overrides_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .max_timeout_retries(Some(0))
        .build();
    let client = client_for(&mock_server, config);

    let result = client
        .api_send(
            ResponseKind::Raw,
            ApiCall::new(Method::GET, "/slow"),
            SendOptions::new().timeout(Duration::from_millis(50)),
        )
        .await;

    assert!(matches!(result, Err(Error::Timeout)));
}

#[tokio::test]
async fn test_connection_error_surfaces_after_ceiling() {
    // Grab a free port and close it again so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ClientConfig::builder()
        .max_timeout_retries(Some(1))
        .timeout_retry_wait(TimeoutRetryWait::Immediate)
        .build();
    let client = Client::builder()
        .server(format!("http://127.0.0.1:{}", port))
        .unwrap()
        .access_token("token-0")
        .config(config)
        .build()
        .unwrap();

    let result = client.clients().await;

    match result {
        Err(e @ Error::Connection(_)) => assert!(e.is_transport()),
        other => panic!("Expected Connection error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unsupported_scheme_is_not_retried() {
    let config = ClientConfig::builder()
        .max_timeout_retries(Some(3))
        .timeout_retry_wait(TimeoutRetryWait::Fixed(Duration::from_millis(200)))
        .build();
    let client = Client::builder()
        .server("ftp://example.com")
        .unwrap()
        .access_token("token-0")
        .config(config)
        .build()
        .unwrap();

    let start = std::time::Instant::now();
    let result = client.clients().await;
    let elapsed = start.elapsed();

    match result {
        Err(e @ Error::Request(_)) => assert!(!e.is_transport()),
        other => panic!("Expected Request error, got {:?}", other),
    }
    // Any retry would have waited at least 200ms first
    assert!(elapsed < Duration::from_millis(200), "Retried, took {:?}", elapsed);
}

#[tokio::test]
async fn test_unsupported_scheme_fails_under_unlimited_ceiling() {
    let client = Client::builder()
        .server("ftp://example.com")
        .unwrap()
        .access_token("token-0")
        .build()
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(3), client.notifications()).await;

    assert!(matches!(result, Ok(Err(Error::Request(_)))), "got {:?}", result);
}

#[tokio::test]
async fn test_raw_send_does_not_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/properties/theme"))
        .and(body_json(json!({"value": "dark"})))
        .respond_with(ResponseTemplate::new(429).set_body_json(rate_limit_body(Some(10))))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, fast_config());

    let spec = RequestSpec::new(Method::PUT, "/properties/theme")
        .with_body(json!({"value": "dark"}).to_string());
    let response = client.send(&spec).await.unwrap();
    assert_eq!(response.status().as_u16(), 429);

    let spec = RequestSpec::new(Method::GET, "/slow").with_timeout(Duration::from_millis(50));
    let result = client.send(&spec).await;
    assert!(matches!(result, Err(Error::Timeout)), "got {:?}", result);

    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_decode_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, fast_config());
    let result = client.notifications().await;

    match result {
        Err(Error::DecodeFailed {
            raw_response,
            serde_error,
            status,
        }) => {
            assert_eq!(status.as_u16(), 200);
            assert_eq!(raw_response, "invalid json");
            assert!(serde_error.contains("expected"));
        }
        other => panic!("Expected DecodeFailed, got {:?}", other),
    }
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_json_content_type_is_still_decoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"notifications": [{"id": "n1", "payload": []}], "has_more": false}"#,
            "text/plain",
        ))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, fast_config());
    let reply = client.notifications().await.unwrap();

    match &reply.response {
        WireResponse::Notifications(page) => {
            assert_eq!(page.notifications[0].id, "n1");
            assert!(!page.has_more);
        }
        other => panic!("Expected notifications response, got {:?}", other),
    }
    assert_eq!(reply.header("content-type"), Some("text/plain"));
}

#[tokio::test]
async fn test_concurrent_first_calls_share_one_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/conversations"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"conversations": [], "has_more": false})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, fast_config());
    assert_eq!(client.sessions_created(), 0);

    let (clients, conversations) = tokio::join!(client.clients(), client.conversations(None, None));

    assert_eq!(clients.unwrap().response.response_type(), ResponseType::Clients);
    assert_eq!(
        conversations.unwrap().response.response_type(),
        ResponseType::Conversations
    );
    assert_eq!(client.sessions_created(), 1);
}

#[tokio::test]
async fn test_close_recreates_session_lazily() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, fast_config());

    client.clients().await.unwrap();
    client.close().await;
    assert_eq!(client.sessions_created(), 1);

    client.clients().await.unwrap();
    assert_eq!(client.sessions_created(), 2);
}

#[tokio::test]
async fn test_callbacks_only_see_matching_types() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404,
            "message": "User not found",
            "label": "not-found"
        })))
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .max_rate_limit_retries(Some(0))
        .build();
    let client = client_for(&mock_server, config);

    let logins = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));

    let counter = logins.clone();
    client.add_response_callback(
        move |response| {
            assert!(matches!(response, WireResponse::Login(_)));
            counter.fetch_add(1, Ordering::SeqCst);
        },
        ResponseType::Login,
    );
    let counter = errors.clone();
    client.add_response_callback(
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        [ResponseType::Error],
    );

    client.login("secret", false).await.unwrap();
    let reply = client.users(None, Some("missing")).await.unwrap();
    assert!(reply.is_error());

    assert_eq!(logins.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

struct CountingHook(AtomicUsize);

impl StateHook for CountingHook {
    fn receive(&self, _response: &WireResponse) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_state_hook_sees_only_terminal_response() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(429).set_body_json(rate_limit_body(Some(10)))
            } else {
                ResponseTemplate::new(200).set_body_json(json!([]))
            }
        })
        .mount(&mock_server)
        .await;

    let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
    let client = Client::builder()
        .server(mock_server.uri())
        .unwrap()
        .access_token("token-0")
        .config(fast_config())
        .state_hook(hook.clone())
        .build()
        .unwrap();

    let reply = client.clients().await.unwrap();

    assert_eq!(reply.attempts, 2);
    assert_eq!(hook.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_api_send_with_options_and_extra() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversations/c1/otr/messages"))
        .and(header("content-type", "application/x-protobuf"))
        .and(header("content-length", "5"))
        .and(header("authorization", "Bearer token-0"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "code": 412,
            "message": "missing clients",
            "label": "missing-auth"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .max_rate_limit_retries(Some(0))
        .build();
    let client = client_for(&mock_server, config);

    let mut call = ApiCall::new(Method::POST, "/conversations/c1/otr/messages");
    call.body = Some("hello".to_string());
    let options = SendOptions::new()
        .content_type("application/x-protobuf")
        .content_length(5)
        .extra(json!("c1"));

    let reply = client
        .api_send(ResponseKind::Raw, call, options)
        .await
        .unwrap();

    let error = reply.response.as_error().unwrap();
    assert_eq!(error.code, Some(412));
    assert_eq!(error.context, vec![json!("c1")]);
}

#[tokio::test]
async fn test_base_config_is_migrated() {
    let mock_server = MockServer::start().await;

    let client = Client::builder()
        .server(mock_server.uri())
        .unwrap()
        .base_config(BaseClientConfig {
            request_timeout: 5.0,
            max_limit_exceeded: Some(1),
            max_timeouts: Some(2),
            ..Default::default()
        })
        .build()
        .unwrap();

    assert_eq!(client.config().request_timeout, Duration::from_secs(5));
    assert_eq!(client.config().max_rate_limit_retries, Some(1));
    assert_eq!(client.config().max_timeout_retries, Some(2));
}
