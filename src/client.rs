//! Wire API client with rate-limit and timeout aware request dispatch.
//!
//! The [`Client`] type is the main entry point. Use [`ClientBuilder`] to configure
//! and create clients.

use crate::{
    api::{Api, ApiCall},
    callback::{ResponseCallback, ResponseFilter, StateHook},
    config::{BaseClientConfig, ClientConfig},
    reply::Reply,
    request::{RequestSpec, SendOptions},
    response::{decode, ResponseKind, WireResponse},
    retry::{RetryState, RetryStep},
    session::{SessionManager, SessionSettings},
    Error, Result,
};
use http::{HeaderMap, StatusCode};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use url::Url;

/// Server used when none is configured.
pub const DEFAULT_SERVER: &str = "https://prod-nginz-https.wire.com";

/// A client for the Wire REST API.
///
/// The client is cheap to clone; clones share the HTTP session, the access token and
/// the registered callbacks.
///
/// # Examples
///
/// ```no_run
/// use wire_client::{Client, ClientConfig, WireResponse};
///
/// # async fn example() -> Result<(), wire_client::Error> {
/// let client = Client::builder()
///     .email("alice@example.com")
///     .config(ClientConfig::builder().max_timeout_retries(Some(3)).build())
///     .build()?;
///
/// client.login("secret", false).await?;
///
/// let reply = client.conversations(None, Some(100)).await?;
/// if let WireResponse::Conversations(page) = &reply.response {
///     println!("{} conversations", page.conversations.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: Url,
    email: String,
    config: ClientConfig,
    session: SessionManager,
    auth: RwLock<AuthState>,
    callbacks: RwLock<Vec<ResponseCallback>>,
    state_hook: Option<Arc<dyn StateHook>>,
}

#[derive(Default)]
struct AuthState {
    access_token: Option<String>,
    user_id: Option<String>,
}

/// The outcome of one attempt that produced a response.
struct Attempt {
    response: WireResponse,
    status: StatusCode,
    headers: HeaderMap,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Sends one request and returns the raw transport response.
    ///
    /// Does not retry and does not pass anything through the state receiver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] or [`Error::Timeout`] if the request fails in
    /// transit, and [`Error::Request`] if it could not be sent at all.
    pub async fn send(&self, spec: &RequestSpec) -> Result<reqwest::Response> {
        let session = self.inner.session.ensure().await?;
        let url = self.url_for(&spec.path)?;
        let timeout = spec.timeout.unwrap_or(self.inner.config.request_timeout);

        tracing::debug!(
            method = %spec.method,
            url = %url,
            timeout_ms = timeout.as_millis(),
            session_id = session.id(),
            "Executing HTTP request"
        );

        let mut request = session
            .http_client()
            .request(spec.method.clone(), url)
            .headers(spec.headers.clone())
            .timeout(timeout);

        if let Some(body) = &spec.body {
            request = request.body(body.clone());
        }

        request.send().await.map_err(Error::from_transport)
    }

    /// Sends an API call, retrying rate limits and transport failures.
    ///
    /// Rate-limited (HTTP 429) and error responses are retried after the server's
    /// `retry_after_ms`, or 5 seconds, until
    /// [`max_rate_limit_retries`](ClientConfig::max_rate_limit_retries) is exceeded;
    /// the last error response is then returned as a normal reply. Connection errors
    /// and timeouts are retried with the configured wait policy until
    /// [`max_timeout_retries`](ClientConfig::max_timeout_retries) is exceeded, after
    /// which the error itself is returned.
    ///
    /// The terminal response passes through [`Client::receive_response`] before it is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wire_client::{ApiCall, Client, ResponseKind, SendOptions};
    /// use http::Method;
    ///
    /// # async fn example(client: Client) -> Result<(), wire_client::Error> {
    /// let call = ApiCall::new(Method::GET, "/self");
    /// let reply = client
    ///     .api_send(ResponseKind::Raw, call, SendOptions::new())
    ///     .await?;
    /// println!("{:?}", reply.response);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn api_send(
        &self,
        kind: ResponseKind,
        call: ApiCall,
        options: SendOptions,
    ) -> Result<Reply> {
        let access_token = self.access_token();
        let spec = RequestSpec::for_call(&call, &options, access_token.as_deref())?;
        let config = &self.inner.config;

        let start_time = Instant::now();
        let mut state = RetryState::default();
        let mut attempts = 0;

        let terminal = loop {
            attempts += 1;

            let step = match self.attempt(kind, &spec, &options).await {
                Ok(attempt) => {
                    let rate_limited = attempt.status == StatusCode::TOO_MANY_REQUESTS
                        || attempt.response.is_error();

                    if !rate_limited {
                        break attempt;
                    }

                    match state.on_rate_limited(config.max_rate_limit_retries, &attempt.response)
                    {
                        RetryStep::GiveUp => {
                            tracing::warn!(
                                status = attempt.status.as_u16(),
                                rate_limit_hits = state.rate_limit_hits,
                                method = %spec.method,
                                path = %spec.path,
                                "Rate limit retries exhausted, returning error response"
                            );
                            break attempt;
                        }
                        RetryStep::Retry(wait) => {
                            tracing::warn!(
                                status = attempt.status.as_u16(),
                                wait_ms = wait.as_millis(),
                                rate_limit_hits = state.rate_limit_hits,
                                method = %spec.method,
                                path = %spec.path,
                                "Rate limited - waiting before retry"
                            );
                            wait
                        }
                    }
                }
                Err(e) if e.is_transport() => {
                    match state.on_transport_failure(
                        config.max_timeout_retries,
                        &config.timeout_retry_wait,
                    ) {
                        RetryStep::GiveUp => {
                            tracing::error!(
                                error = %e,
                                timeout_hits = state.timeout_hits,
                                method = %spec.method,
                                path = %spec.path,
                                "Transport retries exhausted"
                            );
                            return Err(e);
                        }
                        RetryStep::Retry(wait) => {
                            tracing::warn!(
                                error = %e,
                                wait_ms = wait.as_millis(),
                                timeout_hits = state.timeout_hits,
                                method = %spec.method,
                                path = %spec.path,
                                "Request failed, retrying after delay"
                            );
                            wait
                        }
                    }
                }
                Err(e) => return Err(e),
            };

            tokio::time::sleep(step).await;
        };

        let latency = start_time.elapsed();
        tracing::info!(
            status = terminal.status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            response_type = ?terminal.response.response_type(),
            "Received API response"
        );

        self.receive_response(kind, &terminal.response)?;

        Ok(Reply {
            response: terminal.response,
            status: terminal.status,
            headers: terminal.headers,
            latency,
            attempts,
            rate_limit_hits: state.rate_limit_hits,
            timeout_hits: state.timeout_hits,
        })
    }

    /// Sends once and decodes the result.
    async fn attempt(
        &self,
        kind: ResponseKind,
        spec: &RequestSpec,
        options: &SendOptions,
    ) -> Result<Attempt> {
        let raw = self.send(spec).await?;
        let status = raw.status();
        let headers = raw.headers().clone();
        let response = decode(kind, raw, &options.extra).await?;

        Ok(Attempt {
            response,
            status,
            headers,
        })
    }

    /// Applies a terminal response to the client state.
    ///
    /// A login response stores the new access token and user id. The response is
    /// then handed to the [`StateHook`], if any, and to every registered callback whose
    /// filter matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `response` is neither of the kind the call
    /// asked for nor an error response.
    pub fn receive_response(&self, kind: ResponseKind, response: &WireResponse) -> Result<()> {
        if !response.answers(kind) {
            return Err(Error::InvalidArgument(format!(
                "{:?} response received for a {:?} call",
                response.response_type(),
                kind
            )));
        }

        if let WireResponse::Login(login) = response {
            let mut auth = self.auth_mut();
            auth.access_token = Some(login.access_token.clone());
            auth.user_id = Some(login.user.clone());
        }

        if let Some(hook) = &self.inner.state_hook {
            hook.receive(response);
        }

        // Snapshot so handlers may register further callbacks.
        let callbacks = self
            .inner
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for callback in &callbacks {
            callback.dispatch(response);
        }

        Ok(())
    }

    /// Registers a callback for terminal responses matching `filter`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wire_client::{Client, ResponseType};
    ///
    /// # fn example(client: Client) {
    /// client.add_response_callback(
    ///     |response| println!("logged in: {:?}", response),
    ///     ResponseType::Login,
    /// );
    /// # }
    /// ```
    pub fn add_response_callback<F>(&self, handler: F, filter: impl Into<ResponseFilter>)
    where
        F: Fn(&WireResponse) + Send + Sync + 'static,
    {
        self.inner
            .callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(ResponseCallback::new(handler, filter.into()));
    }

    /// Logs in with the configured email.
    ///
    /// On success the access token is stored and used by every later call.
    pub async fn login(&self, password: &str, persist: bool) -> Result<Reply> {
        let call = Api::login(&self.inner.email, password, persist)?;
        self.api_send(ResponseKind::Login, call, SendOptions::new())
            .await
    }

    /// Looks up users by handles or ids (comma separated).
    pub async fn users(&self, handles: Option<&str>, ids: Option<&str>) -> Result<Reply> {
        self.logged_in()?;
        self.api_send(ResponseKind::Users, Api::users(handles, ids), SendOptions::new())
            .await
    }

    /// Lists conversations, starting after the conversation id `start`.
    pub async fn conversations(&self, start: Option<&str>, size: Option<u32>) -> Result<Reply> {
        self.logged_in()?;
        self.api_send(
            ResponseKind::Conversations,
            Api::conversations(start, size),
            SendOptions::new(),
        )
        .await
    }

    /// Lists the user's registered devices.
    pub async fn clients(&self) -> Result<Reply> {
        self.logged_in()?;
        self.api_send(ResponseKind::Clients, Api::clients(), SendOptions::new())
            .await
    }

    /// Fetches the notification stream.
    pub async fn notifications(&self) -> Result<Reply> {
        self.logged_in()?;
        self.api_send(
            ResponseKind::Notifications,
            Api::notifications(),
            SendOptions::new(),
        )
        .await
    }

    /// Drops the HTTP session. The next call creates a new one.
    pub async fn close(&self) {
        self.inner.session.close().await;
    }

    /// Returns the current access token, if logged in.
    pub fn access_token(&self) -> Option<String> {
        self.auth().access_token.clone()
    }

    /// Returns the id of the logged in user.
    pub fn user_id(&self) -> Option<String> {
        self.auth().user_id.clone()
    }

    /// Returns `true` if an access token is held.
    pub fn is_logged_in(&self) -> bool {
        self.auth().access_token.is_some()
    }

    /// The account email used for login.
    pub fn email(&self) -> &str {
        &self.inner.email
    }

    /// The server base URL.
    pub fn server(&self) -> &Url {
        &self.inner.base_url
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// How many HTTP sessions this client has created.
    pub fn sessions_created(&self) -> usize {
        self.inner.session.sessions_created()
    }

    fn logged_in(&self) -> Result<()> {
        if self.is_logged_in() {
            Ok(())
        } else {
            Err(Error::NotLoggedIn)
        }
    }

    /// Appends `path` to the base URL as is, keeping any query string.
    fn url_for(&self, path: &str) -> Result<Url> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    fn auth(&self) -> RwLockReadGuard<'_, AuthState> {
        self.inner.auth.read().unwrap_or_else(|e| e.into_inner())
    }

    fn auth_mut(&self) -> RwLockWriteGuard<'_, AuthState> {
        self.inner.auth.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use wire_client::{ClientBuilder, ClientConfig};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), wire_client::Error> {
/// let client = ClientBuilder::new()
///     .server("https://staging-nginz-https.zinfra.io")?
///     .email("alice@example.com")
///     .proxy("http://localhost:3128")?
///     .config(
///         ClientConfig::builder()
///             .request_timeout(Duration::from_secs(30))
///             .max_rate_limit_retries(Some(10))
///             .build(),
///     )
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    server: Option<Url>,
    email: String,
    config: ClientConfig,
    proxy: Option<reqwest::Proxy>,
    verify_tls: bool,
    access_token: Option<String>,
    state_hook: Option<Arc<dyn StateHook>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            server: None,
            email: String::new(),
            config: ClientConfig::default(),
            proxy: None,
            verify_tls: true,
            access_token: None,
            state_hook: None,
        }
    }

    /// Sets the server base URL. Defaults to [`DEFAULT_SERVER`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn server(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.server = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the account email used by [`Client::login`].
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Sets the client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the configuration from a deprecated [`BaseClientConfig`].
    ///
    /// The config is converted with [`ClientConfig::migrate`], which logs a warning.
    pub fn base_config(mut self, config: BaseClientConfig) -> Self {
        self.config = ClientConfig::migrate(config);
        self
    }

    /// Routes all requests through an upstream proxy.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid.
    pub fn proxy(mut self, url: impl AsRef<str>) -> Result<Self> {
        let proxy = reqwest::Proxy::all(url.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid proxy: {}", e)))?;
        self.proxy = Some(proxy);
        Ok(self)
    }

    /// Sets whether server certificates are verified. Defaults to `true`.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Starts the client with an existing access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the hook that receives every terminal response.
    pub fn state_hook(mut self, hook: Arc<dyn StateHook>) -> Self {
        self.state_hook = Some(hook);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// No connection is opened until the first request.
    ///
    /// # Errors
    ///
    /// Returns an error if the default server URL cannot be parsed.
    pub fn build(self) -> Result<Client> {
        let base_url = match self.server {
            Some(url) => url,
            None => Url::parse(DEFAULT_SERVER)?,
        };

        let session = SessionManager::new(SessionSettings {
            request_timeout: self.config.request_timeout,
            verify_tls: self.verify_tls,
            proxy: self.proxy,
        });

        Ok(Client {
            inner: Arc::new(ClientInner {
                base_url,
                email: self.email,
                config: self.config,
                session,
                auth: RwLock::new(AuthState {
                    access_token: self.access_token,
                    user_id: None,
                }),
                callbacks: RwLock::new(Vec::new()),
                state_hook: self.state_hook,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
