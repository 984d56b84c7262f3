//! Lazily created, shared HTTP session.
//!
//! A `Session` is a configured `reqwest` client, and with it one connection pool.
//! The `SessionManager` creates it on first use and hands out cheap clones to every
//! call of the same client, so concurrent calls share connections.

use crate::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Per-connection buffering limit, in bytes.
///
/// Applied to the HTTP/2 stream and connection windows so a slow peer cannot make a
/// single connection hold more than this much unconsumed data.
pub(crate) const WRITE_BUFFER_LIMIT: u32 = 16 * 1024;

/// Settings a session is created with. Fixed for the lifetime of the client.
#[derive(Debug, Clone)]
pub(crate) struct SessionSettings {
    pub(crate) request_timeout: Duration,
    pub(crate) verify_tls: bool,
    pub(crate) proxy: Option<reqwest::Proxy>,
}

/// A live HTTP session.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    http_client: reqwest::Client,
    id: usize,
}

impl Session {
    fn create(settings: &SessionSettings, id: usize) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .http2_initial_stream_window_size(WRITE_BUFFER_LIMIT)
            .http2_initial_connection_window_size(WRITE_BUFFER_LIMIT);

        if let Some(proxy) = &settings.proxy {
            builder = builder.proxy(proxy.clone());
        }

        let http_client = builder.build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP session: {}", e))
        })?;

        tracing::debug!(
            session_id = id,
            timeout_secs = settings.request_timeout.as_secs_f64(),
            verify_tls = settings.verify_tls,
            "Created HTTP session"
        );

        Ok(Self { http_client, id })
    }

    /// The underlying `reqwest` client.
    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Sequence number of this session within its manager, starting at 1.
    pub(crate) fn id(&self) -> usize {
        self.id
    }
}

/// Owns the single session of a client.
pub(crate) struct SessionManager {
    settings: SessionSettings,
    slot: RwLock<Option<Session>>,
    created: AtomicUsize,
}

impl SessionManager {
    pub(crate) fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            slot: RwLock::new(None),
            created: AtomicUsize::new(0),
        }
    }

    /// Returns the live session, creating it if there is none.
    ///
    /// Creation happens under the write lock, so concurrent first calls end up
    /// with the same session.
    pub(crate) async fn ensure(&self) -> Result<Session> {
        if let Some(session) = self.slot.read().await.as_ref() {
            return Ok(session.clone());
        }

        let mut slot = self.slot.write().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        let id = self.created.load(Ordering::SeqCst) + 1;
        let session = Session::create(&self.settings, id)?;
        self.created.store(id, Ordering::SeqCst);
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Drops the live session. In-flight requests keep their own handle.
    pub(crate) async fn close(&self) {
        if let Some(session) = self.slot.write().await.take() {
            tracing::debug!(session_id = session.id, "Closed HTTP session");
        }
    }

    /// How many sessions this manager has created so far.
    pub(crate) fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}
