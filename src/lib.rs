//! # wire-client - an async client for the Wire REST API
//!
//! Every call goes through one dispatch loop that turns a logical API call into a
//! delivered HTTP exchange, even when the server rate limits or the network drops
//! requests. The result is a typed [`WireResponse`] or a well-defined [`Error`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use wire_client::{Client, ClientConfig, WireResponse};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wire_client::Error> {
//!     let client = Client::builder()
//!         .email("alice@example.com")
//!         .config(
//!             ClientConfig::builder()
//!                 .request_timeout(Duration::from_secs(30))
//!                 .max_rate_limit_retries(Some(5))
//!                 .max_timeout_retries(Some(3))
//!                 .build(),
//!         )
//!         .build()?;
//!
//!     let reply = client.login("secret", false).await?;
//!     if let WireResponse::Error(error) = &reply.response {
//!         eprintln!("Login failed: {:?}", error.message);
//!         return Ok(());
//!     }
//!
//!     let reply = client.clients().await?;
//!     if let WireResponse::Clients(devices) = &reply.response {
//!         println!("{} devices, took {:?}", devices.clients.len(), reply.latency);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Retries
//!
//! Each call keeps two independent counters:
//!
//! - **Rate limits.** An HTTP 429 or an error body is retried after the server's
//!   `retry_after_ms` (5 seconds if absent). Past
//!   [`ClientConfig::max_rate_limit_retries`] the last error response is returned as a
//!   normal [`Reply`], so the caller can inspect it.
//! - **Transport failures.** Connection errors and timeouts are retried with the
//!   [`TimeoutRetryWait`] policy. Past [`ClientConfig::max_timeout_retries`] the error
//!   is returned.
//!
//! A ceiling of `None` never gives up. Nothing bounds the loop as a whole; wrap the
//! call in `tokio::time::timeout` if you need an overall deadline.
//!
//! ## Observing responses
//!
//! Every terminal response passes through [`Client::receive_response`] exactly once,
//! which updates the access token after a login, calls the [`StateHook`] and any
//! callbacks registered with [`Client::add_response_callback`].

mod api;
mod callback;
mod client;
mod config;
mod error;
mod reply;
mod request;
pub mod response;
pub mod retry;
mod session;

pub use api::{Api, ApiCall};
pub use callback::{ResponseCallback, ResponseFilter, StateHook};
pub use client::{Client, ClientBuilder, DEFAULT_SERVER};
pub use config::{BaseClientConfig, ClientConfig, ClientConfigBuilder};
pub use error::{Error, Result};
pub use reply::Reply;
pub use request::{RequestSpec, SendOptions, CLIENT_USER_AGENT, DEFAULT_CONTENT_TYPE};
pub use response::{ErrorResponse, ResponseKind, ResponseType, WireResponse};
pub use retry::{TimeoutRetryWait, DEFAULT_RATE_LIMIT_WAIT};
