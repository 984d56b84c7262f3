//! Logs in and lists the account's conversations and devices.
//!
//! This example shows how to:
//! - Configure retry ceilings for rate limits and timeouts
//! - Log in and make authenticated calls
//! - Observe responses with a callback
//! - Inspect retry details on a reply
//!
//! Run with: `WIRE_EMAIL=... WIRE_PASSWORD=... cargo run --example login`

use std::time::Duration;
use wire_client::{Client, ClientConfig, Error, ResponseType, TimeoutRetryWait, WireResponse};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("wire_client=debug,login=info")
        .init();

    let email = std::env::var("WIRE_EMAIL").unwrap_or_default();
    let password = std::env::var("WIRE_PASSWORD").unwrap_or_default();

    let client = Client::builder()
        .email(email)
        .config(
            ClientConfig::builder()
                .request_timeout(Duration::from_secs(30))
                .max_rate_limit_retries(Some(5))
                .max_timeout_retries(Some(3))
                .timeout_retry_wait(TimeoutRetryWait::Exponential {
                    backoff_factor: Duration::from_millis(250),
                    max_wait: Duration::from_secs(10),
                    jitter: true,
                })
                .build(),
        )
        .build()?;

    client.add_response_callback(
        |response| println!("Server refused a call: {:?}", response.as_error()),
        ResponseType::Error,
    );

    println!("=== Login ===");
    let reply = client.login(&password, false).await?;
    match &reply.response {
        WireResponse::Login(login) => println!("Logged in as {}", login.user),
        _ => {
            println!("Login failed after {} attempts", reply.attempts);
            return Ok(());
        }
    }
    println!();

    println!("=== Conversations ===");
    let reply = client.conversations(None, Some(20)).await?;
    if let WireResponse::Conversations(page) = &reply.response {
        for conversation in &page.conversations {
            println!("{} {:?}", conversation.id, conversation.name);
        }
        println!("More available: {}", page.has_more);
    }
    println!("Request latency: {:?}", reply.latency);
    println!();

    println!("=== Devices ===");
    let reply = client.clients().await?;
    if let WireResponse::Clients(devices) = &reply.response {
        for device in &devices.clients {
            println!("{} {:?} {:?}", device.id, device.class, device.label);
        }
    }
    println!(
        "Rate limited {} times, timed out {} times",
        reply.rate_limit_hits, reply.timeout_hits
    );

    client.close().await;
    Ok(())
}
