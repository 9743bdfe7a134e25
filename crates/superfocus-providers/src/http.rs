//! Shared plumbing for provider HTTP clients.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use superfocus_core::{FocusError, ProviderErrorKind, Result};
use tracing::error;

/// Default timeout for outbound calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds a client whose `timeout` covers each whole exchange, body included.
pub fn build_client(timeout: Duration) -> Result<Client> {
    finish(Client::builder().timeout(timeout))
}

/// Builds a client for long streamed bodies: `timeout` bounds connecting
/// only, so a slow download is never cut off mid-stream. Callers bound the
/// wait for response headers themselves with [`send_within`].
pub fn build_streaming_client(timeout: Duration) -> Result<Client> {
    finish(Client::builder().connect_timeout(timeout))
}

fn finish(builder: reqwest::ClientBuilder) -> Result<Client> {
    builder
        .user_agent(concat!("superfocus/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            FocusError::config_validation(
                format!("HTTP client: {e}"),
                "Check TLS support on this host",
            )
        })
}

/// Sends `request`, failing when the response headers take longer than
/// `timeout`. The body is not covered.
pub async fn send_within(
    provider: &str,
    timeout: Duration,
    request: reqwest::RequestBuilder,
) -> Result<Response> {
    match tokio::time::timeout(timeout, request.send()).await {
        Ok(sent) => sent.map_err(|e| transport_error(provider, &e)),
        Err(_) => {
            error!(provider, timeout_secs = timeout.as_secs(), "Provider did not answer in time");
            Err(FocusError::provider(
                provider,
                ProviderErrorKind::Network,
                format!("no response within {}s", timeout.as_secs()),
            ))
        }
    }
}

/// Maps a transport failure (connect, timeout, body read) to a provider error.
pub fn transport_error(provider: &str, err: &reqwest::Error) -> FocusError {
    error!(provider, error = %err, "Provider request failed");
    FocusError::provider(provider, ProviderErrorKind::Network, err.to_string())
}

/// Passes successful responses through; turns anything else into a provider
/// error carrying the provider's own message when it sent one.
pub async fn check_status(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    error!(provider, status = status.as_u16(), message = %message, "Provider returned an error");
    Err(FocusError::provider(
        provider,
        ProviderErrorKind::from_status(status.as_u16()),
        message,
    ))
}

/// Decodes a JSON body, reporting undecodable bodies as invalid responses.
pub async fn read_json<T: DeserializeOwned>(provider: &str, response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, &e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        error!(provider, error = %e, "Provider response did not decode");
        FocusError::provider(provider, ProviderErrorKind::InvalidResponse, e.to_string())
    })
}

/// Pulls a human-readable message out of the error bodies providers use:
/// `{"error":{"message":..}}`, `{"message":..}`, `{"msg":..}`,
/// `{"error_description":..}` or `{"error":".."}`.
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let candidates = [
        &value["error"]["message"],
        &value["message"],
        &value["msg"],
        &value["error_description"],
        &value["error"],
    ];
    for candidate in candidates {
        if let Some(message) = candidate.as_str() {
            return Some(message.to_string());
        }
    }
    None
}

/// Trims trailing slashes so paths can be appended with `format!`.
pub fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
