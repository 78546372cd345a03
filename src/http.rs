//! JSON POST with retry and exponential backoff.
//!
//! Shared by the remote embedding providers and the chat model client:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Why a request ultimately failed.
#[derive(Debug)]
pub enum SendError {
    /// Connection refused, DNS failure, reset, ...
    Network(reqwest::Error),
    /// The request exceeded the client timeout.
    Timeout,
    /// Non-success status after retries (or a non-retryable 4xx).
    Status { status: StatusCode, body: String },
    /// 2xx response whose body was not valid JSON.
    Decode(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Network(e) => write!(f, "network error: {}", e),
            SendError::Timeout => write!(f, "request timed out"),
            SendError::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            SendError::Decode(e) => write!(f, "invalid JSON response: {}", e),
        }
    }
}

impl std::error::Error for SendError {}

pub fn build_client(timeout_secs: u64) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// POST `body` as JSON to `url`, retrying transient failures up to `max_retries` times.
pub async fn post_json_with_retry(
    client: &Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value, SendError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| SendError::Decode(e.to_string()));
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error, retry
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    last_err = Some(SendError::Status {
                        status,
                        body: body_text,
                    });
                    continue;
                }

                // Client error (not 429), don't retry
                return Err(SendError::Status {
                    status,
                    body: body_text,
                });
            }
            Err(e) if e.is_timeout() => {
                last_err = Some(SendError::Timeout);
            }
            Err(e) => {
                last_err = Some(SendError::Network(e));
            }
        }
    }

    Err(last_err.unwrap_or(SendError::Timeout))
}
