//! reqwest-backed transport

use crate::request::{Method, Transport, TransportRequest};
use async_trait::async_trait;
use quarry_core::{ApiKey, ConfigError, QuarryConfig, TransportError};
use reqwest::Client;
use serde_json::Value;

/// HTTP transport with bearer authentication.
///
/// Performs exactly one request per call. Non-success statuses become
/// [`TransportError::Status`] with the best message the body offers.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl HttpTransport {
    pub fn new(config: &QuarryConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()
            .map_err(|e| ConfigError::ClientBuild {
                reason: e.to_string(),
            })?;

        if !config.ssl_verify {
            tracing::warn!(base_url = %config.base_url(), "TLS certificate verification disabled");
        }

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn call(&self, request: TransportRequest) -> Result<Value, TransportError> {
        let url = self.url(&request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };

        let mut builder = builder
            .bearer_auth(self.api_key.expose())
            .header(reqwest::header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out: {}", e)
            } else {
                format!("HTTP request failed: {}", e)
            };
            tracing::warn!(error = %message, "transport failure");
            request.network_error(message)
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| request.network_error(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            tracing::warn!(status = status.as_u16(), error = %message, "remote service rejected call");
            return Err(request.status_error(status.as_u16(), message));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| request.invalid_response(format!("Failed to parse response: {}", e)))
    }
}

/// Extract a human-readable message from an error body.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => json
            .get("message")
            .or_else(|| json.get("error").and_then(|e| e.get("message")))
            .or_else(|| json.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
