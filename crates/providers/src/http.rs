//! Shared HTTP plumbing for the protocol adapters.
//!
//! Every adapter posts a JSON body and maps the status code onto the same
//! [`ProviderError`] taxonomy; only headers and URLs differ.

use deputy_core::error::ProviderError;
use tracing::warn;

/// Fallback wait when a 429 carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Build the shared HTTP client.
pub(crate) fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to configure HTTP client, using defaults: {e}");
            reqwest::Client::new()
        })
}

/// POST a JSON body and return the decoded JSON response.
pub(crate) async fn post_json(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value, ProviderError> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(format!(
            "{provider}: invalid API key or insufficient permissions"
        )));
    }

    if !(200..300).contains(&status) {
        let error_body = response.text().await.unwrap_or_default();
        warn!(provider, status, body = %error_body, "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("{provider}: {e}")))
}

/// Parse a tool-argument string the way every protocol needs it: empty means
/// an empty object, anything else must be valid JSON.
pub(crate) fn parse_arguments(raw: &str) -> Result<serde_json::Value, String> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw).map_err(|e| e.to_string())
}
