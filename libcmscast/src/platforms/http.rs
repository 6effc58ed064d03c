//! HTTP plumbing shared by the REST-based platform clients

use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::error::{ConfigError, PlatformError, Result};
use crate::platforms::PlatformResult;

const MAX_ERROR_BODY_CHARS: usize = 300;

pub(crate) fn build_client(platform: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("cmscast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            ConfigError::InvalidValue {
                field: format!("{}.request_timeout", platform),
                reason: format!("could not build HTTP client: {}", e),
            }
            .into()
        })
}

/// Map a failed request (no HTTP response) to a platform error
pub(crate) fn map_transport_error(platform: &str, context: &str, error: reqwest::Error) -> PlatformError {
    if error.is_timeout() {
        PlatformError::Timeout(format!("{} {} timed out: {}", platform, context, error))
    } else if error.is_connect() {
        PlatformError::Network(format!(
            "Could not connect to {} during {}: {}",
            platform, context, error
        ))
    } else if error.is_decode() {
        PlatformError::Posting(format!(
            "{} returned an unreadable response during {}: {}",
            platform, context, error
        ))
    } else {
        PlatformError::Network(format!("{} {} failed: {}", platform, context, error))
    }
}

/// Map a non-success HTTP response to a platform error.
///
/// `message` is the platform's own explanation when the body carried one.
pub(crate) fn map_status_error(
    platform: &str,
    context: &str,
    status: StatusCode,
    message: String,
    details: Option<Value>,
) -> PlatformError {
    match status.as_u16() {
        401 | 403 => PlatformError::Authentication(format!(
            "{} rejected the credentials during {} (HTTP {}): {}. \
             Suggestion: reconnect the account to obtain a fresh access token.",
            platform,
            context,
            status.as_u16(),
            message
        )),
        429 => PlatformError::RateLimit(format!(
            "{} rate limit exceeded during {}: {}",
            platform, context, message
        )),
        code => PlatformError::Api {
            status: code,
            message: format!("{} {} failed: {}", platform, context, message),
            details,
        },
    }
}

/// Successful response body and headers
pub(crate) struct ApiResponse {
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// Read a response, turning HTTP failures into errors via `on_error`.
///
/// Success bodies that are empty or not JSON yield `body: None`.
pub(crate) async fn read_response(
    platform: &str,
    context: &str,
    response: Response,
    on_error: impl Fn(StatusCode, Option<&Value>, &str) -> PlatformError,
) -> PlatformResult<ApiResponse> {
    let status = response.status();
    let headers = response.headers().clone();
    let text = response
        .text()
        .await
        .map_err(|e| map_transport_error(platform, context, e))?;
    let body: Option<Value> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        return Err(on_error(status, body.as_ref(), &text));
    }

    Ok(ApiResponse { headers, body })
}

/// Best-effort human message from an error body
pub(crate) fn body_message(body: Option<&Value>, raw: &str, pointers: &[&str]) -> String {
    body.and_then(|b| {
        pointers
            .iter()
            .find_map(|p| b.pointer(p).and_then(Value::as_str))
    })
    .map(str::to_string)
    .unwrap_or_else(|| {
        let raw = raw.trim();
        if raw.is_empty() {
            "no response body".to_string()
        } else {
            raw.chars().take(MAX_ERROR_BODY_CHARS).collect()
        }
    })
}
