//! Error types for image restyling.

use std::path::PathBuf;
use std::time::Duration;

/// Longest API error message kept verbatim.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while restyling an image.
#[derive(Debug, thiserror::Error)]
pub enum RestylerError {
    /// Required configuration is missing (e.g. API key).
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested source image does not exist.
    #[error("image '{name}' not found in '{}' directory", .dir.display())]
    SourceNotFound { name: String, dir: PathBuf },

    /// API key rejected (401/403).
    #[error("authentication failed: {status} - {message}")]
    Auth { status: u16, message: String },

    /// Account has no credits left (402).
    #[error("billing error: {status} - {message}")]
    Billing { status: u16, message: String },

    /// Rate limit exceeded (429).
    #[error("rate limited: {status} - {message}{}", retry_hint(.retry_after))]
    RateLimited {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (reading the prompt, writing the result, deleting the source).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(delay) => format!(" (retry after {}s)", delay.as_secs()),
        None => String::new(),
    }
}

/// Result type alias for restyling operations.
pub type Result<T> = std::result::Result<T, RestylerError>;

/// Reduces an error response body to a short human-readable message.
///
/// Prefers `error.message` from an OpenAI-style error envelope and falls back
/// to the trimmed raw body.
pub(crate) fn sanitize_error_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    if message.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = message.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        message
    }
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
