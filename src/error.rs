//! Error types for the recipe data-access layer.

use std::fmt;

/// Result type for fetch and cache operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Failure modes of a single fetch against the recipe API.
///
/// The adapter surfaces the precise variant; `RetryPolicy` resolves only the
/// transient ones by retrying and passes everything else through unchanged.
/// The cache never swallows a `FetchError` - it is stored on the entry and
/// surfaced to subscribers as a `Failed` status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, DNS, or timeout failure before a response arrived.
    ///
    /// Transient: retried by `RetryPolicy`.
    Network(String),

    /// The server responded with a non-2xx status code.
    ///
    /// 5xx codes are treated as transient and retried; 4xx codes
    /// (including 404 for an absent recipe) fail immediately.
    HttpStatus(u16),

    /// The response body was not valid JSON, or decoded JSON that is not a
    /// semantically valid recipe list/record.
    ///
    /// Never transient: the same bytes will fail the same way on retry.
    Decode(String),
}

impl FetchError {
    /// Whether a retry has any chance of resolving this failure.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::HttpStatus(code) => *code >= 500,
            FetchError::Decode(_) => false,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "Network error: {}", msg),
            FetchError::HttpStatus(code) => write!(f, "HTTP status {}", code),
            FetchError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            FetchError::HttpStatus(status.as_u16())
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}
