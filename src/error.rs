//! Export error types and the closed failure taxonomy.
//!
//! Internal code propagates [`ExportError`]; the pipeline entry point maps
//! it to an [`ExportFailure`] carrying one of the closed [`ErrorCode`]
//! variants via [`classify`]. First matching rule wins, and cancellation
//! always takes priority over any other classification.

use chrono::DateTime;
use thiserror::Error;

/// Closed set of failure codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Aborted,
    RateLimited,
    Unauthorized,
    NotFound,
    Network,
    InvalidSelection,
    InvalidRequest,
    Unknown,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Aborted => "aborted",
            ErrorCode::RateLimited => "rateLimited",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotFound => "notFound",
            ErrorCode::Network => "network",
            ErrorCode::InvalidSelection => "invalidSelection",
            ErrorCode::InvalidRequest => "invalidRequest",
            ErrorCode::Unknown => "unknown",
        }
    }
}

/// Rate limit state parsed from GitHub response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    /// Remaining requests, from `x-ratelimit-remaining`.
    pub remaining: Option<u64>,
    /// Reset time as epoch seconds, from `x-ratelimit-reset`.
    pub reset: Option<i64>,
    /// Seconds to wait, from `retry-after`.
    pub retry_after: Option<u64>,
}

/// Errors raised while running an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The caller cancelled the export.
    #[error("Export was canceled.")]
    Aborted,

    /// A non-2xx response from the GitHub API.
    #[error("GitHub API error ({status} {status_text}): {message}")]
    Api {
        status: u16,
        status_text: String,
        message: String,
        rate_limit: RateLimitSnapshot,
    },

    /// The export request itself was malformed.
    #[error("{0}")]
    InvalidRequest(String),

    /// The requested marker range could not be applied.
    #[error("{0}")]
    InvalidSelection(String),

    /// A `Link: rel="next"` URL pointed outside the configured API origin
    /// or carried embedded credentials.
    #[error("Untrusted pagination origin: {0}")]
    UntrustedPaginationOrigin(String),

    /// A transport-level failure (DNS, TLS, connection reset, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl ExportError {
    /// Build the structured API error for a non-2xx response.
    #[must_use]
    pub fn api(
        status: u16,
        status_text: impl Into<String>,
        message: impl Into<String>,
        rate_limit: RateLimitSnapshot,
    ) -> Self {
        Self::Api {
            status,
            status_text: status_text.into(),
            message: message.into(),
            rate_limit,
        }
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// The failure half of an export result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub code: ErrorCode,
    pub message: String,
}

/// Map an [`ExportError`] onto the closed taxonomy.
///
/// Note: classifying every transport-level failure as `network` mirrors the
/// upstream behavior of treating fetch-layer type errors as network
/// failures. It is a best-effort mapping, not a guarantee that the cause
/// was the network.
#[must_use]
pub fn classify(error: &ExportError) -> ExportFailure {
    match error {
        ExportError::InvalidRequest(message) => ExportFailure {
            code: ErrorCode::InvalidRequest,
            message: message.clone(),
        },
        ExportError::InvalidSelection(message) => ExportFailure {
            code: ErrorCode::InvalidSelection,
            message: message.clone(),
        },
        ExportError::Aborted => ExportFailure {
            code: ErrorCode::Aborted,
            message: "Export was canceled.".to_string(),
        },
        ExportError::Api {
            status,
            message,
            rate_limit,
            ..
        } => classify_api(*status, message, rate_limit),
        ExportError::Network(_) => ExportFailure {
            code: ErrorCode::Network,
            message: "Network error while contacting GitHub API.".to_string(),
        },
        ExportError::UntrustedPaginationOrigin(_) => ExportFailure {
            code: ErrorCode::Unknown,
            message: error.to_string(),
        },
        ExportError::Other(message) => ExportFailure {
            code: ErrorCode::Unknown,
            message: if message.is_empty() {
                "Unexpected export error.".to_string()
            } else {
                message.clone()
            },
        },
    }
}

fn classify_api(status: u16, message: &str, rate_limit: &RateLimitSnapshot) -> ExportFailure {
    match status {
        401 => ExportFailure {
            code: ErrorCode::Unauthorized,
            message: "GitHub token is invalid or missing required permissions.".to_string(),
        },
        404 => ExportFailure {
            code: ErrorCode::NotFound,
            message: "Requested GitHub resource was not found.".to_string(),
        },
        429 => ExportFailure {
            code: ErrorCode::RateLimited,
            message: rate_limit_message(rate_limit),
        },
        // A 403 only counts as rate limiting with evidence of exhaustion.
        403 if rate_limit.remaining == Some(0) || rate_limit.retry_after.is_some_and(|s| s > 0) => {
            ExportFailure {
                code: ErrorCode::RateLimited,
                message: rate_limit_message(rate_limit),
            }
        }
        _ => ExportFailure {
            code: ErrorCode::Unknown,
            message: message.to_string(),
        },
    }
}

/// Rate limit message, preferring retry-after seconds, then the reset
/// timestamp, then a generic hint.
fn rate_limit_message(rate_limit: &RateLimitSnapshot) -> String {
    if let Some(seconds) = rate_limit.retry_after.filter(|s| *s > 0) {
        return format!("GitHub API rate limit exceeded. Retry after {seconds} second(s).");
    }
    if let Some(reset) = rate_limit.reset
        && let Some(at) = DateTime::from_timestamp(reset, 0)
    {
        return format!(
            "GitHub API rate limit exceeded. Limit resets at {}.",
            at.to_rfc3339()
        );
    }
    "GitHub API rate limit exceeded. Add a GitHub token to raise the limit.".to_string()
}
