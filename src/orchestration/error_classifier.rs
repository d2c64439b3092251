//! # Publishing Error Classification
//!
//! Pure mapping from raw upload failures to [`PublishingError`] values.
//!
//! Uploaders report what went wrong in transport terms (an HTTP status, a
//! platform error code, a dropped connection, a failed local check) and this
//! module decides the failure class and whether it is worth retrying:
//!
//! | Raw failure                         | Kind              | Retryable |
//! |-------------------------------------|-------------------|-----------|
//! | HTTP 401                            | `TokenExpired`    | yes       |
//! | HTTP 429 / platform quota code      | `RateLimit`       | yes       |
//! | HTTP >= 500                         | `PlatformApi`     | yes       |
//! | other HTTP 4xx                      | `PlatformApi`     | no        |
//! | connection reset, timeout, DNS      | `Network`         | yes       |
//! | failed local pre-upload check       | `VideoValidation` | no        |
//!
//! ## Usage
//!
//! ```rust
//! use publishing_core::models::Platform;
//! use publishing_core::orchestration::error_classifier::classify_http_status;
//!
//! let error = classify_http_status(Platform::YouTube, 503, "backend unavailable", None);
//! assert!(error.is_retryable());
//! assert_eq!(error.status_code(), Some(503));
//! ```

use super::errors::PublishingError;
use crate::models::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Connection-level failure observed before any HTTP status was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFailure {
    ConnectionReset,
    ConnectionRefused,
    Timeout,
    DnsFailure,
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::Timeout => write!(f, "request timed out"),
            Self::DnsFailure => write!(f, "DNS lookup failed"),
        }
    }
}

/// Classify an HTTP error status returned by a platform API
pub fn classify_http_status(
    platform: Platform,
    status: u16,
    message: impl Into<String>,
    retry_after: Option<u64>,
) -> PublishingError {
    let message = message.into();
    match status {
        401 => PublishingError::token_expired(platform, message),
        429 => PublishingError::rate_limit(platform, message, retry_after),
        400..=u16::MAX => PublishingError::platform_api(platform, Some(status), message),
        // A success or redirect status is not a platform rejection
        _ => PublishingError::unknown(
            Some(platform),
            format!("unexpected HTTP status {status}: {message}"),
        ),
    }
}

/// Classify a connection-level failure
pub fn classify_network_failure(
    platform: Platform,
    failure: NetworkFailure,
    detail: Option<&str>,
) -> PublishingError {
    let message = match detail {
        Some(detail) => format!("{failure}: {detail}"),
        None => failure.to_string(),
    };
    PublishingError::network(platform, message)
}

/// Classify an I/O error raised by an HTTP client or socket
pub fn classify_io_error(platform: Platform, error: &io::Error) -> PublishingError {
    let failure = match error.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => Some(NetworkFailure::ConnectionReset),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotConnected => {
            Some(NetworkFailure::ConnectionRefused)
        }
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Some(NetworkFailure::Timeout),
        io::ErrorKind::AddrNotAvailable => Some(NetworkFailure::DnsFailure),
        _ => None,
    };

    match failure {
        Some(failure) => classify_network_failure(platform, failure, Some(&error.to_string())),
        None => PublishingError::unknown(Some(platform), error.to_string()),
    }
}

/// Platform-specific error codes that signal an exhausted quota
fn quota_codes(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::YouTube => &["quotaExceeded", "rateLimitExceeded", "userRateLimitExceeded"],
        // Graph API throttling codes shared by Facebook and Instagram
        Platform::Facebook | Platform::Instagram => &["4", "17", "32", "613"],
        Platform::TikTok => &["rate_limit_exceeded", "spam_risk_too_many_requests"],
    }
}

/// Map a platform error code to `RateLimit` when it is a known quota code.
///
/// Returns `None` for codes that are not quota related; the caller should then
/// fall back to [`classify_http_status`].
pub fn classify_platform_code(
    platform: Platform,
    code: &str,
    message: impl Into<String>,
    retry_after: Option<u64>,
) -> Option<PublishingError> {
    quota_codes(platform)
        .contains(&code)
        .then(|| PublishingError::rate_limit(platform, message, retry_after))
}

/// Failed local pre-upload check
pub fn validation_failure(platform: Platform, reason: impl Into<String>) -> PublishingError {
    PublishingError::video_validation(platform, reason)
}
