//! # Orchestration Error Types
//!
//! Two families of errors live here:
//!
//! - [`PublishingError`]: the normalized upload failure taxonomy. Every
//!   failure coming out of an uploader or the retry executor is one of these,
//!   and the lifecycle manager turns it into a persisted task state.
//! - [`LifecycleError`]: infrastructure failures (store, queue, state machine)
//!   that prevent the lifecycle manager from recording an outcome at all.

use crate::database::StoreError;
use crate::messaging::MessagingError;
use crate::models::Platform;
use crate::state_machine::StateMachineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Stable error codes carried by [`PublishingError::code`]
pub mod codes {
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const VIDEO_VALIDATION_FAILED: &str = "VIDEO_VALIDATION_FAILED";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const PLATFORM_API_ERROR: &str = "PLATFORM_API_ERROR";
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
}

/// Failure class with kind-specific data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishingErrorKind {
    RateLimit {
        /// Seconds until the budget frees up, when known
        retry_after: Option<u64>,
    },
    TokenExpired,
    VideoValidation,
    Network,
    PlatformApi {
        status_code: Option<u16>,
    },
    Unknown,
}

impl PublishingErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimit { .. } => codes::RATE_LIMIT_EXCEEDED,
            Self::TokenExpired => codes::TOKEN_EXPIRED,
            Self::VideoValidation => codes::VIDEO_VALIDATION_FAILED,
            Self::Network => codes::NETWORK_ERROR,
            Self::PlatformApi { .. } => codes::PLATFORM_API_ERROR,
            Self::Unknown => codes::UNKNOWN_ERROR,
        }
    }
}

/// Normalized publishing failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishingError {
    pub kind: PublishingErrorKind,
    pub platform: Option<Platform>,
    pub retryable: bool,
    pub message: String,
}

impl fmt::Display for PublishingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.platform {
            Some(platform) => write!(f, "[{platform}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for PublishingError {}

impl PublishingError {
    fn build(
        kind: PublishingErrorKind,
        platform: Platform,
        retryable: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            platform: Some(platform),
            retryable,
            message: message.into(),
        }
    }

    pub fn rate_limit(
        platform: Platform,
        message: impl Into<String>,
        retry_after: Option<u64>,
    ) -> Self {
        Self::build(
            PublishingErrorKind::RateLimit { retry_after },
            platform,
            true,
            message,
        )
    }

    pub fn token_expired(platform: Platform, message: impl Into<String>) -> Self {
        Self::build(PublishingErrorKind::TokenExpired, platform, true, message)
    }

    pub fn video_validation(platform: Platform, message: impl Into<String>) -> Self {
        Self::build(PublishingErrorKind::VideoValidation, platform, false, message)
    }

    pub fn network(platform: Platform, message: impl Into<String>) -> Self {
        Self::build(PublishingErrorKind::Network, platform, true, message)
    }

    /// Platform API error; retryable for 5xx and 429, or when no status is known
    pub fn platform_api(
        platform: Platform,
        status_code: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        let retryable = status_code.map_or(true, |status| status >= 500 || status == 429);
        Self::build(
            PublishingErrorKind::PlatformApi { status_code },
            platform,
            retryable,
            message,
        )
    }

    pub fn unknown(platform: Option<Platform>, message: impl Into<String>) -> Self {
        Self {
            kind: PublishingErrorKind::Unknown,
            platform,
            retryable: false,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self.kind {
            PublishingErrorKind::RateLimit { retry_after } => retry_after,
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            PublishingErrorKind::PlatformApi { status_code } => status_code,
            _ => None,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self.kind, PublishingErrorKind::RateLimit { .. })
    }

    /// Normalize any error convertible into the taxonomy
    pub fn from_source<E: Into<PublishingError>>(error: E) -> Self {
        error.into()
    }

    /// Fill in the platform when the error was raised without one
    pub fn or_platform(mut self, platform: Platform) -> Self {
        if self.platform.is_none() {
            self.platform = Some(platform);
        }
        self
    }
}

impl From<anyhow::Error> for PublishingError {
    /// Errors that already are a `PublishingError` pass through; anything
    /// else becomes a non-retryable `Unknown`.
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<PublishingError>() {
            Ok(publishing) => publishing,
            Err(other) => PublishingError::unknown(None, format!("{other:#}")),
        }
    }
}

/// Infrastructure failures inside the task lifecycle manager
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
