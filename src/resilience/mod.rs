//! # Resilience Module
//!
//! Fault tolerance primitives used around every platform upload.
//!
//! ## Architecture
//!
//! - **Rate Limiter**: per-(platform, operation) request budgets checked before a call
//! - **Retry Executor**: exponential backoff for retryable failures within one call sequence
//! - **Clock**: injectable time source so both are testable without real delays
//!
//! ## Usage
//!
//! ```rust,no_run
//! use publishing_core::models::Platform;
//! use publishing_core::resilience::{RateLimiter, SystemClock};
//! use std::sync::Arc;
//!
//! let limiter = RateLimiter::new(Arc::new(SystemClock));
//! limiter.check_and_consume(Platform::TikTok, "upload")?;
//! # Ok::<(), publishing_core::orchestration::errors::PublishingError>(())
//! ```

pub mod clock;
pub mod rate_limiter;
pub mod retry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limiter::{RateLimitBudget, RateLimitUsage, RateLimitWindow, RateLimiter};
pub use retry::{with_retry, RetryContext, RetryPolicy};
