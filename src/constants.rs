//! # System Constants
//!
//! Built-in defaults that define the operational boundaries of the publishing
//! core. Every value here can be overridden through [`crate::config`].

/// Default request budgets as `(max_requests, window_seconds)`
pub mod rate_limits {
    pub const YOUTUBE: (u32, u64) = (10_000, 24 * 60 * 60);
    pub const FACEBOOK: (u32, u64) = (200, 60 * 60);
    pub const INSTAGRAM: (u32, u64) = (200, 60 * 60);
    pub const TIKTOK: (u32, u64) = (100, 60 * 60);

    /// Operation name used when a caller does not supply one
    pub const DEFAULT_OPERATION: &str = "default";
    /// Operation name the lifecycle manager gates uploads under
    pub const UPLOAD_OPERATION: &str = "upload";
}

/// Default per-call retry policy
pub mod retry_defaults {
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BASE_DELAY_MS: u64 = 1_000;
    pub const MAX_DELAY_MS: u64 = 30_000;
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
}

/// Task lifecycle limits
pub mod lifecycle {
    /// Processing cycles before a retryable failure becomes permanent
    pub const MAX_REDELIVERY_CYCLES: u32 = 3;
    /// Delay before a RETRYING task is redelivered
    pub const REDELIVERY_DELAY_SECONDS: u64 = 30;
    /// Compare-and-set rounds a job status recompute makes before giving up
    pub const JOB_STATUS_WRITE_ATTEMPTS: u32 = 5;
}

/// Queue names and consumer defaults
pub mod queues {
    pub const TASK_QUEUE: &str = "video-publish-tasks-queue";
    pub const RETRY_QUEUE: &str = "video-publish-retry-queue";
    pub const DEAD_LETTER_QUEUE: &str = "video-publish-tasks-dlq";

    pub const BATCH_SIZE: usize = 10;
    pub const VISIBILITY_TIMEOUT_SECONDS: u64 = 300;
    pub const POLL_INTERVAL_MS: u64 = 1_000;
}

/// Lifecycle event names used in structured logs
pub mod events {
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_PUBLISHED: &str = "task.published";
    pub const TASK_RETRY_SCHEDULED: &str = "task.retry_scheduled";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_SKIPPED: &str = "task.skipped";
    pub const JOB_STATUS_CHANGED: &str = "job.status_changed";
    pub const JOB_CREATED: &str = "job.created";
}
