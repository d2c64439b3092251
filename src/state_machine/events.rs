use serde::{Deserialize, Serialize};

/// Events that can trigger publishing task state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// A delivered task reference starts an upload cycle
    Start,
    /// The rate limiter denied the upload gate
    RateLimited(String),
    /// Upload succeeded with the platform post id
    Publish(String),
    /// Upload failed with a retryable error and cycles remain
    Retry(String),
    /// Permanent failure
    Fail(String),
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::RateLimited(_) => "rate_limited",
            Self::Publish(_) => "publish",
            Self::Retry(_) => "retry",
            Self::Fail(_) => "fail",
        }
    }
}
