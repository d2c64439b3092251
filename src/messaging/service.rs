//! # Task Queue Service
//!
//! Provider-agnostic transport for publishing task references.
//!
//! Delivery is at-least-once. A message stays invisible to other consumers
//! for the visibility timeout after `receive`; if it is neither acked nor
//! nacked in that time it becomes visible again. `enqueue` with a delay is the
//! redelivery primitive the lifecycle manager uses for RETRYING tasks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::MessagingResult;
use super::message::PublishingTaskMessage;

/// Provider-specific handle used to ack or nack a received message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric form used by the in-memory queue and AMQP delivery tags
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReceiptHandle {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// A message received from the task queue
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub receipt_handle: ReceiptHandle,
    pub message: PublishingTaskMessage,
    /// Times this delivery has been handed to a consumer
    pub receive_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedMessage {
    pub fn new(
        receipt_handle: ReceiptHandle,
        message: PublishingTaskMessage,
        receive_count: u32,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            receipt_handle,
            message,
            receive_count,
            enqueued_at,
        }
    }
}

/// Point-in-time counts for the task queue and its satellites
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queue_name: String,
    /// Visible and waiting to be received
    pub pending: u64,
    /// Waiting out a redelivery delay
    pub delayed: u64,
    /// Received but not yet acked or nacked
    pub in_flight: u64,
    pub dead_lettered: u64,
    pub total_sent: u64,
    pub total_received: u64,
    pub total_acked: u64,
    pub total_nacked: u64,
}

impl QueueStats {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ..Default::default()
        }
    }

    /// Messages that still need a consumer
    pub fn outstanding(&self) -> u64 {
        self.pending + self.delayed + self.in_flight
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync + 'static {
    /// Send a task reference, optionally held back for `delay`
    async fn enqueue(
        &self,
        message: &PublishingTaskMessage,
        delay: Option<Duration>,
    ) -> MessagingResult<()>;

    /// Send several task references with no delay
    async fn enqueue_batch(&self, messages: &[PublishingTaskMessage]) -> MessagingResult<()> {
        for message in messages {
            self.enqueue(message, None).await?;
        }
        Ok(())
    }

    /// Receive up to `max_messages` visible messages
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<QueuedMessage>>;

    /// Remove a processed message
    async fn ack(&self, receipt_handle: &ReceiptHandle) -> MessagingResult<()>;

    /// Return a message to the queue, or dead-letter it when `requeue` is false
    async fn nack(&self, receipt_handle: &ReceiptHandle, requeue: bool) -> MessagingResult<()>;

    async fn stats(&self) -> MessagingResult<QueueStats>;

    /// Drop every message on the task and retry queues; returns the count
    async fn purge(&self) -> MessagingResult<u64>;

    async fn health_check(&self) -> MessagingResult<bool>;

    fn provider_name(&self) -> &'static str;
}
