//! # In-Memory Task Queue
//!
//! Process-local [`TaskQueue`] for tests and single-process runs.
//!
//! ## Features
//!
//! - **Delayed delivery**: `enqueue(.., Some(delay))` hides a message until
//!   the injected clock passes its due time
//! - **Visibility timeout**: received messages reappear if not acked in time
//! - **Dead letters**: `nack(.., false)` moves the message aside where tests
//!   can inspect it

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::constants::queues;
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::message::PublishingTaskMessage;
use crate::messaging::service::{QueueStats, QueuedMessage, ReceiptHandle, TaskQueue};
use crate::resilience::clock::to_chrono;
use crate::resilience::{Clock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    Ready,
    Delayed(DateTime<Utc>),
    InFlight(DateTime<Utc>),
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: u64,
    message: PublishingTaskMessage,
    enqueued_at: DateTime<Utc>,
    visibility: Visibility,
    receive_count: u32,
}

impl StoredMessage {
    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        match self.visibility {
            Visibility::Ready => true,
            Visibility::Delayed(at) | Visibility::InFlight(at) => at <= now,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<StoredMessage>,
    dead_letters: Vec<StoredMessage>,
}

#[derive(Debug)]
pub struct InMemoryTaskQueue {
    queue_name: String,
    state: RwLock<QueueState>,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    total_sent: AtomicU64,
    total_received: AtomicU64,
    total_acked: AtomicU64,
    total_nacked: AtomicU64,
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryTaskQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            queue_name: queues::TASK_QUEUE.to_string(),
            state: RwLock::new(QueueState::default()),
            clock,
            next_id: AtomicU64::new(1),
            total_sent: AtomicU64::new(0),
            total_received: AtomicU64::new(0),
            total_acked: AtomicU64::new(0),
            total_nacked: AtomicU64::new(0),
        }
    }

    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    /// Messages still held by the queue, in FIFO order
    pub async fn messages(&self) -> Vec<PublishingTaskMessage> {
        let state = self.state.read().await;
        state.messages.iter().map(|m| m.message.clone()).collect()
    }

    pub async fn dead_letters(&self) -> Vec<PublishingTaskMessage> {
        let state = self.state.read().await;
        state.dead_letters.iter().map(|m| m.message.clone()).collect()
    }

    /// Due time of every message still waiting out a delay
    pub async fn delayed_until(&self) -> Vec<DateTime<Utc>> {
        let state = self.state.read().await;
        state
            .messages
            .iter()
            .filter_map(|m| match m.visibility {
                Visibility::Delayed(at) => Some(at),
                _ => None,
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn parse_handle(receipt_handle: &ReceiptHandle) -> MessagingResult<u64> {
        receipt_handle
            .as_u64()
            .ok_or_else(|| MessagingError::invalid_receipt_handle(receipt_handle.as_str()))
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(
        &self,
        message: &PublishingTaskMessage,
        delay: Option<Duration>,
    ) -> MessagingResult<()> {
        let now = self.clock.now();
        let visibility = match delay {
            Some(delay) if !delay.is_zero() => Visibility::Delayed(now + to_chrono(delay)),
            _ => Visibility::Ready,
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.write().await;
        state.messages.push_back(StoredMessage {
            id,
            message: message.clone(),
            enqueued_at: now,
            visibility,
            receive_count: 0,
        });
        self.total_sent.fetch_add(1, Ordering::Relaxed);

        debug!(
            queue = %self.queue_name,
            task_id = %message.task_id,
            delay_ms = delay.map(|d| d.as_millis() as u64).unwrap_or(0),
            "📤 Enqueued task message"
        );
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<QueuedMessage>> {
        let now = self.clock.now();
        let visible_until = now + to_chrono(visibility_timeout);
        let mut received = Vec::new();

        let mut state = self.state.write().await;
        for stored in state.messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }
            if !stored.is_visible(now) {
                continue;
            }

            stored.visibility = Visibility::InFlight(visible_until);
            stored.receive_count += 1;
            self.total_received.fetch_add(1, Ordering::Relaxed);

            received.push(QueuedMessage::new(
                ReceiptHandle::from(stored.id),
                stored.message.clone(),
                stored.receive_count,
                stored.enqueued_at,
            ));
        }

        Ok(received)
    }

    async fn ack(&self, receipt_handle: &ReceiptHandle) -> MessagingResult<()> {
        let id = Self::parse_handle(receipt_handle)?;

        let mut state = self.state.write().await;
        let position = state
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| MessagingError::message_not_found(receipt_handle.as_str()))?;
        state.messages.remove(position);
        self.total_acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(&self, receipt_handle: &ReceiptHandle, requeue: bool) -> MessagingResult<()> {
        let id = Self::parse_handle(receipt_handle)?;

        let mut state = self.state.write().await;
        let position = state
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| MessagingError::message_not_found(receipt_handle.as_str()))?;

        if requeue {
            if let Some(stored) = state.messages.get_mut(position) {
                stored.visibility = Visibility::Ready;
            }
        } else if let Some(stored) = state.messages.remove(position) {
            state.dead_letters.push(stored);
        }
        self.total_nacked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stats(&self) -> MessagingResult<QueueStats> {
        let now = self.clock.now();
        let state = self.state.read().await;

        let mut stats = QueueStats::new(self.queue_name.clone());
        for stored in &state.messages {
            match stored.visibility {
                _ if stored.is_visible(now) => stats.pending += 1,
                Visibility::Delayed(_) => stats.delayed += 1,
                Visibility::InFlight(_) => stats.in_flight += 1,
                Visibility::Ready => stats.pending += 1,
            }
        }
        stats.dead_lettered = state.dead_letters.len() as u64;
        stats.total_sent = self.total_sent.load(Ordering::Relaxed);
        stats.total_received = self.total_received.load(Ordering::Relaxed);
        stats.total_acked = self.total_acked.load(Ordering::Relaxed);
        stats.total_nacked = self.total_nacked.load(Ordering::Relaxed);
        Ok(stats)
    }

    async fn purge(&self) -> MessagingResult<u64> {
        let mut state = self.state.write().await;
        let purged = state.messages.len() as u64;
        state.messages.clear();
        Ok(purged)
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ManualClock;
    use uuid::Uuid;

    fn message() -> PublishingTaskMessage {
        PublishingTaskMessage {
            task_id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            social_account_id: Uuid::new_v4(),
            custom_title: None,
            custom_description: None,
            attempts: 0,
        }
    }

    fn queue() -> (Arc<ManualClock>, InMemoryTaskQueue) {
        let clock = Arc::new(ManualClock::default());
        let queue = InMemoryTaskQueue::new(clock.clone());
        (clock, queue)
    }

    #[tokio::test]
    async fn test_receive_then_ack() {
        let (_clock, queue) = queue();
        let msg = message();
        queue.enqueue(&msg, None).await.unwrap();

        let received = queue.receive(10, Duration::from_secs(30)).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message, msg);
        assert_eq!(received[0].receive_count, 1);

        // In flight: not handed out twice
        assert!(queue.receive(10, Duration::from_secs(30)).await.unwrap().is_empty());

        queue.ack(&received[0].receipt_handle).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_delayed_message_waits_for_clock() {
        let (clock, queue) = queue();
        queue
            .enqueue(&message(), Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert!(queue.receive(1, Duration::from_secs(5)).await.unwrap().is_empty());
        assert_eq!(queue.stats().await.unwrap().delayed, 1);

        clock.advance(Duration::from_secs(30));
        assert_eq!(queue.receive(1, Duration::from_secs(5)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_visibility_timeout_redelivers() {
        let (clock, queue) = queue();
        queue.enqueue(&message(), None).await.unwrap();

        queue.receive(1, Duration::from_secs(10)).await.unwrap();
        clock.advance(Duration::from_secs(11));

        let again = queue.receive(1, Duration::from_secs(10)).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].receive_count, 2);
    }

    #[tokio::test]
    async fn test_nack_without_requeue_dead_letters() {
        let (_clock, queue) = queue();
        let msg = message();
        queue.enqueue(&msg, None).await.unwrap();
        let received = queue.receive(1, Duration::from_secs(10)).await.unwrap();

        queue.nack(&received[0].receipt_handle, false).await.unwrap();

        assert!(queue.is_empty().await);
        assert_eq!(queue.dead_letters().await, vec![msg]);
        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.dead_lettered, 1);
        assert_eq!(stats.total_nacked, 1);
    }

    #[tokio::test]
    async fn test_nack_with_requeue_is_visible_again() {
        let (_clock, queue) = queue();
        queue.enqueue(&message(), None).await.unwrap();
        let received = queue.receive(1, Duration::from_secs(60)).await.unwrap();

        queue.nack(&received[0].receipt_handle, true).await.unwrap();
        assert_eq!(queue.receive(1, Duration::from_secs(60)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_receipt_is_an_error() {
        let (_clock, queue) = queue();
        let err = queue.ack(&ReceiptHandle::new("not-a-number")).await.unwrap_err();
        assert!(matches!(err, MessagingError::InvalidReceiptHandle { .. }));

        let err = queue.ack(&ReceiptHandle::from(42)).await.unwrap_err();
        assert!(matches!(err, MessagingError::MessageNotFound { .. }));
    }

    #[tokio::test]
    async fn test_purge_counts_messages() {
        let (_clock, queue) = queue();
        queue.enqueue_batch(&[message(), message()]).await.unwrap();
        assert_eq!(queue.purge().await.unwrap(), 2);
        assert_eq!(queue.stats().await.unwrap().outstanding(), 0);
    }
}
