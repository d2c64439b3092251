//! # RabbitMQ Task Queue
//!
//! [`TaskQueue`] over AMQP 0.9.1 using `lapin`.
//!
//! ## Topology
//!
//! - **Task queue**: durable; rejected messages dead-letter to the DLQ
//! - **Retry queue**: durable, no consumers; each delayed message carries a
//!   per-message `expiration` and dead-letters back to the task queue when it
//!   expires
//! - **Dead-letter queue**: durable sink for messages nacked without requeue
//!
//! All three are bound through the default exchange, so routing keys are
//! queue names.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lapin::options::{
    BasicAckOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions, QueuePurgeOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::message::PublishingTaskMessage;
use crate::messaging::service::{QueueStats, QueuedMessage, ReceiptHandle, TaskQueue};

fn amqp_error(
    queue: &str,
    operation: &'static str,
) -> impl FnOnce(lapin::Error) -> MessagingError + '_ {
    move |e| MessagingError::queue_operation(queue, operation, e.to_string())
}

#[derive(Debug, Default)]
struct QueueCounters {
    total_sent: AtomicU64,
    total_received: AtomicU64,
    total_acked: AtomicU64,
    total_nacked: AtomicU64,
}

#[derive(Debug)]
pub struct RabbitMqTaskQueue {
    connection: Connection,
    channel: Channel,
    config: QueueConfig,
    counters: QueueCounters,
}

impl RabbitMqTaskQueue {
    /// Connect and declare the task, retry and dead-letter queues
    pub async fn connect(config: &QueueConfig) -> MessagingResult<Self> {
        let connection = Connection::connect(
            &config.url,
            ConnectionProperties::default().with_connection_name("publishing-core".into()),
        )
        .await
        .map_err(|e| MessagingError::connection(format!("RabbitMQ connection failed: {e}")))?;

        let channel = connection.create_channel().await.map_err(|e| {
            MessagingError::connection(format!("RabbitMQ channel creation failed: {e}"))
        })?;

        let prefetch = u16::try_from(config.batch_size).unwrap_or(u16::MAX);
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| {
                MessagingError::configuration("rabbitmq", format!("Failed to set QoS: {e}"))
            })?;

        let queue = Self {
            connection,
            channel,
            config: config.clone(),
            counters: QueueCounters::default(),
        };
        queue.declare_topology().await?;

        info!(
            task_queue = %queue.config.task_queue,
            retry_queue = %queue.config.retry_queue,
            dead_letter_queue = %queue.config.dead_letter_queue,
            "🐰 RabbitMQ task queue ready"
        );
        Ok(queue)
    }

    async fn declare_topology(&self) -> MessagingResult<()> {
        self.declare(&self.config.dead_letter_queue, FieldTable::default())
            .await?;
        self.declare(
            &self.config.task_queue,
            dead_letter_args(&self.config.dead_letter_queue),
        )
        .await?;
        self.declare(
            &self.config.retry_queue,
            dead_letter_args(&self.config.task_queue),
        )
        .await?;
        Ok(())
    }

    async fn declare(&self, queue_name: &str, args: FieldTable) -> MessagingResult<()> {
        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                args,
            )
            .await
            .map_err(amqp_error(queue_name, "declare"))?;
        Ok(())
    }

    async fn message_count(&self, queue_name: &str) -> MessagingResult<u64> {
        let state = self
            .channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(amqp_error(queue_name, "stats"))?;
        Ok(u64::from(state.message_count()))
    }

    fn delivery_tag(receipt_handle: &ReceiptHandle) -> MessagingResult<u64> {
        receipt_handle
            .as_u64()
            .ok_or_else(|| MessagingError::invalid_receipt_handle(receipt_handle.as_str()))
    }
}

/// Dead-letter through the default exchange to `target`
fn dead_letter_args(target: &str) -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString("".into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(target.into()),
    );
    args
}

#[async_trait]
impl TaskQueue for RabbitMqTaskQueue {
    async fn enqueue(
        &self,
        message: &PublishingTaskMessage,
        delay: Option<Duration>,
    ) -> MessagingResult<()> {
        let bytes = message.to_bytes()?;
        let mut properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_content_type("application/json".into());

        let queue_name = match delay {
            Some(delay) if !delay.is_zero() => {
                properties = properties.with_expiration(delay.as_millis().to_string().into());
                &self.config.retry_queue
            }
            _ => &self.config.task_queue,
        };

        let confirm = self
            .channel
            .basic_publish(
                "",
                queue_name,
                BasicPublishOptions::default(),
                &bytes,
                properties,
            )
            .await
            .map_err(amqp_error(queue_name, "publish"))?;
        confirm
            .await
            .map_err(amqp_error(queue_name, "confirm"))?;

        self.counters.total_sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            queue = %queue_name,
            task_id = %message.task_id,
            delay_ms = delay.map(|d| d.as_millis() as u64).unwrap_or(0),
            "📤 Published task message"
        );
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        _visibility_timeout: Duration,
    ) -> MessagingResult<Vec<QueuedMessage>> {
        // Unacked deliveries stay invisible until the channel closes; there is
        // no broker-side visibility timeout to apply.
        let queue_name = &self.config.task_queue;
        let mut received = Vec::with_capacity(max_messages);

        for _ in 0..max_messages {
            let next = self
                .channel
                .basic_get(queue_name, BasicGetOptions { no_ack: false })
                .await
                .map_err(amqp_error(queue_name, "get"))?;

            let Some(get) = next else {
                break;
            };
            let delivery = get.delivery;
            let tag = delivery.delivery_tag;

            match PublishingTaskMessage::from_bytes(&delivery.data) {
                Ok(message) => {
                    let receive_count = if delivery.redelivered { 2 } else { 1 };
                    received.push(QueuedMessage::new(
                        ReceiptHandle::from(tag),
                        message,
                        receive_count,
                        Utc::now(),
                    ));
                }
                Err(e) => {
                    warn!(
                        queue = %queue_name,
                        delivery_tag = tag,
                        error = %e,
                        "❌ Dead-lettering undecodable message"
                    );
                    self.channel
                        .basic_nack(tag, BasicNackOptions { multiple: false, requeue: false })
                        .await
                        .map_err(amqp_error(queue_name, "nack"))?;
                    self.counters.total_nacked.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        self.counters
            .total_received
            .fetch_add(received.len() as u64, Ordering::Relaxed);
        Ok(received)
    }

    async fn ack(&self, receipt_handle: &ReceiptHandle) -> MessagingResult<()> {
        let tag = Self::delivery_tag(receipt_handle)?;
        self.channel
            .basic_ack(tag, BasicAckOptions::default())
            .await
            .map_err(amqp_error(&self.config.task_queue, "ack"))?;
        self.counters.total_acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(&self, receipt_handle: &ReceiptHandle, requeue: bool) -> MessagingResult<()> {
        let tag = Self::delivery_tag(receipt_handle)?;
        self.channel
            .basic_nack(tag, BasicNackOptions { multiple: false, requeue })
            .await
            .map_err(amqp_error(&self.config.task_queue, "nack"))?;
        self.counters.total_nacked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stats(&self) -> MessagingResult<QueueStats> {
        let mut stats = QueueStats::new(self.config.task_queue.clone());
        stats.pending = self.message_count(&self.config.task_queue).await?;
        stats.delayed = self.message_count(&self.config.retry_queue).await?;
        stats.dead_lettered = self.message_count(&self.config.dead_letter_queue).await?;

        stats.total_sent = self.counters.total_sent.load(Ordering::Relaxed);
        stats.total_received = self.counters.total_received.load(Ordering::Relaxed);
        stats.total_acked = self.counters.total_acked.load(Ordering::Relaxed);
        stats.total_nacked = self.counters.total_nacked.load(Ordering::Relaxed);
        stats.in_flight = stats
            .total_received
            .saturating_sub(stats.total_acked + stats.total_nacked);
        Ok(stats)
    }

    async fn purge(&self) -> MessagingResult<u64> {
        let mut purged = 0u64;
        for queue_name in [&self.config.task_queue, &self.config.retry_queue] {
            let count = self
                .channel
                .queue_purge(queue_name, QueuePurgeOptions::default())
                .await
                .map_err(amqp_error(queue_name, "purge"))?;
            purged += u64::from(count);
        }
        Ok(purged)
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        Ok(self.connection.status().connected() && self.channel.status().connected())
    }

    fn provider_name(&self) -> &'static str {
        "rabbitmq"
    }
}
