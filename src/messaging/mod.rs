//! # Messaging Module
//!
//! Queue transport for publishing task references. The worker loop consumes
//! [`PublishingTaskMessage`]s through the [`TaskQueue`] trait; the lifecycle
//! manager uses the same trait to request delayed redelivery.

pub mod errors;
pub mod message;
pub mod providers;
pub mod service;

pub use errors::{MessagingError, MessagingResult};
pub use message::PublishingTaskMessage;
pub use providers::InMemoryTaskQueue;
#[cfg(feature = "rabbitmq")]
pub use providers::RabbitMqTaskQueue;
pub use service::{QueueStats, QueuedMessage, ReceiptHandle, TaskQueue};
