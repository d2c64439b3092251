//! Task queue providers.

pub mod in_memory;
#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;

pub use in_memory::InMemoryTaskQueue;
#[cfg(feature = "rabbitmq")]
pub use rabbitmq::RabbitMqTaskQueue;
