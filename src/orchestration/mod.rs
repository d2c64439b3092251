//! # Orchestration
//!
//! The publishing pipeline above the store and the queue.
//!
//! ## Core Components
//!
//! - **BatchPublisher**: validates a batch request, creates jobs with PENDING
//!   tasks and enqueues a reference per task
//! - **TaskLifecycleManager**: runs one processing cycle for a task (rate
//!   gate, validation, upload with retry, transition, redelivery)
//! - **JobAggregator**: derives a job's status from its tasks after every
//!   task transition
//! - **Error classification**: maps raw platform failures onto
//!   [`PublishingError`] kinds with retryability and a suggested delay

pub mod batch_publisher;
pub mod error_classifier;
pub mod errors;
pub mod job_aggregator;
pub mod task_lifecycle;

pub use batch_publisher::{
    BatchError, BatchJobItem, BatchPublishRequest, BatchPublisher, BatchResult, BatchTarget,
    CreatedJob,
};
pub use errors::{LifecycleError, PublishingError, PublishingErrorKind};
pub use job_aggregator::{compute_job_status, JobAggregator, TaskStatusCounts};
pub use task_lifecycle::{TaskLifecycleManager, TaskOutcome};
