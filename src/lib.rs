#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, RabbitMQ in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Publishing Core
//!
//! Orchestration core for publishing one video to many social platforms.
//!
//! ## Overview
//!
//! A user submits a batch: one or more videos, each with the social accounts it
//! should go to. Every (video, account) pair becomes a publishing task under a
//! job. Tasks travel through a queue to workers, which upload through a
//! platform-specific uploader behind a rate limiter and a retry executor, and
//! record the outcome through a small state machine. A job's status is always
//! derived from its tasks.
//!
//! ## Module Organization
//!
//! - [`models`] - Videos, social accounts, jobs and tasks
//! - [`state_machine`] - Task status transitions and job status values
//! - [`database`] - Store trait with in-memory and PostgreSQL implementations
//! - [`messaging`] - Task queue trait with in-memory and RabbitMQ providers
//! - [`resilience`] - Rate limiter, retry executor and injectable clock
//! - [`uploaders`] - Platform uploader trait and video requirement checks
//! - [`registry`] - Platform to uploader dispatch
//! - [`orchestration`] - Batch intake, task lifecycle, job aggregation and error taxonomy
//! - [`worker`] - Queue-consuming loop
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use publishing_core::config::ConfigLoader;
//! use publishing_core::database::InMemoryPublishingStore;
//! use publishing_core::messaging::InMemoryTaskQueue;
//! use publishing_core::orchestration::TaskLifecycleManager;
//! use publishing_core::registry::UploaderRegistry;
//! use publishing_core::resilience::{RateLimiter, SystemClock};
//! use publishing_core::worker::PublishingWorker;
//! use std::sync::Arc;
//!
//! # async fn example(registry: UploaderRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! publishing_core::logging::init_structured_logging();
//! let environment = ConfigLoader::detect_environment();
//! let config = ConfigLoader::load_from_directory(std::path::Path::new("config"), &environment)?;
//! let clock = Arc::new(SystemClock);
//! let store = Arc::new(InMemoryPublishingStore::new());
//! let queue = Arc::new(InMemoryTaskQueue::new(clock.clone()));
//! let limiter = Arc::new(RateLimiter::with_budgets(config.rate_limit_budgets(), clock.clone()));
//!
//! let lifecycle = Arc::new(TaskLifecycleManager::new(
//!     store,
//!     Arc::new(registry),
//!     limiter,
//!     queue.clone(),
//!     clock,
//!     config.clone(),
//! ));
//! let worker = PublishingWorker::new(lifecycle, queue, config.queue.clone());
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//! let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });
//! shutdown_tx.send(())?;
//! handle.await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod resilience;
pub mod state_machine;
pub mod uploaders;
pub mod worker;

pub use config::{ConfigLoader, PublisherConfig};
pub use database::{InMemoryPublishingStore, PublishingStore, StoreError};
pub use error::{PublisherError, Result};
pub use messaging::{InMemoryTaskQueue, PublishingTaskMessage, TaskQueue};
pub use models::{Platform, PublishingJob, PublishingTask, SocialAccount, Video};
pub use orchestration::{
    BatchPublisher, JobAggregator, PublishingError, PublishingErrorKind, TaskLifecycleManager,
    TaskOutcome,
};
pub use registry::UploaderRegistry;
pub use resilience::{RateLimiter, RetryPolicy};
pub use state_machine::{JobStatus, TaskStatus};
pub use uploaders::{PlatformUploader, UploadContext, UploadResult};
pub use worker::PublishingWorker;
