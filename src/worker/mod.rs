//! # Worker
//!
//! The queue-consuming loop. Run one [`PublishingWorker`] per consumer; any
//! number may share a queue, store and rate limiter.

pub mod publishing_worker;

pub use publishing_worker::{PublishingWorker, WorkerStats, WorkerStatsSnapshot};
