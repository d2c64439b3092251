//! # Publishing Worker
//!
//! Queue consumer that drives the task lifecycle manager.
//!
//! The loop receives a batch of task references, handles them one at a time
//! and acknowledges each one after its cycle finished, whatever the outcome:
//! retries are already re-enqueued by the lifecycle manager with their delay.
//! A cycle that panics or hits an infrastructure error is caught here and the
//! task is forced to FAILED so the job can still settle. Only when even that
//! fails is the message dead-lettered.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::logging::{log_error, log_queue_operation};
use crate::messaging::{MessagingResult, QueuedMessage, TaskQueue};
use crate::orchestration::errors::LifecycleError;
use crate::orchestration::task_lifecycle::{TaskLifecycleManager, TaskOutcome};

/// Running counters for one worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    processed: AtomicU64,
    published: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub processed: u64,
    pub published: u64,
    pub retried: u64,
    pub failed: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl WorkerStats {
    fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Skipped { .. } => &self.skipped,
            TaskOutcome::Published { .. } => &self.published,
            TaskOutcome::Retrying { .. } => &self.retried,
            TaskOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

pub struct PublishingWorker {
    worker_id: String,
    lifecycle: Arc<TaskLifecycleManager>,
    queue: Arc<dyn TaskQueue>,
    config: QueueConfig,
    stats: WorkerStats,
}

impl std::fmt::Debug for PublishingWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishingWorker")
            .field("worker_id", &self.worker_id)
            .field("queue", &self.queue.provider_name())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl PublishingWorker {
    pub fn new(
        lifecycle: Arc<TaskLifecycleManager>,
        queue: Arc<dyn TaskQueue>,
        config: QueueConfig,
    ) -> Self {
        Self {
            worker_id: format!("publishing-worker-{}", Uuid::new_v4()),
            lifecycle,
            queue,
            config,
            stats: WorkerStats::default(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Consume until a shutdown signal arrives or every sender is dropped.
    ///
    /// Shutdown is observed between batches and during the idle wait, never
    /// in the middle of a processing cycle.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> WorkerStatsSnapshot {
        info!(
            worker_id = %self.worker_id,
            queue = %self.config.task_queue,
            provider = self.queue.provider_name(),
            batch_size = self.config.batch_size,
            "🚀 Publishing worker started"
        );

        loop {
            if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }

            let idle = match self.poll_once().await {
                Ok(handled) => handled == 0,
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    error!(worker_id = %self.worker_id, error = %e, "Queue poll failed");
                    true
                }
            };
            if !idle {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                _ = shutdown.recv() => break,
            }
        }

        let stats = self.stats.snapshot();
        info!(
            worker_id = %self.worker_id,
            processed = stats.processed,
            published = stats.published,
            retried = stats.retried,
            failed = stats.failed,
            "🛑 Publishing worker stopped"
        );
        stats
    }

    /// Receive one batch and handle every message in it; returns the count
    pub async fn poll_once(&self) -> MessagingResult<usize> {
        let messages = self
            .queue
            .receive(self.config.batch_size, self.config.visibility_timeout())
            .await?;
        if messages.is_empty() {
            return Ok(0);
        }

        debug!(worker_id = %self.worker_id, count = messages.len(), "📥 Received task messages");
        let count = messages.len();
        for message in messages {
            self.handle_message(message).await?;
        }
        Ok(count)
    }

    /// Run one processing cycle for a delivered message, then settle it
    pub async fn handle_message(&self, queued: QueuedMessage) -> MessagingResult<()> {
        let task_id = queued.message.task_id;
        self.stats.processed.fetch_add(1, Ordering::Relaxed);

        let cycle = AssertUnwindSafe(self.lifecycle.process_task(task_id))
            .catch_unwind()
            .await;

        let failure = match cycle {
            Ok(Ok(outcome)) => {
                debug!(
                    worker_id = %self.worker_id,
                    task_id = %task_id,
                    outcome = outcome.label(),
                    receive_count = queued.receive_count,
                    "Task cycle finished"
                );
                self.stats.record(&outcome);
                None
            }
            Ok(Err(LifecycleError::TaskNotFound(_))) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(task_id = %task_id, "Message references unknown task, dead-lettering");
                return self.dead_letter(&queued).await;
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        if let Some(reason) = failure {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
            log_error(
                "publishing_worker",
                "process_task",
                &reason,
                Some(&format!("task_id={task_id}")),
            );

            match self.lifecycle.mark_failed(task_id, &reason).await {
                Ok(outcome) => self.stats.record(&outcome),
                Err(e) => {
                    error!(
                        task_id = %task_id,
                        error = %e,
                        "❌ Could not mark task failed, dead-lettering message"
                    );
                    return self.dead_letter(&queued).await;
                }
            }
        }

        self.queue.ack(&queued.receipt_handle).await
    }

    async fn dead_letter(&self, queued: &QueuedMessage) -> MessagingResult<()> {
        self.queue.nack(&queued.receipt_handle, false).await?;
        log_queue_operation(
            "dead_letter",
            &self.config.task_queue,
            "nacked",
            Some(&format!("task_id={}", queued.message.task_id)),
        );
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("processing panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("processing panicked: {message}")
    } else {
        "processing panicked".to_string()
    }
}
