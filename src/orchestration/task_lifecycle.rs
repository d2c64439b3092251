//! # Task Lifecycle Manager
//!
//! Drives one publishing task through a processing cycle:
//!
//! ```text
//! PENDING ──start──▶ UPLOADING ──publish──▶ PUBLISHED
//!    ▲                  │  │
//!    │ (redelivery)     │  └──fail──▶ FAILED
//! RETRYING ◀──retry─────┘
//! ```
//!
//! Each delivered task reference runs exactly one cycle. A cycle increments
//! `attempts` before anything else happens, validates the video, passes the
//! rate limiter gate and then runs the uploader under the platform's retry
//! policy. A retryable failure with cycles left parks the task in RETRYING
//! and asks the queue for a delayed redelivery; anything else is final.
//!
//! Upload failures never escape as errors: they become persisted task state
//! and a [`TaskOutcome`]. Only infrastructure failures (store, queue) are
//! returned as [`LifecycleError`].
//!
//! ## Idempotency
//!
//! Tasks that are not PENDING or RETRYING are skipped without side effects,
//! so redelivering a PUBLISHED or FAILED task is a no-op. Every transition is
//! applied with an optimistic status check; losing that race also skips.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::{LifecycleError, LifecycleResult, PublishingError};
use super::job_aggregator::JobAggregator;
use crate::config::PublisherConfig;
use crate::constants::events;
use crate::database::{PublishingStore, StoreError};
use crate::logging::log_task_operation;
use crate::messaging::{PublishingTaskMessage, TaskQueue};
use crate::models::{PublishingTask, SocialAccount, Video};
use crate::registry::UploaderRegistry;
use crate::resilience::{with_retry, Clock, RateLimiter, RetryContext};
use crate::state_machine::{TaskEvent, TaskStateMachine, TaskStatus};
use crate::uploaders::UploadContext;

/// Result of one processing cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Nothing done; the task was not processable or another worker won
    Skipped { status: TaskStatus },
    Published { platform_post_id: String },
    /// Parked in RETRYING; a redelivery was requested after `delay`
    Retrying {
        delay: Duration,
        error: PublishingError,
    },
    Failed { error: PublishingError },
}

impl TaskOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published { .. } | Self::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Published { .. } => "published",
            Self::Retrying { .. } => "retrying",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Outcome of applying one planned transition
enum Applied {
    Updated(PublishingTask),
    /// The stored status moved on before the write
    Lost(TaskStatus),
}

pub struct TaskLifecycleManager {
    store: Arc<dyn PublishingStore>,
    registry: Arc<UploaderRegistry>,
    limiter: Arc<RateLimiter>,
    queue: Arc<dyn TaskQueue>,
    aggregator: JobAggregator,
    clock: Arc<dyn Clock>,
    config: PublisherConfig,
}

impl std::fmt::Debug for TaskLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLifecycleManager")
            .field("store", &self.store.store_name())
            .field("queue", &self.queue.provider_name())
            .field("lifecycle", &self.config.lifecycle)
            .finish()
    }
}

impl TaskLifecycleManager {
    pub fn new(
        store: Arc<dyn PublishingStore>,
        registry: Arc<UploaderRegistry>,
        limiter: Arc<RateLimiter>,
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            aggregator: JobAggregator::new(store.clone()),
            store,
            registry,
            limiter,
            queue,
            clock,
            config,
        }
    }

    pub fn aggregator(&self) -> &JobAggregator {
        &self.aggregator
    }

    /// Run one processing cycle for `task_id`
    pub async fn process_task(&self, task_id: Uuid) -> LifecycleResult<TaskOutcome> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(LifecycleError::TaskNotFound(task_id))?;

        if !task.status.is_processable() {
            debug!(
                task_id = %task_id,
                status = %task.status,
                event = events::TASK_SKIPPED,
                "Task not processable, skipping delivery"
            );
            return Ok(TaskOutcome::Skipped {
                status: task.status,
            });
        }

        let (video, account) = match self.load_dependencies(&task).await? {
            Ok(found) => found,
            Err(error) => return self.fail(task, error).await,
        };

        let task = match self.apply(&task, TaskEvent::Start).await? {
            Applied::Updated(task) => task,
            Applied::Lost(status) => return Ok(TaskOutcome::Skipped { status }),
        };
        log_task_operation(
            events::TASK_STARTED,
            task.id,
            Some(task.platform),
            &task.status.to_string(),
            Some(&format!(
                "cycle {}/{}",
                task.attempts, self.config.lifecycle.max_redelivery_cycles
            )),
        );

        let platform = task.platform;
        let uploader = self.registry.get(platform);

        if let Err(error) = uploader.validate(&video, &uploader.requirements()) {
            return self.fail(task, error).await;
        }

        let operation = self.config.lifecycle.rate_limit_operation.as_str();
        let gate = if self.config.lifecycle.wait_for_rate_limit {
            self.limiter.wait_and_consume(platform, operation).await
        } else {
            self.limiter.check_and_consume(platform, operation)
        };
        if let Err(error) = gate {
            let delay = self
                .config
                .lifecycle
                .redelivery_delay()
                .max(Duration::from_secs(error.retry_after().unwrap_or(0)));
            let message = error.to_string();
            return self
                .retry_or_fail(task, error, TaskEvent::RateLimited(message), delay)
                .await;
        }

        let policy = self.config.retry_policy_for(platform);
        let context = UploadContext::new(task.clone(), video, account)
            .with_schedule_time(self.schedule_time(&task).await);
        let retry_context = RetryContext::new(platform, "upload").for_task(task.id);

        let result = with_retry(
            || uploader.upload(&context),
            &policy,
            &retry_context,
            self.clock.as_ref(),
        )
        .await;

        match result {
            Ok(upload) => {
                let post_id = upload.platform_post_id;
                match self.apply(&task, TaskEvent::Publish(post_id.clone())).await? {
                    Applied::Updated(task) => {
                        log_task_operation(
                            events::TASK_PUBLISHED,
                            task.id,
                            Some(platform),
                            &task.status.to_string(),
                            Some(&post_id),
                        );
                        self.refresh_job(task.job_id).await;
                        Ok(TaskOutcome::Published {
                            platform_post_id: post_id,
                        })
                    }
                    Applied::Lost(status) => Ok(TaskOutcome::Skipped { status }),
                }
            }
            Err(error) if policy.should_retry(&error) => {
                let message = error.to_string();
                let delay = self.config.lifecycle.redelivery_delay();
                self.retry_or_fail(task, error, TaskEvent::Retry(message), delay)
                    .await
            }
            Err(error) => self.fail(task, error).await,
        }
    }

    /// Force a non-terminal task to FAILED and recompute its job.
    ///
    /// Used by the worker when a cycle crashed or hit an infrastructure
    /// error. Terminal tasks are left untouched and reported as skipped.
    pub async fn mark_failed(&self, task_id: Uuid, reason: &str) -> LifecycleResult<TaskOutcome> {
        // A concurrent writer can move the task between load and write
        for _ in 0..3 {
            let task = self
                .store
                .get_task(task_id)
                .await?
                .ok_or(LifecycleError::TaskNotFound(task_id))?;
            if task.is_terminal() {
                return Ok(TaskOutcome::Skipped {
                    status: task.status,
                });
            }

            let error = PublishingError::unknown(Some(task.platform), reason);
            match self.apply(&task, TaskEvent::Fail(error.to_string())).await? {
                Applied::Updated(task) => {
                    warn!(
                        task_id = %task.id,
                        platform = %task.platform,
                        reason = %reason,
                        event = events::TASK_FAILED,
                        "❌ Task force-failed"
                    );
                    self.refresh_job(task.job_id).await;
                    return Ok(TaskOutcome::Failed { error });
                }
                Applied::Lost(_) => continue,
            }
        }

        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(LifecycleError::TaskNotFound(task_id))?;
        Ok(TaskOutcome::Skipped {
            status: task.status,
        })
    }

    async fn load_dependencies(
        &self,
        task: &PublishingTask,
    ) -> LifecycleResult<Result<(Video, SocialAccount), PublishingError>> {
        let Some(video) = self.store.get_video(task.video_id).await? else {
            return Ok(Err(PublishingError::unknown(
                Some(task.platform),
                format!("Video {} not found", task.video_id),
            )));
        };
        let Some(account) = self.store.get_social_account(task.social_account_id).await? else {
            return Ok(Err(PublishingError::unknown(
                Some(task.platform),
                format!("Social account {} not found", task.social_account_id),
            )));
        };
        Ok(Ok((video, account)))
    }

    async fn schedule_time(&self, task: &PublishingTask) -> Option<chrono::DateTime<chrono::Utc>> {
        match self.store.get_job(task.job_id).await {
            Ok(Some(job)) => job.schedule_time,
            Ok(None) => None,
            Err(e) => {
                warn!(job_id = %task.job_id, error = %e, "Could not load job schedule time");
                None
            }
        }
    }

    /// RETRYING with a redelivery when cycles remain, FAILED otherwise
    async fn retry_or_fail(
        &self,
        task: PublishingTask,
        error: PublishingError,
        event: TaskEvent,
        delay: Duration,
    ) -> LifecycleResult<TaskOutcome> {
        if task.attempts >= self.config.lifecycle.max_redelivery_cycles {
            return self.fail(task, error).await;
        }

        let task = match self.apply(&task, event).await? {
            Applied::Updated(task) => task,
            Applied::Lost(status) => return Ok(TaskOutcome::Skipped { status }),
        };

        self.queue
            .enqueue(&PublishingTaskMessage::from_task(&task), Some(delay))
            .await?;

        info!(
            task_id = %task.id,
            platform = %task.platform,
            attempts = task.attempts,
            max_cycles = self.config.lifecycle.max_redelivery_cycles,
            delay_seconds = delay.as_secs(),
            error_code = error.code(),
            event = events::TASK_RETRY_SCHEDULED,
            "🔄 Task scheduled for redelivery"
        );
        self.refresh_job(task.job_id).await;
        Ok(TaskOutcome::Retrying { delay, error })
    }

    async fn fail(
        &self,
        task: PublishingTask,
        error: PublishingError,
    ) -> LifecycleResult<TaskOutcome> {
        match self.apply(&task, TaskEvent::Fail(error.to_string())).await? {
            Applied::Updated(task) => {
                warn!(
                    task_id = %task.id,
                    platform = %task.platform,
                    attempts = task.attempts,
                    error_code = error.code(),
                    error = %error,
                    event = events::TASK_FAILED,
                    "❌ Task failed permanently"
                );
                self.refresh_job(task.job_id).await;
                Ok(TaskOutcome::Failed { error })
            }
            Applied::Lost(status) => Ok(TaskOutcome::Skipped { status }),
        }
    }

    async fn apply(&self, task: &PublishingTask, event: TaskEvent) -> LifecycleResult<Applied> {
        let transition = TaskStateMachine::plan(task, &event)?;
        match self.store.transition_task(task.id, &transition).await {
            Ok(updated) => {
                debug!(
                    task_id = %task.id,
                    from = %transition.from,
                    to = %transition.to,
                    event = %transition.event_type,
                    attempts = updated.attempts,
                    "Task transition applied"
                );
                Ok(Applied::Updated(updated))
            }
            Err(StoreError::Conflict { actual, .. }) => {
                debug!(
                    task_id = %task.id,
                    expected = %transition.from,
                    actual = %actual,
                    "Task moved by another worker"
                );
                Ok(Applied::Lost(actual))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Aggregation failures are logged, never surfaced as task failures
    async fn refresh_job(&self, job_id: Uuid) {
        if let Err(e) = self.aggregator.recompute_job_status(job_id).await {
            warn!(job_id = %job_id, error = %e, "Job status recompute failed");
        }
    }
}
