//! # Batch Publisher
//!
//! Entry point for new work. A batch names one or more videos, each with the
//! social accounts it should go to; the publisher validates ownership, creates
//! one job per video with a PENDING task per account, and enqueues a task
//! reference for every task.
//!
//! The whole batch is validated before anything is written, so a bad video or
//! account id rejects the batch without leaving partial jobs behind.
//!
//! Enqueueing happens after each job is stored. If the queue refuses an
//! item's task references, that item's tasks are failed through the state
//! machine and its job recomputed, so no job waits on messages that were never
//! sent. Items accepted before the failure stay live; later items are not
//! written.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::events;
use crate::database::{PublishingStore, StoreError};
use crate::logging::{log_error, log_job_operation, log_task_operation};
use crate::messaging::{MessagingError, PublishingTaskMessage, TaskQueue};
use crate::models::{PublishTarget, PublishingJob, PublishingTask, SocialAccount, Video};
use crate::orchestration::job_aggregator::JobAggregator;
use crate::state_machine::{TaskEvent, TaskStateMachine};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Batch contains no jobs")]
    EmptyBatch,

    #[error("Video {video_id} has no publish targets")]
    NoTargets { video_id: Uuid },

    #[error("Video not found: {0}")]
    VideoNotFound(Uuid),

    #[error("Social account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(
        "Could not enqueue tasks of job {job_id} \
         ({accepted_jobs} job(s) accepted before it): {source}"
    )]
    EnqueueFailed {
        job_id: Uuid,
        accepted_jobs: usize,
        #[source]
        source: MessagingError,
    },
}

pub type BatchResult<T> = Result<T, BatchError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTarget {
    pub social_account_id: Uuid,
}

/// One video and where it should go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobItem {
    pub video_id: Uuid,
    pub targets: Vec<BatchTarget>,
    #[serde(default)]
    pub custom_title: Option<String>,
    #[serde(default)]
    pub custom_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPublishRequest {
    #[serde(default)]
    pub batch_title: Option<String>,
    #[serde(default)]
    pub schedule_time: Option<DateTime<Utc>>,
    pub jobs: Vec<BatchJobItem>,
}

/// A job as created, with its initial tasks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedJob {
    pub job: PublishingJob,
    pub tasks: Vec<PublishingTask>,
}

struct ValidatedItem<'a> {
    item: &'a BatchJobItem,
    video: Video,
    accounts: Vec<SocialAccount>,
}

pub struct BatchPublisher {
    store: Arc<dyn PublishingStore>,
    queue: Arc<dyn TaskQueue>,
    aggregator: JobAggregator,
}

impl std::fmt::Debug for BatchPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPublisher")
            .field("store", &self.store.store_name())
            .field("queue", &self.queue.provider_name())
            .finish()
    }
}

impl BatchPublisher {
    pub fn new(store: Arc<dyn PublishingStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            aggregator: JobAggregator::new(store.clone()),
            store,
            queue,
        }
    }

    /// Create one job per item and enqueue every task
    pub async fn create_batch_job(
        &self,
        user_id: Uuid,
        request: &BatchPublishRequest,
    ) -> BatchResult<Vec<CreatedJob>> {
        if request.jobs.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let mut validated = Vec::with_capacity(request.jobs.len());
        for item in &request.jobs {
            validated.push(self.validate_item(user_id, item).await?);
        }

        let mut created = Vec::with_capacity(validated.len());
        for (index, ValidatedItem { item, video, accounts }) in validated.into_iter().enumerate() {
            let title = match &request.batch_title {
                Some(batch_title) => format!("{batch_title} - Video {}", index + 1),
                None => format!("{} - Batch Job", video.title),
            };
            let targets = accounts
                .iter()
                .map(|account| PublishTarget {
                    social_account_id: account.id,
                    platform: account.platform,
                })
                .collect();

            let job = PublishingJob::new(user_id, video.id, title, targets)
                .with_description(format!("Batch publishing job for video: {}", video.title))
                .with_schedule_time(request.schedule_time);
            let tasks: Vec<PublishingTask> = accounts
                .iter()
                .map(|account| {
                    PublishingTask::new(job.id, video.id, account).with_overrides(
                        item.custom_title.clone(),
                        item.custom_description.clone(),
                    )
                })
                .collect();

            self.store.create_job(&job, &tasks).await?;

            let messages: Vec<PublishingTaskMessage> =
                tasks.iter().map(PublishingTaskMessage::from_task).collect();
            if let Err(source) = self.queue.enqueue_batch(&messages).await {
                self.abandon_job(&job, &tasks, &source).await;
                return Err(BatchError::EnqueueFailed {
                    job_id: job.id,
                    accepted_jobs: created.len(),
                    source,
                });
            }

            log_job_operation(
                events::JOB_CREATED,
                job.id,
                &job.status.to_string(),
                Some(&format!("{} task(s) enqueued", tasks.len())),
            );
            created.push(CreatedJob { job, tasks });
        }

        info!(
            user_id = %user_id,
            jobs = created.len(),
            tasks = created.iter().map(|c| c.tasks.len()).sum::<usize>(),
            "🚀 Batch publishing accepted"
        );
        Ok(created)
    }

    /// Fail the tasks of a stored job whose references never reached the queue
    async fn abandon_job(
        &self,
        job: &PublishingJob,
        tasks: &[PublishingTask],
        cause: &MessagingError,
    ) {
        let reason = format!("Failed to enqueue task: {cause}");
        warn!(job_id = %job.id, error = %cause, "Enqueue failed, failing job tasks");

        for task in tasks {
            let failed = match TaskStateMachine::plan(task, &TaskEvent::Fail(reason.clone())) {
                Ok(transition) => self.store.transition_task(task.id, &transition).await,
                Err(err) => Err(StoreError::from(err)),
            };
            match failed {
                Ok(updated) => log_task_operation(
                    events::TASK_FAILED,
                    updated.id,
                    Some(updated.platform),
                    &updated.status.to_string(),
                    Some(&reason),
                ),
                Err(err) => log_error(
                    "batch_publisher",
                    "abandon_job",
                    &err.to_string(),
                    Some(&format!("task_id={}", task.id)),
                ),
            }
        }

        if let Err(err) = self.aggregator.recompute_job_status(job.id).await {
            log_error(
                "batch_publisher",
                "abandon_job",
                &err.to_string(),
                Some(&format!("job_id={}", job.id)),
            );
        }
    }

    /// Resolve the video and accounts, requiring that the user owns them
    async fn validate_item<'a>(
        &self,
        user_id: Uuid,
        item: &'a BatchJobItem,
    ) -> BatchResult<ValidatedItem<'a>> {
        let video = self
            .store
            .get_video(item.video_id)
            .await?
            .filter(|video| video.user_id == user_id)
            .ok_or(BatchError::VideoNotFound(item.video_id))?;

        if item.targets.is_empty() {
            return Err(BatchError::NoTargets {
                video_id: item.video_id,
            });
        }

        // Repeated account ids collapse to one task
        let mut seen = HashSet::new();
        let mut accounts = Vec::with_capacity(item.targets.len());
        for target in &item.targets {
            if !seen.insert(target.social_account_id) {
                continue;
            }
            let account = self
                .store
                .get_social_account(target.social_account_id)
                .await?
                .filter(|account| account.user_id == user_id)
                .ok_or(BatchError::AccountNotFound(target.social_account_id))?;
            accounts.push(account);
        }

        Ok(ValidatedItem {
            item,
            video,
            accounts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryPublishingStore;
    use crate::messaging::{
        InMemoryTaskQueue, MessagingResult, QueueStats, QueuedMessage, ReceiptHandle,
    };
    use crate::models::Platform;
    use crate::state_machine::{JobStatus, TaskStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Queue that accepts a fixed number of batches, then refuses
    struct FlakyQueue {
        inner: InMemoryTaskQueue,
        batches_left: AtomicUsize,
    }

    #[async_trait]
    impl TaskQueue for FlakyQueue {
        async fn enqueue(
            &self,
            message: &PublishingTaskMessage,
            delay: Option<Duration>,
        ) -> MessagingResult<()> {
            self.inner.enqueue(message, delay).await
        }

        async fn enqueue_batch(&self, messages: &[PublishingTaskMessage]) -> MessagingResult<()> {
            let accepted = self
                .batches_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if !accepted {
                return Err(MessagingError::connection("broker unavailable"));
            }
            self.inner.enqueue_batch(messages).await
        }

        async fn receive(
            &self,
            max_messages: usize,
            visibility_timeout: Duration,
        ) -> MessagingResult<Vec<QueuedMessage>> {
            self.inner.receive(max_messages, visibility_timeout).await
        }

        async fn ack(&self, receipt: &ReceiptHandle) -> MessagingResult<()> {
            self.inner.ack(receipt).await
        }

        async fn nack(&self, receipt: &ReceiptHandle, requeue: bool) -> MessagingResult<()> {
            self.inner.nack(receipt, requeue).await
        }

        async fn stats(&self) -> MessagingResult<QueueStats> {
            self.inner.stats().await
        }

        async fn purge(&self) -> MessagingResult<u64> {
            self.inner.purge().await
        }

        async fn health_check(&self) -> MessagingResult<bool> {
            self.inner.health_check().await
        }

        fn provider_name(&self) -> &'static str {
            "flaky"
        }
    }

    struct Fixture {
        store: Arc<InMemoryPublishingStore>,
        queue: Arc<InMemoryTaskQueue>,
        publisher: BatchPublisher,
        user_id: Uuid,
        video: Video,
        youtube: SocialAccount,
        tiktok: SocialAccount,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryPublishingStore::new());
        let queue = Arc::new(InMemoryTaskQueue::default());
        let user_id = Uuid::new_v4();
        let video = Video::new(user_id, "Launch", "launch.mp4");
        let youtube = SocialAccount::new(user_id, Platform::YouTube, "channel");
        let tiktok = SocialAccount::new(user_id, Platform::TikTok, "clips");
        store.insert_video(&video).await.unwrap();
        store.insert_social_account(&youtube).await.unwrap();
        store.insert_social_account(&tiktok).await.unwrap();

        Fixture {
            publisher: BatchPublisher::new(store.clone(), queue.clone()),
            store,
            queue,
            user_id,
            video,
            youtube,
            tiktok,
        }
    }

    fn item(video_id: Uuid, accounts: &[&SocialAccount]) -> BatchJobItem {
        BatchJobItem {
            video_id,
            targets: accounts
                .iter()
                .map(|a| BatchTarget {
                    social_account_id: a.id,
                })
                .collect(),
            custom_title: Some("Custom".to_string()),
            custom_description: None,
        }
    }

    #[tokio::test]
    async fn test_creates_pending_tasks_and_enqueues() {
        let f = fixture().await;
        let request = BatchPublishRequest {
            batch_title: Some("Spring".to_string()),
            schedule_time: None,
            jobs: vec![item(f.video.id, &[&f.youtube, &f.tiktok])],
        };

        let created = f.publisher.create_batch_job(f.user_id, &request).await.unwrap();
        assert_eq!(created.len(), 1);
        let CreatedJob { job, tasks } = &created[0];
        assert_eq!(job.title, "Spring - Video 1");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.targets.len(), 2);
        assert_eq!(tasks.len(), 2);
        assert!(tasks
            .iter()
            .all(|t| t.status == TaskStatus::Pending && t.attempts == 0));

        let stored = f.store.list_job_tasks(job.id).await.unwrap();
        assert_eq!(stored.len(), 2);

        let messages = f.queue.messages().await;
        assert_eq!(messages.len(), 2);
        assert!(messages
            .iter()
            .all(|m| m.custom_title.as_deref() == Some("Custom") && m.attempts == 0));
    }

    #[tokio::test]
    async fn test_default_title_uses_video_title() {
        let f = fixture().await;
        let request = BatchPublishRequest {
            batch_title: None,
            schedule_time: None,
            jobs: vec![item(f.video.id, &[&f.youtube, &f.youtube])],
        };

        let created = f.publisher.create_batch_job(f.user_id, &request).await.unwrap();
        assert_eq!(created[0].job.title, "Launch - Batch Job");
        assert_eq!(created[0].tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_account_rejects_whole_batch() {
        let f = fixture().await;
        let stranger = SocialAccount::new(Uuid::new_v4(), Platform::Facebook, "other");
        f.store.insert_social_account(&stranger).await.unwrap();

        let request = BatchPublishRequest {
            batch_title: None,
            schedule_time: None,
            jobs: vec![
                item(f.video.id, &[&f.youtube]),
                item(f.video.id, &[&stranger]),
            ],
        };

        let err = f.publisher.create_batch_job(f.user_id, &request).await.unwrap_err();
        assert!(matches!(err, BatchError::AccountNotFound(id) if id == stranger.id));
        assert!(f.store.list_jobs_for_user(f.user_id).await.unwrap().is_empty());
        assert!(f.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejects_empty_input() {
        let f = fixture().await;
        let empty = BatchPublishRequest {
            batch_title: None,
            schedule_time: None,
            jobs: vec![],
        };
        assert!(matches!(
            f.publisher.create_batch_job(f.user_id, &empty).await,
            Err(BatchError::EmptyBatch)
        ));

        let no_targets = BatchPublishRequest {
            jobs: vec![item(f.video.id, &[])],
            ..empty
        };
        assert!(matches!(
            f.publisher.create_batch_job(f.user_id, &no_targets).await,
            Err(BatchError::NoTargets { .. })
        ));

        let missing_video = BatchPublishRequest {
            batch_title: None,
            schedule_time: None,
            jobs: vec![item(Uuid::new_v4(), &[&f.youtube])],
        };
        assert!(matches!(
            f.publisher.create_batch_job(f.user_id, &missing_video).await,
            Err(BatchError::VideoNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_enqueue_failure_fails_the_stored_tasks() {
        let f = fixture().await;
        let second_video = Video::new(f.user_id, "Teaser", "teaser.mp4");
        f.store.insert_video(&second_video).await.unwrap();

        let queue = Arc::new(FlakyQueue {
            inner: InMemoryTaskQueue::default(),
            batches_left: AtomicUsize::new(1),
        });
        let publisher = BatchPublisher::new(f.store.clone(), queue.clone());
        let request = BatchPublishRequest {
            batch_title: None,
            schedule_time: None,
            jobs: vec![
                item(f.video.id, &[&f.youtube]),
                item(second_video.id, &[&f.youtube, &f.tiktok]),
            ],
        };

        let err = publisher.create_batch_job(f.user_id, &request).await.unwrap_err();
        let BatchError::EnqueueFailed {
            job_id,
            accepted_jobs,
            ..
        } = err
        else {
            panic!("expected enqueue failure, got {err:?}");
        };
        assert_eq!(accepted_jobs, 1);

        // The refused job is settled instead of waiting forever
        let abandoned = f.store.list_job_tasks(job_id).await.unwrap();
        assert_eq!(abandoned.len(), 2);
        for task in &abandoned {
            assert_eq!(task.status, TaskStatus::Failed);
            assert_eq!(task.attempts, 0);
            let message = task.error_message.as_deref().unwrap_or_default();
            assert!(message.contains("broker unavailable"), "got {message:?}");
        }
        assert_eq!(
            f.store.get_job(job_id).await.unwrap().unwrap().status,
            JobStatus::Failed
        );

        // The job accepted before it is still live
        let jobs = f.store.list_jobs_for_user(f.user_id).await.unwrap();
        assert_eq!(jobs.len(), 2);
        let live = jobs.iter().find(|job| job.id != job_id).unwrap();
        assert_eq!(live.status, JobStatus::Pending);
        assert_eq!(queue.inner.messages().await.len(), 1);
    }
}
