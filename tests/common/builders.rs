use super::scripted_uploader::ScriptedUploader;
use publishing_core::config::PublisherConfig;
use publishing_core::database::{InMemoryPublishingStore, PublishingStore};
use publishing_core::messaging::InMemoryTaskQueue;
use publishing_core::models::{Platform, PublishingTask, SocialAccount, Video};
use publishing_core::orchestration::{
    BatchJobItem, BatchPublishRequest, BatchPublisher, BatchTarget, CreatedJob,
    TaskLifecycleManager,
};
use publishing_core::registry::UploaderRegistry;
use publishing_core::resilience::{ManualClock, RateLimiter};
use publishing_core::state_machine::JobStatus;
use publishing_core::worker::PublishingWorker;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Fully wired in-memory pipeline on a virtual clock
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryPublishingStore>,
    pub queue: Arc<InMemoryTaskQueue>,
    pub limiter: Arc<RateLimiter>,
    pub registry: Arc<UploaderRegistry>,
    pub lifecycle: Arc<TaskLifecycleManager>,
    pub publisher: BatchPublisher,
    pub config: PublisherConfig,
    pub user_id: Uuid,
    uploaders: HashMap<Platform, Arc<ScriptedUploader>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PublisherConfig::default())
    }

    pub fn with_config(mut config: PublisherConfig) -> Self {
        config.queue.poll_interval_ms = 5;

        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(InMemoryPublishingStore::new());
        let queue = Arc::new(InMemoryTaskQueue::new(clock.clone()));
        let limiter = Arc::new(RateLimiter::with_budgets(
            config.rate_limit_budgets(),
            clock.clone(),
        ));

        let uploaders: HashMap<Platform, Arc<ScriptedUploader>> = Platform::ALL
            .iter()
            .map(|platform| (*platform, Arc::new(ScriptedUploader::new(*platform))))
            .collect();
        let registry = Arc::new(
            uploaders
                .values()
                .fold(UploaderRegistry::builder(), |builder, uploader| {
                    builder.register(uploader.clone())
                })
                .build()
                .expect("every platform has a scripted uploader"),
        );

        let lifecycle = Arc::new(TaskLifecycleManager::new(
            store.clone(),
            registry.clone(),
            limiter.clone(),
            queue.clone(),
            clock.clone(),
            config.clone(),
        ));

        Self {
            publisher: BatchPublisher::new(store.clone(), queue.clone()),
            clock,
            store,
            queue,
            limiter,
            registry,
            lifecycle,
            config,
            user_id: Uuid::new_v4(),
            uploaders,
        }
    }

    pub fn uploader(&self, platform: Platform) -> &ScriptedUploader {
        &self.uploaders[&platform]
    }

    /// A 30 second 9:16 mp4 every platform accepts
    pub async fn video(&self) -> Video {
        let mut video = Video::new(self.user_id, "Launch teaser", "teaser.mp4");
        video.size_bytes = Some(50 * 1024 * 1024);
        video.duration_seconds = Some(30.0);
        video.width = Some(608);
        video.height = Some(1080);
        self.store.insert_video(&video).await.unwrap();
        video
    }

    pub async fn account(&self, platform: Platform) -> SocialAccount {
        let account = SocialAccount::new(self.user_id, platform, format!("{platform}-account"));
        self.store.insert_social_account(&account).await.unwrap();
        account
    }

    /// Submit a single-video batch for `accounts`
    pub async fn publish(
        &self,
        video: &Video,
        accounts: &[&SocialAccount],
        custom_title: Option<&str>,
    ) -> CreatedJob {
        let request = BatchPublishRequest {
            batch_title: None,
            schedule_time: None,
            jobs: vec![BatchJobItem {
                video_id: video.id,
                targets: accounts
                    .iter()
                    .map(|account| BatchTarget {
                        social_account_id: account.id,
                    })
                    .collect(),
                custom_title: custom_title.map(str::to_string),
                custom_description: None,
            }],
        };
        let mut created = self
            .publisher
            .create_batch_job(self.user_id, &request)
            .await
            .unwrap();
        created.remove(0)
    }

    pub async fn task(&self, task_id: Uuid) -> PublishingTask {
        self.store.get_task(task_id).await.unwrap().unwrap()
    }

    pub async fn job_tasks(&self, job_id: Uuid) -> Vec<PublishingTask> {
        self.store.list_job_tasks(job_id).await.unwrap()
    }

    pub async fn job_status(&self, job_id: Uuid) -> JobStatus {
        self.store.get_job(job_id).await.unwrap().unwrap().status
    }

    pub fn worker(&self) -> PublishingWorker {
        PublishingWorker::new(
            self.lifecycle.clone(),
            self.queue.clone(),
            self.config.queue.clone(),
        )
    }

    /// Poll until nothing is visible; returns the messages handled
    pub async fn drain(&self, worker: &PublishingWorker) -> usize {
        let mut handled = 0;
        loop {
            let batch = worker.poll_once().await.unwrap();
            if batch == 0 {
                return handled;
            }
            handled += batch;
        }
    }

    /// Jump past the redelivery delay so RETRYING tasks become visible
    pub fn skip_redelivery_delay(&self) {
        self.clock
            .advance(self.config.lifecycle.redelivery_delay() + Duration::from_secs(1));
    }
}
