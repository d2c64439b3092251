use super::{PublishingStore, StoreError, StoreResult};
use crate::models::{PublishingJob, PublishingTask, SocialAccount, Video};
use crate::state_machine::{JobStatus, StateMachineError, TaskTransition};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    videos: HashMap<Uuid, Video>,
    accounts: HashMap<Uuid, SocialAccount>,
    jobs: HashMap<Uuid, PublishingJob>,
    tasks: HashMap<Uuid, PublishingTask>,
}

/// Store backed by in-process maps behind a single `RwLock`
#[derive(Debug, Default)]
pub struct InMemoryPublishingStore {
    tables: RwLock<Tables>,
}

impl InMemoryPublishingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PublishingStore for InMemoryPublishingStore {
    async fn insert_video(&self, video: &Video) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.videos.contains_key(&video.id) {
            return Err(StoreError::Duplicate {
                entity: "video",
                id: video.id,
            });
        }
        tables.videos.insert(video.id, video.clone());
        Ok(())
    }

    async fn get_video(&self, id: Uuid) -> StoreResult<Option<Video>> {
        Ok(self.tables.read().await.videos.get(&id).cloned())
    }

    async fn insert_social_account(&self, account: &SocialAccount) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.accounts.contains_key(&account.id) {
            return Err(StoreError::Duplicate {
                entity: "social_account",
                id: account.id,
            });
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_social_account(&self, id: Uuid) -> StoreResult<Option<SocialAccount>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn create_job(&self, job: &PublishingJob, tasks: &[PublishingTask]) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate {
                entity: "publishing_job",
                id: job.id,
            });
        }
        if let Some(task) = tasks.iter().find(|t| tables.tasks.contains_key(&t.id)) {
            return Err(StoreError::Duplicate {
                entity: "publishing_task",
                id: task.id,
            });
        }

        tables.jobs.insert(job.id, job.clone());
        for task in tasks {
            tables.tasks.insert(task.id, task.clone());
        }
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<PublishingJob>> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn list_jobs_for_user(&self, user_id: Uuid) -> StoreResult<Vec<PublishingJob>> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<PublishingJob> = tables
            .jobs
            .values()
            .filter(|job| job.user_id == user_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn update_job_status_if(
        &self,
        id: Uuid,
        expected: JobStatus,
        status: JobStatus,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let job = tables
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("publishing_job", id))?;
        if job.status != expected {
            return Ok(false);
        }
        job.status = status;
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<PublishingTask>> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn list_job_tasks(&self, job_id: Uuid) -> StoreResult<Vec<PublishingTask>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<PublishingTask> = tables
            .tasks
            .values()
            .filter(|task| task.job_id == job_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn transition_task(
        &self,
        task_id: Uuid,
        transition: &TaskTransition,
    ) -> StoreResult<PublishingTask> {
        let mut tables = self.tables.write().await;
        let task = tables
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::not_found("publishing_task", task_id))?;

        if task.status != transition.from {
            return Err(StoreError::Conflict {
                task_id,
                expected: transition.from,
                actual: task.status,
            });
        }
        if transition.attempts < task.attempts {
            return Err(StateMachineError::AttemptsRegression {
                task_id: task_id.to_string(),
                current: task.attempts,
                proposed: transition.attempts,
            }
            .into());
        }

        task.status = transition.to;
        task.attempts = transition.attempts;
        task.error_message = transition.error_message.clone();
        task.platform_post_id = transition.platform_post_id.clone();
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    fn store_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, PublishTarget};
    use crate::state_machine::{TaskEvent, TaskStateMachine, TaskStatus};

    async fn seeded_store() -> (InMemoryPublishingStore, PublishingJob, PublishingTask) {
        let store = InMemoryPublishingStore::new();
        let user_id = Uuid::new_v4();
        let video = Video::new(user_id, "Launch", "launch.mp4");
        let account = SocialAccount::new(user_id, Platform::YouTube, "channel");
        let job = PublishingJob::new(
            user_id,
            video.id,
            "Launch",
            vec![PublishTarget {
                social_account_id: account.id,
                platform: account.platform,
            }],
        );
        let task = PublishingTask::new(job.id, video.id, &account);

        store.insert_video(&video).await.unwrap();
        store.insert_social_account(&account).await.unwrap();
        store.create_job(&job, std::slice::from_ref(&task)).await.unwrap();
        (store, job, task)
    }

    #[tokio::test]
    async fn test_transition_applies_plan() {
        let (store, _job, task) = seeded_store().await;
        let plan = TaskStateMachine::plan(&task, &TaskEvent::Start).unwrap();

        let updated = store.transition_task(task.id, &plan).await.unwrap();
        assert_eq!(updated.status, TaskStatus::Uploading);
        assert_eq!(updated.attempts, 1);
    }

    #[tokio::test]
    async fn test_stale_plan_conflicts() {
        let (store, _job, task) = seeded_store().await;
        let plan = TaskStateMachine::plan(&task, &TaskEvent::Start).unwrap();
        store.transition_task(task.id, &plan).await.unwrap();

        // A second worker planned from the same pending snapshot
        let err = store.transition_task(task.id, &plan).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_attempts_never_decrease() {
        let (store, _job, task) = seeded_store().await;
        let start = TaskStateMachine::plan(&task, &TaskEvent::Start).unwrap();
        let uploading = store.transition_task(task.id, &start).await.unwrap();

        let mut regressing =
            TaskStateMachine::plan(&uploading, &TaskEvent::Retry("503".into())).unwrap();
        regressing.attempts = 0;
        let err = store.transition_task(task.id, &regressing).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_job_queries() {
        let (store, job, task) = seeded_store().await;

        let tasks = store.list_job_tasks(job.id).await.unwrap();
        assert_eq!(tasks, vec![task]);

        assert!(store
            .update_job_status_if(job.id, JobStatus::Pending, JobStatus::Processing)
            .await
            .unwrap());
        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Processing);

        // Stale expectation leaves the stored status alone
        assert!(!store
            .update_job_status_if(job.id, JobStatus::Pending, JobStatus::Failed)
            .await
            .unwrap());
        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Processing);

        let jobs = store.list_jobs_for_user(job.user_id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(store.list_jobs_for_user(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_records() {
        let store = InMemoryPublishingStore::new();
        assert!(store.get_task(Uuid::new_v4()).await.unwrap().is_none());
        let err = store
            .update_job_status_if(Uuid::new_v4(), JobStatus::Pending, JobStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
