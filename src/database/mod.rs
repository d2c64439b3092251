//! # Publishing Store
//!
//! Persistence boundary for jobs, tasks, videos and social accounts.
//!
//! The lifecycle manager relies on one guarantee beyond plain CRUD:
//! [`PublishingStore::transition_task`] applies a planned transition only if
//! the stored status still equals the status the plan was made from, so two
//! workers racing on a redelivered task cannot both move it. Job status
//! writes are compare-and-set in the same way
//! ([`PublishingStore::update_job_status_if`]).
//!
//! ## Implementations
//!
//! - [`InMemoryPublishingStore`]: lock-protected maps, for tests and single
//!   process runs
//! - [`PgPublishingStore`] (feature `postgres`): sqlx against PostgreSQL

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryPublishingStore;
#[cfg(feature = "postgres")]
pub use postgres::PgPublishingStore;

use crate::models::{PublishingJob, PublishingTask, SocialAccount, Video};
use crate::state_machine::{JobStatus, StateMachineError, TaskStatus, TaskTransition};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Status conflict on task {task_id}: expected {expected}, found {actual}")]
    Conflict {
        task_id: Uuid,
        expected: TaskStatus,
        actual: TaskStatus,
    },

    #[error("Job {job_id} status kept changing under recompute (last seen {last_seen})")]
    JobStatusContention { job_id: Uuid, last_seen: JobStatus },

    #[error("Rejected transition: {0}")]
    Rejected(#[from] StateMachineError),

    #[error("Duplicate {entity}: {id}")]
    Duplicate { entity: &'static str, id: Uuid },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PublishingStore: Send + Sync + 'static {
    async fn insert_video(&self, video: &Video) -> StoreResult<()>;

    async fn get_video(&self, id: Uuid) -> StoreResult<Option<Video>>;

    async fn insert_social_account(&self, account: &SocialAccount) -> StoreResult<()>;

    async fn get_social_account(&self, id: Uuid) -> StoreResult<Option<SocialAccount>>;

    /// Persist a job together with its initial tasks, atomically
    async fn create_job(&self, job: &PublishingJob, tasks: &[PublishingTask]) -> StoreResult<()>;

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<PublishingJob>>;

    async fn list_jobs_for_user(&self, user_id: Uuid) -> StoreResult<Vec<PublishingJob>>;

    /// Set the aggregate status if the stored status still equals `expected`.
    ///
    /// Returns `false` when another writer changed the status first. Only the
    /// job aggregator calls this.
    async fn update_job_status_if(
        &self,
        id: Uuid,
        expected: JobStatus,
        status: JobStatus,
    ) -> StoreResult<bool>;

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<PublishingTask>>;

    async fn list_job_tasks(&self, job_id: Uuid) -> StoreResult<Vec<PublishingTask>>;

    /// Apply `transition` if the task is still in `transition.from`.
    ///
    /// Returns the updated task, `StoreError::Conflict` when the stored
    /// status moved on, or `StoreError::Rejected` when attempts would
    /// decrease.
    async fn transition_task(
        &self,
        task_id: Uuid,
        transition: &TaskTransition,
    ) -> StoreResult<PublishingTask>;

    /// Name of the backing store for logging
    fn store_name(&self) -> &'static str;
}
