//! PostgreSQL-backed [`PublishingStore`].
//!
//! Statuses and platforms are stored as their lowercase string forms; job
//! targets are a JSONB array. Task transitions are a single conditional
//! `UPDATE ... WHERE status = $expected`, so the optimistic check and the
//! write happen in one statement.

use super::{PublishingStore, StoreError, StoreResult};
use crate::config::DatabaseConfig;
use crate::models::{PublishTarget, PublishingJob, PublishingTask, SocialAccount, Video};
use crate::state_machine::{JobStatus, StateMachineError, TaskTransition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

const VIDEO_COLUMNS: &str = "id, user_id, title, description, file_name, storage_path, \
     size_bytes, duration_seconds, width, height, created_at";
const ACCOUNT_COLUMNS: &str = "id, user_id, platform, username, platform_user_id, created_at";
const JOB_COLUMNS: &str = "id, user_id, video_id, title, description, targets, status, \
     schedule_time, created_at, updated_at";
const TASK_COLUMNS: &str = "id, job_id, video_id, social_account_id, platform, status, attempts, \
     error_message, platform_post_id, custom_title, custom_description, created_at, updated_at";

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::Database(error.to_string())
    }
}

fn corrupt(entity: &str, id: Uuid, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{entity} {id}: {detail}"))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Debug, FromRow)]
struct VideoRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: Option<String>,
    file_name: String,
    storage_path: String,
    size_bytes: Option<i64>,
    duration_seconds: Option<f64>,
    width: Option<i32>,
    height: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            file_name: row.file_name,
            storage_path: row.storage_path,
            size_bytes: row.size_bytes.and_then(|v| u64::try_from(v).ok()),
            duration_seconds: row.duration_seconds,
            width: row.width.and_then(|v| u32::try_from(v).ok()),
            height: row.height.and_then(|v| u32::try_from(v).ok()),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    user_id: Uuid,
    platform: String,
    username: String,
    platform_user_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for SocialAccount {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(SocialAccount {
            platform: row
                .platform
                .parse()
                .map_err(|e| corrupt("social_account", row.id, e))?,
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            platform_user_id: row.platform_user_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    user_id: Uuid,
    video_id: Uuid,
    title: String,
    description: Option<String>,
    targets: Json<Vec<PublishTarget>>,
    status: String,
    schedule_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for PublishingJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(PublishingJob {
            status: row
                .status
                .parse()
                .map_err(|e| corrupt("publishing_job", row.id, e))?,
            id: row.id,
            user_id: row.user_id,
            video_id: row.video_id,
            title: row.title,
            description: row.description,
            targets: row.targets.0,
            schedule_time: row.schedule_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    job_id: Uuid,
    video_id: Uuid,
    social_account_id: Uuid,
    platform: String,
    status: String,
    attempts: i32,
    error_message: Option<String>,
    platform_post_id: Option<String>,
    custom_title: Option<String>,
    custom_description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for PublishingTask {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(PublishingTask {
            platform: row
                .platform
                .parse()
                .map_err(|e| corrupt("publishing_task", row.id, e))?,
            status: row
                .status
                .parse()
                .map_err(|e| corrupt("publishing_task", row.id, e))?,
            attempts: u32::try_from(row.attempts)
                .map_err(|e| corrupt("publishing_task", row.id, e))?,
            id: row.id,
            job_id: row.job_id,
            video_id: row.video_id,
            social_account_id: row.social_account_id,
            error_message: row.error_message,
            platform_post_id: row.platform_post_id,
            custom_title: row.custom_title,
            custom_description: row.custom_description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn attempts_to_db(attempts: u32) -> i32 {
    i32::try_from(attempts).unwrap_or(i32::MAX)
}

#[derive(Debug, Clone)]
pub struct PgPublishingStore {
    pool: PgPool,
}

impl PgPublishingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool using the database configuration
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        info!(
            max_connections = config.max_connections,
            "💾 Connected publishing store to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        debug!("Publishing schema migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PublishingStore for PgPublishingStore {
    async fn insert_video(&self, video: &Video) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO videos ({VIDEO_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(video.id)
        .bind(video.user_id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.file_name)
        .bind(&video.storage_path)
        .bind(video.size_bytes.map(|v| i64::try_from(v).unwrap_or(i64::MAX)))
        .bind(video.duration_seconds)
        .bind(video.width.map(|v| i32::try_from(v).unwrap_or(i32::MAX)))
        .bind(video.height.map(|v| i32::try_from(v).unwrap_or(i32::MAX)))
        .bind(video.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate {
                    entity: "video",
                    id: video.id,
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn get_video(&self, id: Uuid) -> StoreResult<Option<Video>> {
        let row = sqlx::query_as::<_, VideoRow>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Video::from))
    }

    async fn insert_social_account(&self, account: &SocialAccount) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO social_accounts ({ACCOUNT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(account.id)
        .bind(account.user_id)
        .bind(account.platform.as_str())
        .bind(&account.username)
        .bind(&account.platform_user_id)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate {
                    entity: "social_account",
                    id: account.id,
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn get_social_account(&self, id: Uuid) -> StoreResult<Option<SocialAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM social_accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SocialAccount::try_from).transpose()
    }

    async fn create_job(&self, job: &PublishingJob, tasks: &[PublishingTask]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO publishing_jobs ({JOB_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(job.id)
        .bind(job.user_id)
        .bind(job.video_id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(Json(&job.targets))
        .bind(job.status.to_string())
        .bind(job.schedule_time)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&mut *tx)
        .await?;

        for task in tasks {
            sqlx::query(&format!(
                "INSERT INTO publishing_tasks ({TASK_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
            ))
            .bind(task.id)
            .bind(task.job_id)
            .bind(task.video_id)
            .bind(task.social_account_id)
            .bind(task.platform.as_str())
            .bind(task.status.to_string())
            .bind(attempts_to_db(task.attempts))
            .bind(&task.error_message)
            .bind(&task.platform_post_id)
            .bind(&task.custom_title)
            .bind(&task.custom_description)
            .bind(task.created_at)
            .bind(task.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(job_id = %job.id, task_count = tasks.len(), "💾 Publishing job persisted");
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<PublishingJob>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM publishing_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PublishingJob::try_from).transpose()
    }

    async fn list_jobs_for_user(&self, user_id: Uuid) -> StoreResult<Vec<PublishingJob>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM publishing_jobs WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PublishingJob::try_from).collect()
    }

    async fn update_job_status_if(
        &self,
        id: Uuid,
        expected: JobStatus,
        status: JobStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE publishing_jobs SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(status.to_string())
        .bind(expected.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM publishing_jobs WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(StoreError::not_found("publishing_job", id));
        }
        Ok(false)
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<PublishingTask>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM publishing_tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PublishingTask::try_from).transpose()
    }

    async fn list_job_tasks(&self, job_id: Uuid) -> StoreResult<Vec<PublishingTask>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM publishing_tasks WHERE job_id = $1 ORDER BY created_at, id"
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PublishingTask::try_from).collect()
    }

    async fn transition_task(
        &self,
        task_id: Uuid,
        transition: &TaskTransition,
    ) -> StoreResult<PublishingTask> {
        let attempts = attempts_to_db(transition.attempts);
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE publishing_tasks \
             SET status = $3, attempts = $4, error_message = $5, platform_post_id = $6, \
                 updated_at = NOW() \
             WHERE id = $1 AND status = $2 AND attempts <= $4 \
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(task_id)
        .bind(transition.from.to_string())
        .bind(transition.to.to_string())
        .bind(attempts)
        .bind(&transition.error_message)
        .bind(&transition.platform_post_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return PublishingTask::try_from(row);
        }

        // Nothing matched: report why
        let current = self
            .get_task(task_id)
            .await?
            .ok_or_else(|| StoreError::not_found("publishing_task", task_id))?;
        if current.status != transition.from {
            return Err(StoreError::Conflict {
                task_id,
                expected: transition.from,
                actual: current.status,
            });
        }
        Err(StateMachineError::AttemptsRegression {
            task_id: task_id.to_string(),
            current: current.attempts,
            proposed: transition.attempts,
        }
        .into())
    }

    fn store_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use crate::state_machine::TaskStatus;

    fn task_row(platform: &str, status: &str, attempts: i32) -> TaskRow {
        let now = Utc::now();
        TaskRow {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            social_account_id: Uuid::new_v4(),
            platform: platform.to_string(),
            status: status.to_string(),
            attempts,
            error_message: None,
            platform_post_id: Some("post-1".to_string()),
            custom_title: Some("Custom".to_string()),
            custom_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_task_row_conversion() {
        let task = PublishingTask::try_from(task_row("tiktok", "published", 2)).unwrap();
        assert_eq!(task.platform, Platform::TikTok);
        assert_eq!(task.status, TaskStatus::Published);
        assert_eq!(task.attempts, 2);
        assert_eq!(task.custom_title.as_deref(), Some("Custom"));
    }

    #[test]
    fn test_corrupt_task_rows_are_rejected() {
        for row in [
            task_row("myspace", "pending", 0),
            task_row("youtube", "queued", 0),
            task_row("youtube", "pending", -1),
        ] {
            let err = PublishingTask::try_from(row).unwrap_err();
            assert!(matches!(err, StoreError::Corrupt(_)), "got {err:?}");
        }
    }

    #[test]
    fn test_video_row_drops_negative_dimensions() {
        let row = VideoRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Clip".to_string(),
            description: None,
            file_name: "clip.mp4".to_string(),
            storage_path: "uploads/clip.mp4".to_string(),
            size_bytes: Some(1024),
            duration_seconds: Some(12.5),
            width: Some(-1),
            height: Some(1920),
            created_at: Utc::now(),
        };
        let video = Video::from(row);
        assert_eq!(video.size_bytes, Some(1024));
        assert_eq!(video.width, None);
        assert_eq!(video.height, Some(1920));
    }

    #[test]
    fn test_attempts_saturate_on_write() {
        assert_eq!(attempts_to_db(3), 3);
        assert_eq!(attempts_to_db(u32::MAX), i32::MAX);
    }
}
