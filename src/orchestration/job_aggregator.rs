//! # Job Aggregator
//!
//! Derives a job's status from the statuses of its tasks.
//!
//! The job status is never written by anything else: every time a task
//! reaches a retrying or terminal state the lifecycle manager asks the
//! aggregator to recompute, and the result is persisted only when it differs
//! from what the store already holds. The write is a compare-and-set against
//! the status read in the same round, so a recompute working from an older
//! task list cannot overwrite one that saw newer task outcomes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::lifecycle;
use crate::database::{PublishingStore, StoreError, StoreResult};
use crate::state_machine::{JobStatus, TaskStatus};

/// Task status tallies for one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusCounts {
    pub total: usize,
    pub published: usize,
    pub failed: usize,
    /// PENDING, UPLOADING or RETRYING
    pub pending: usize,
}

impl TaskStatusCounts {
    pub fn from_statuses(statuses: &[TaskStatus]) -> Self {
        statuses.iter().fold(
            Self {
                total: statuses.len(),
                ..Self::default()
            },
            |mut counts, status| {
                match status {
                    TaskStatus::Published => counts.published += 1,
                    TaskStatus::Failed => counts.failed += 1,
                    s if s.is_pending() => counts.pending += 1,
                    _ => {}
                }
                counts
            },
        )
    }

    pub fn job_status(&self) -> JobStatus {
        if self.pending > 0 {
            JobStatus::Processing
        } else if self.published == self.total {
            JobStatus::Completed
        } else if self.failed == self.total {
            JobStatus::Failed
        } else {
            JobStatus::PartiallyCompleted
        }
    }
}

/// Pure job status derivation over a job's task statuses
pub fn compute_job_status(statuses: &[TaskStatus]) -> JobStatus {
    TaskStatusCounts::from_statuses(statuses).job_status()
}

#[derive(Clone)]
pub struct JobAggregator {
    store: Arc<dyn PublishingStore>,
}

impl std::fmt::Debug for JobAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobAggregator")
            .field("store", &self.store.store_name())
            .finish()
    }
}

impl JobAggregator {
    pub fn new(store: Arc<dyn PublishingStore>) -> Self {
        Self { store }
    }

    /// Recompute and persist the status of `job_id`, returning the new value.
    ///
    /// The write is conditional on the status read at the start of the
    /// round. When a concurrent recompute wins, the tasks are re-read and the
    /// derivation runs again against the fresher state.
    pub async fn recompute_job_status(&self, job_id: Uuid) -> StoreResult<JobStatus> {
        let mut last_seen = JobStatus::Pending;
        for round in 1..=lifecycle::JOB_STATUS_WRITE_ATTEMPTS {
            let job = self
                .store
                .get_job(job_id)
                .await?
                .ok_or_else(|| StoreError::not_found("publishing_job", job_id))?;
            last_seen = job.status;

            let tasks = self.store.list_job_tasks(job_id).await?;
            let statuses: Vec<TaskStatus> = tasks.iter().map(|task| task.status).collect();
            let counts = TaskStatusCounts::from_statuses(&statuses);
            let status = counts.job_status();

            if status == job.status {
                debug!(
                    job_id = %job_id,
                    status = %status,
                    "Job status unchanged"
                );
                return Ok(status);
            }

            if !self
                .store
                .update_job_status_if(job_id, job.status, status)
                .await?
            {
                debug!(
                    job_id = %job_id,
                    expected = %job.status,
                    round = round,
                    "Job status changed concurrently, recomputing"
                );
                continue;
            }

            info!(
                job_id = %job_id,
                from = %job.status,
                to = %status,
                total = counts.total,
                published = counts.published,
                failed = counts.failed,
                pending = counts.pending,
                "📊 Job status changed"
            );
            return Ok(status);
        }

        warn!(
            job_id = %job_id,
            last_seen = %last_seen,
            "Gave up recomputing job status after repeated concurrent writes"
        );
        Err(StoreError::JobStatusContention { job_id, last_seen })
    }
}
