//! # Publishing Job Model
//!
//! A job is one user request to publish a single video to a set of accounts.
//! Its `status` is derived from the statuses of its tasks by the job
//! aggregator and is never assigned directly by callers.

use super::Platform;
use crate::state_machine::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One requested (account, platform) destination for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublishTarget {
    pub social_account_id: Uuid,
    pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishingJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub targets: Vec<PublishTarget>,
    pub status: JobStatus,
    /// Honored by the uploaders, not by dispatch timing
    pub schedule_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishingJob {
    pub fn new(
        user_id: Uuid,
        video_id: Uuid,
        title: impl Into<String>,
        targets: Vec<PublishTarget>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            video_id,
            title: title.into(),
            description: None,
            targets,
            status: JobStatus::default(),
            schedule_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_schedule_time(mut self, schedule_time: Option<DateTime<Utc>>) -> Self {
        self.schedule_time = schedule_time;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
