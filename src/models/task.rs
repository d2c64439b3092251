//! # Publishing Task Model
//!
//! One (video, social account, platform) unit of work owned by a job.
//!
//! Tasks are created in `pending` with zero attempts and are afterwards
//! mutated only by the task lifecycle manager. `attempts` counts the
//! processing cycles that reached the upload step and never decreases;
//! `platform_post_id` is present only once the task is `published`.

use super::{Platform, SocialAccount};
use crate::state_machine::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishingTask {
    pub id: Uuid,
    pub job_id: Uuid,
    pub video_id: Uuid,
    pub social_account_id: Uuid,
    pub platform: Platform,
    pub status: TaskStatus,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub platform_post_id: Option<String>,
    pub custom_title: Option<String>,
    pub custom_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishingTask {
    /// Create a pending task targeting `account`
    pub fn new(job_id: Uuid, video_id: Uuid, account: &SocialAccount) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id,
            video_id,
            social_account_id: account.id,
            platform: account.platform,
            status: TaskStatus::Pending,
            attempts: 0,
            error_message: None,
            platform_post_id: None,
            custom_title: None,
            custom_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_overrides(
        mut self,
        custom_title: Option<String>,
        custom_description: Option<String>,
    ) -> Self {
        self.custom_title = custom_title;
        self.custom_description = custom_description;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
