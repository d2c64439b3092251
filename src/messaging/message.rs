//! Queue payload for publishing work.

use crate::models::PublishingTask;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::MessagingResult;

/// Reference to one publishing task.
///
/// Only `task_id` is authoritative; the lifecycle manager resolves the rest
/// against the store. The denormalized fields travel with the message so
/// that redeliveries keep the per-task overrides visible to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishingTaskMessage {
    pub task_id: Uuid,
    pub video_id: Uuid,
    pub social_account_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_description: Option<String>,
    #[serde(default)]
    pub attempts: u32,
}

impl PublishingTaskMessage {
    /// Build the message for a task in its current state
    pub fn from_task(task: &PublishingTask) -> Self {
        Self {
            task_id: task.id,
            video_id: task.video_id,
            social_account_id: task.social_account_id,
            custom_title: task.custom_title.clone(),
            custom_description: task.custom_description.clone(),
            attempts: task.attempts,
        }
    }

    pub fn to_bytes(&self) -> MessagingResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> MessagingResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
