use super::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A connected account on one platform. Credentials live with the uploader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub username: String,
    pub platform_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SocialAccount {
    pub fn new(user_id: Uuid, platform: Platform, username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            platform,
            username: username.into(),
            platform_user_id: None,
            created_at: Utc::now(),
        }
    }
}
