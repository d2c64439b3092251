//! # Platform Uploader Contract
//!
//! The orchestrator only ever sees uploaders through [`PlatformUploader`].
//! Implementations own their HTTP clients, auth-token acquisition and I/O
//! timeouts; they report every failure as a [`PublishingError`], normally
//! built with the helpers in [`crate::orchestration::error_classifier`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::video_validator::{validate_video, VideoRequirements};
use crate::models::{Platform, PublishingTask, SocialAccount, Video};
use crate::orchestration::errors::PublishingError;

/// Everything an uploader needs for one attempt
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub task: PublishingTask,
    pub video: Video,
    pub account: SocialAccount,
    pub custom_title: Option<String>,
    pub custom_description: Option<String>,
    /// Honored by the uploader; dispatch is never delayed for it
    pub schedule_time: Option<DateTime<Utc>>,
}

impl UploadContext {
    pub fn new(task: PublishingTask, video: Video, account: SocialAccount) -> Self {
        Self {
            custom_title: task.custom_title.clone(),
            custom_description: task.custom_description.clone(),
            task,
            video,
            account,
            schedule_time: None,
        }
    }

    pub fn with_schedule_time(mut self, schedule_time: Option<DateTime<Utc>>) -> Self {
        self.schedule_time = schedule_time;
        self
    }

    pub fn platform(&self) -> Platform {
        self.task.platform
    }

    /// Custom title if set, else the video's own
    pub fn title(&self) -> &str {
        self.custom_title.as_deref().unwrap_or(&self.video.title)
    }

    pub fn description(&self) -> Option<&str> {
        self.custom_description
            .as_deref()
            .or(self.video.description.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub platform_post_id: String,
}

impl UploadResult {
    pub fn new(platform_post_id: impl Into<String>) -> Self {
        Self {
            platform_post_id: platform_post_id.into(),
        }
    }
}

#[async_trait]
pub trait PlatformUploader: Send + Sync + std::fmt::Debug {
    fn platform(&self) -> Platform;

    fn requirements(&self) -> VideoRequirements {
        VideoRequirements::for_platform(self.platform())
    }

    /// Local pre-upload checks; failures are `VideoValidation`
    fn validate(
        &self,
        video: &Video,
        requirements: &VideoRequirements,
    ) -> Result<(), PublishingError> {
        validate_video(self.platform(), video, requirements)
    }

    async fn upload(&self, context: &UploadContext) -> Result<UploadResult, PublishingError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Debug)]
    struct NoopUploader;

    #[async_trait]
    impl PlatformUploader for NoopUploader {
        fn platform(&self) -> Platform {
            Platform::Instagram
        }

        async fn upload(&self, context: &UploadContext) -> Result<UploadResult, PublishingError> {
            Ok(UploadResult::new(format!("ig-{}", context.task.id)))
        }
    }

    fn context(custom_title: Option<&str>) -> UploadContext {
        let user_id = Uuid::new_v4();
        let mut video = Video::new(user_id, "Original", "clip.mp4");
        video.description = Some("Original description".to_string());
        let account = SocialAccount::new(user_id, Platform::Instagram, "studio");
        let task = PublishingTask::new(Uuid::new_v4(), video.id, &account)
            .with_overrides(custom_title.map(str::to_string), None);
        UploadContext::new(task, video, account)
    }

    #[test]
    fn test_custom_title_wins() {
        let ctx = context(Some("Reel cut"));
        assert_eq!(ctx.title(), "Reel cut");
        assert_eq!(ctx.description(), Some("Original description"));

        let ctx = context(None);
        assert_eq!(ctx.title(), "Original");
    }

    #[tokio::test]
    async fn test_default_validation_uses_platform_requirements() {
        let uploader = NoopUploader;
        let ctx = context(None);
        let requirements = uploader.requirements();
        assert_eq!(requirements, VideoRequirements::for_platform(Platform::Instagram));
        assert!(uploader.validate(&ctx.video, &requirements).is_ok());

        let result = uploader.upload(&ctx).await.unwrap();
        assert!(result.platform_post_id.starts_with("ig-"));
    }
}
