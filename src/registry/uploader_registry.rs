//! # Uploader Registry
//!
//! Static `Platform -> uploader` dispatch, resolved once at start-up.
//!
//! The builder refuses to produce a registry unless every [`Platform`] has
//! exactly one uploader, which makes [`UploaderRegistry::get`] infallible for
//! the rest of the process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = UploaderRegistry::builder()
//!     .register(Arc::new(YouTubeUploader::new(client.clone())))
//!     .register(Arc::new(FacebookReelsUploader::new(client.clone())))
//!     .register(Arc::new(InstagramReelsUploader::new(client.clone())))
//!     .register(Arc::new(TikTokUploader::new(client)))
//!     .build()?;
//!
//! let uploader = registry.get(task.platform);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::models::Platform;
use crate::uploaders::PlatformUploader;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No uploader registered for platform: {0}")]
    MissingUploader(Platform),

    #[error("More than one uploader registered for platform: {0}")]
    DuplicateUploader(Platform),
}

#[derive(Debug, Clone)]
pub struct UploaderRegistry {
    youtube: Arc<dyn PlatformUploader>,
    facebook: Arc<dyn PlatformUploader>,
    instagram: Arc<dyn PlatformUploader>,
    tiktok: Arc<dyn PlatformUploader>,
}

impl UploaderRegistry {
    pub fn builder() -> UploaderRegistryBuilder {
        UploaderRegistryBuilder::default()
    }

    pub fn get(&self, platform: Platform) -> &Arc<dyn PlatformUploader> {
        match platform {
            Platform::YouTube => &self.youtube,
            Platform::Facebook => &self.facebook,
            Platform::Instagram => &self.instagram,
            Platform::TikTok => &self.tiktok,
        }
    }
}

#[derive(Debug, Default)]
pub struct UploaderRegistryBuilder {
    uploaders: HashMap<Platform, Arc<dyn PlatformUploader>>,
    duplicates: Vec<Platform>,
}

impl UploaderRegistryBuilder {
    /// Register an uploader under the platform it reports
    pub fn register(mut self, uploader: Arc<dyn PlatformUploader>) -> Self {
        let platform = uploader.platform();
        if self.uploaders.insert(platform, uploader).is_some() {
            self.duplicates.push(platform);
        }
        self
    }

    pub fn build(mut self) -> Result<UploaderRegistry, RegistryError> {
        if let Some(platform) = self.duplicates.first() {
            return Err(RegistryError::DuplicateUploader(*platform));
        }

        let mut take = |platform: Platform| {
            self.uploaders
                .remove(&platform)
                .ok_or(RegistryError::MissingUploader(platform))
        };
        let registry = UploaderRegistry {
            youtube: take(Platform::YouTube)?,
            facebook: take(Platform::Facebook)?,
            instagram: take(Platform::Instagram)?,
            tiktok: take(Platform::TikTok)?,
        };

        info!(platforms = Platform::ALL.len(), "🔧 Uploader registry built");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::errors::PublishingError;
    use crate::uploaders::{UploadContext, UploadResult};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct StaticUploader(Platform);

    #[async_trait]
    impl PlatformUploader for StaticUploader {
        fn platform(&self) -> Platform {
            self.0
        }

        async fn upload(&self, _context: &UploadContext) -> Result<UploadResult, PublishingError> {
            Ok(UploadResult::new(format!("{}-post", self.0)))
        }
    }

    fn full_builder() -> UploaderRegistryBuilder {
        Platform::ALL
            .into_iter()
            .fold(UploaderRegistry::builder(), |builder, platform| {
                builder.register(Arc::new(StaticUploader(platform)))
            })
    }

    #[test]
    fn test_every_platform_resolves_to_its_uploader() {
        let registry = full_builder().build().unwrap();
        for platform in Platform::ALL {
            assert_eq!(registry.get(platform).platform(), platform);
        }
    }

    #[test]
    fn test_missing_platform_is_rejected() {
        let err = UploaderRegistry::builder()
            .register(Arc::new(StaticUploader(Platform::YouTube)))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::MissingUploader(Platform::Facebook));
    }

    #[test]
    fn test_duplicate_platform_is_rejected() {
        let err = full_builder()
            .register(Arc::new(StaticUploader(Platform::TikTok)))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateUploader(Platform::TikTok));
    }
}
