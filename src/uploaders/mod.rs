//! # Uploaders
//!
//! The per-platform upload contract and the shared pre-upload validator.
//! Concrete uploaders live with the application that owns the platform
//! credentials; this crate dispatches to them through
//! [`crate::registry::UploaderRegistry`].

pub mod traits;
pub mod video_validator;

pub use traits::{PlatformUploader, UploadContext, UploadResult};
pub use video_validator::{validate_video, AspectRatio, VideoRequirements, ASPECT_RATIO_TOLERANCE};
