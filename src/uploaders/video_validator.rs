//! # Video Validator
//!
//! Per-platform upload constraints and the pre-upload check every uploader
//! runs by default. Checks run in a fixed order (size, duration, format,
//! resolution, aspect ratio) and the first failure is reported as a
//! non-retryable `VideoValidation` error. Metadata the media scan did not capture
//! skips the matching check; the file extension is always checked.

use crate::models::{Platform, Video};
use crate::orchestration::error_classifier::validation_failure;
use crate::orchestration::errors::PublishingError;
use serde::Serialize;

/// Allowed distance between the video's ratio and a required ratio
pub const ASPECT_RATIO_TOLERANCE: f64 = 0.05;

/// Width to height ratio such as 9:16
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const VERTICAL: AspectRatio = AspectRatio::new(9, 16);
    pub const SQUARE: AspectRatio = AspectRatio::new(1, 1);
    pub const HORIZONTAL: AspectRatio = AspectRatio::new(16, 9);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn value(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    fn label(&self) -> String {
        match *self {
            Self::VERTICAL => "9:16 (vertical)".to_string(),
            Self::SQUARE => "1:1 (square)".to_string(),
            Self::HORIZONTAL => "16:9 (horizontal)".to_string(),
            other => format!("{:.2}", other.value()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRequirements {
    pub max_file_size_mb: f64,
    pub min_duration_seconds: f64,
    pub max_duration_seconds: f64,
    pub supported_formats: &'static [&'static str],
    /// `(width, height)`
    pub max_resolution: Option<(u32, u32)>,
    pub min_resolution: Option<(u32, u32)>,
    /// Empty means any ratio is accepted
    pub aspect_ratios: Vec<AspectRatio>,
}

impl VideoRequirements {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::YouTube => Self {
                max_file_size_mb: 128_000.0,
                min_duration_seconds: 1.0,
                max_duration_seconds: 12.0 * 60.0 * 60.0,
                supported_formats: &["mp4", "mov", "avi", "wmv", "flv", "webm"],
                max_resolution: Some((7680, 4320)),
                min_resolution: None,
                aspect_ratios: vec![AspectRatio::VERTICAL],
            },
            Platform::Facebook => Self {
                max_file_size_mb: 10_240.0,
                min_duration_seconds: 3.0,
                max_duration_seconds: 90.0,
                supported_formats: &["mp4", "mov"],
                max_resolution: Some((1920, 1080)),
                min_resolution: None,
                aspect_ratios: vec![AspectRatio::VERTICAL, AspectRatio::SQUARE],
            },
            Platform::Instagram => Self {
                max_file_size_mb: 1_024.0,
                min_duration_seconds: 3.0,
                max_duration_seconds: 90.0,
                supported_formats: &["mp4", "mov"],
                max_resolution: Some((1920, 1080)),
                min_resolution: None,
                aspect_ratios: vec![AspectRatio::VERTICAL, AspectRatio::SQUARE],
            },
            Platform::TikTok => Self {
                max_file_size_mb: 287.0,
                min_duration_seconds: 3.0,
                max_duration_seconds: 180.0,
                supported_formats: &["mp4", "mov"],
                max_resolution: Some((1080, 1920)),
                min_resolution: None,
                aspect_ratios: vec![AspectRatio::VERTICAL],
            },
        }
    }
}

/// Check `video` against `requirements`, reporting the first violation
pub fn validate_video(
    platform: Platform,
    video: &Video,
    requirements: &VideoRequirements,
) -> Result<(), PublishingError> {
    if let Some(size_mb) = video.size_mb() {
        if size_mb > requirements.max_file_size_mb {
            return Err(validation_failure(
                platform,
                format!(
                    "File size {size_mb:.2}MB exceeds maximum of {}MB",
                    requirements.max_file_size_mb
                ),
            ));
        }
    }

    if let Some(duration) = video.duration_seconds {
        if duration > requirements.max_duration_seconds {
            return Err(validation_failure(
                platform,
                format!(
                    "Duration {duration}s exceeds maximum of {}s",
                    requirements.max_duration_seconds
                ),
            ));
        }
        if duration < requirements.min_duration_seconds {
            return Err(validation_failure(
                platform,
                format!(
                    "Duration {duration}s is below minimum of {}s",
                    requirements.min_duration_seconds
                ),
            ));
        }
    }

    let extension = video.extension().unwrap_or_default();
    if !requirements.supported_formats.contains(&extension.as_str()) {
        return Err(validation_failure(
            platform,
            format!(
                "Format '{extension}' not supported. Supported formats: {}",
                requirements.supported_formats.join(", ")
            ),
        ));
    }

    if let (Some(width), Some(height)) = (video.width, video.height) {
        if let Some((max_w, max_h)) = requirements.max_resolution {
            if width > max_w || height > max_h {
                return Err(validation_failure(
                    platform,
                    format!("Resolution {width}x{height} exceeds maximum of {max_w}x{max_h}"),
                ));
            }
        }
        if let Some((min_w, min_h)) = requirements.min_resolution {
            if width < min_w || height < min_h {
                return Err(validation_failure(
                    platform,
                    format!("Resolution {width}x{height} is below minimum of {min_w}x{min_h}"),
                ));
            }
        }

        if let Some(ratio) = video.aspect_ratio() {
            let accepted = requirements.aspect_ratios.is_empty()
                || requirements
                    .aspect_ratios
                    .iter()
                    .any(|required| (ratio - required.value()).abs() <= ASPECT_RATIO_TOLERANCE);
            if !accepted {
                let expected: Vec<String> =
                    requirements.aspect_ratios.iter().map(AspectRatio::label).collect();
                return Err(validation_failure(
                    platform,
                    format!(
                        "Aspect ratio {ratio:.2} not supported. Expected: {}",
                        expected.join(", ")
                    ),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::errors::PublishingErrorKind;
    use uuid::Uuid;

    fn vertical_clip(file_name: &str) -> Video {
        let mut video = Video::new(Uuid::new_v4(), "Clip", file_name);
        video.size_bytes = Some(50 * 1024 * 1024);
        video.duration_seconds = Some(30.0);
        // Facebook and Instagram cap height at 1080
        video.width = Some(608);
        video.height = Some(1080);
        video
    }

    fn check(platform: Platform, video: &Video) -> Result<(), PublishingError> {
        validate_video(platform, video, &VideoRequirements::for_platform(platform))
    }

    #[test]
    fn test_vertical_clip_passes_everywhere() {
        let video = vertical_clip("clip.mp4");
        for platform in Platform::ALL {
            assert!(check(platform, &video).is_ok(), "{platform} rejected clip");
        }
    }

    #[test]
    fn test_unknown_metadata_only_checks_format() {
        let video = Video::new(Uuid::new_v4(), "Clip", "clip.MOV");
        assert!(check(Platform::TikTok, &video).is_ok());

        let no_ext = Video::new(Uuid::new_v4(), "Clip", "clip");
        assert!(check(Platform::TikTok, &no_ext).is_err());
    }

    #[test]
    fn test_first_failure_is_reported() {
        // Too long and wrong format: duration is checked first
        let mut video = vertical_clip("clip.avi");
        video.duration_seconds = Some(200.0);

        let err = check(Platform::TikTok, &video).unwrap_err();
        assert!(matches!(err.kind, PublishingErrorKind::VideoValidation));
        assert!(!err.is_retryable());
        assert!(err.message.contains("Duration 200s exceeds maximum of 180s"));
    }

    #[test]
    fn test_size_limit() {
        let mut video = vertical_clip("clip.mp4");
        video.size_bytes = Some(300 * 1024 * 1024);
        let err = check(Platform::TikTok, &video).unwrap_err();
        assert!(err.message.contains("exceeds maximum of 287MB"));
        assert!(check(Platform::Instagram, &video).is_ok());
    }

    #[test]
    fn test_short_video_rejected() {
        let mut video = vertical_clip("clip.mp4");
        video.duration_seconds = Some(2.0);
        assert!(check(Platform::Facebook, &video).is_err());
        assert!(check(Platform::YouTube, &video).is_ok());
    }

    #[test]
    fn test_format_list() {
        let video = vertical_clip("clip.webm");
        assert!(check(Platform::YouTube, &video).is_ok());
        let err = check(Platform::Instagram, &video).unwrap_err();
        assert!(err.message.contains("Supported formats: mp4, mov"));
    }

    #[test]
    fn test_resolution_limit() {
        let mut video = vertical_clip("clip.mp4");
        video.width = Some(2160);
        video.height = Some(3840);
        let err = check(Platform::TikTok, &video).unwrap_err();
        assert!(err.message.contains("Resolution 2160x3840 exceeds maximum of 1080x1920"));
    }

    #[test]
    fn test_aspect_ratio_tolerance() {
        let mut square = vertical_clip("clip.mp4");
        square.width = Some(1080);
        square.height = Some(1080);
        assert!(check(Platform::Instagram, &square).is_ok());

        let err = check(Platform::TikTok, &square).unwrap_err();
        assert!(err.message.contains("Expected: 9:16 (vertical)"));

        // 0.6 is within 0.05 of 0.5625
        let mut near = vertical_clip("clip.mp4");
        near.width = Some(600);
        near.height = Some(1000);
        assert!(check(Platform::TikTok, &near).is_ok());
    }
}
