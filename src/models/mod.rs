pub mod job;
pub mod platform;
pub mod social_account;
pub mod task;
pub mod video;

// Re-export core models for easy access
pub use job::{PublishTarget, PublishingJob};
pub use platform::Platform;
pub use social_account::SocialAccount;
pub use task::PublishingTask;
pub use video::Video;
