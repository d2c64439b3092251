use crate::config::ConfigurationError;
use crate::database::StoreError;
use crate::messaging::MessagingError;
use crate::orchestration::batch_publisher::BatchError;
use crate::orchestration::errors::{LifecycleError, PublishingError};
use crate::registry::RegistryError;
use crate::state_machine::StateMachineError;
use thiserror::Error;

/// Crate-wide error for callers that drive several components at once
#[derive(Error, Debug)]
pub enum PublisherError {
    #[error("Publishing error: {0}")]
    Publishing(#[from] PublishingError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, PublisherError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use crate::registry::UploaderRegistry;
    use uuid::Uuid;

    fn build_registry() -> Result<UploaderRegistry> {
        Ok(UploaderRegistry::builder().build()?)
    }

    #[test]
    fn test_component_errors_convert_with_question_mark() {
        let err = build_registry().unwrap_err();
        assert!(matches!(
            err,
            PublisherError::Registry(RegistryError::MissingUploader(Platform::YouTube))
        ));
        assert!(err.to_string().starts_with("Registry error:"));
    }

    #[test]
    fn test_lifecycle_and_publishing_errors_keep_their_message() {
        let task_id = Uuid::new_v4();
        let err: PublisherError = LifecycleError::TaskNotFound(task_id).into();
        assert_eq!(
            err.to_string(),
            format!("Lifecycle error: Task not found: {task_id}")
        );

        let err: PublisherError = PublishingError::network(Platform::TikTok, "reset").into();
        assert_eq!(err.to_string(), "Publishing error: [tiktok] reset");
    }
}
