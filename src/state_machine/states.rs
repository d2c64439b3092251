use serde::{Deserialize, Serialize};
use std::fmt;

/// Publishing task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial state when the task is created
    #[default]
    Pending,
    /// An upload cycle is in flight
    Uploading,
    /// Upload succeeded and the platform returned a post id
    Published,
    /// Last cycle failed with a retryable error; redelivery is scheduled
    Retrying,
    /// Permanent failure
    Failed,
}

impl TaskStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    /// States that still count as outstanding work for the job
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending | Self::Uploading | Self::Retrying)
    }

    /// States a delivered task reference may start a processing cycle from
    pub fn is_processable(&self) -> bool {
        matches!(self, Self::Pending | Self::Retrying)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Uploading => write!(f, "uploading"),
            Self::Published => write!(f, "published"),
            Self::Retrying => write!(f, "retrying"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "uploading" => Ok(Self::Uploading),
            "published" => Ok(Self::Published),
            "retrying" => Ok(Self::Retrying),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// Aggregate job states, derived from the job's task statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, no task outcome recorded yet
    #[default]
    Pending,
    /// At least one task is still outstanding
    Processing,
    /// Every task published
    Completed,
    /// Every task failed
    Failed,
    /// All tasks settled with a mix of published and failed
    PartiallyCompleted,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::PartiallyCompleted
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::PartiallyCompleted => write!(f, "partially_completed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "partially_completed" => Ok(Self::PartiallyCompleted),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_classification() {
        assert!(TaskStatus::Published.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Retrying.is_terminal());

        assert!(TaskStatus::Pending.is_processable());
        assert!(TaskStatus::Retrying.is_processable());
        assert!(!TaskStatus::Uploading.is_processable());
        assert!(!TaskStatus::Published.is_processable());

        assert!(TaskStatus::Uploading.is_pending());
        assert!(!TaskStatus::Failed.is_pending());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Uploading,
            TaskStatus::Published,
            TaskStatus::Retrying,
            TaskStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<TaskStatus>().unwrap(), status);
        }
        assert_eq!(
            "partially_completed".parse::<JobStatus>().unwrap(),
            JobStatus::PartiallyCompleted
        );
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&JobStatus::PartiallyCompleted).unwrap();
        assert_eq!(json, "\"partially_completed\"");
    }
}
