use super::{
    errors::{invalid_transition, StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskStatus,
};
use crate::models::PublishingTask;
use serde::{Deserialize, Serialize};

/// Field values a task takes on after a transition.
///
/// Produced by [`TaskStateMachine::plan`] and applied by the store together
/// with an optimistic check on `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub event_type: String,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub platform_post_id: Option<String>,
}

/// Pure transition rules for publishing tasks
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskStateMachine;

impl TaskStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: TaskStatus,
        event: &TaskEvent,
    ) -> StateMachineResult<TaskStatus> {
        let target = match (current_state, event) {
            // Start transitions
            (TaskStatus::Pending, TaskEvent::Start) => TaskStatus::Uploading,
            (TaskStatus::Retrying, TaskEvent::Start) => TaskStatus::Uploading,

            // Upload outcomes
            (TaskStatus::Uploading, TaskEvent::Publish(_)) => TaskStatus::Published,
            (TaskStatus::Uploading, TaskEvent::RateLimited(_)) => TaskStatus::Retrying,
            (TaskStatus::Uploading, TaskEvent::Retry(_)) => TaskStatus::Retrying,

            // Failure is reachable from every non-terminal state
            (TaskStatus::Pending, TaskEvent::Fail(_)) => TaskStatus::Failed,
            (TaskStatus::Uploading, TaskEvent::Fail(_)) => TaskStatus::Failed,
            (TaskStatus::Retrying, TaskEvent::Fail(_)) => TaskStatus::Failed,

            // Invalid transitions
            (from_state, _) => {
                return Err(invalid_transition(from_state, event.event_type()));
            }
        };

        Ok(target)
    }

    /// Compute the full transition for `task` under `event`.
    ///
    /// `Start` increments `attempts`; every other event keeps it. Failure
    /// events replace `error_message`; `Publish` records the post id and
    /// clears the last error.
    pub fn plan(task: &PublishingTask, event: &TaskEvent) -> StateMachineResult<TaskTransition> {
        if task.status.is_terminal() {
            return Err(StateMachineError::TerminalState {
                task_id: task.id.to_string(),
                state: task.status.to_string(),
            });
        }

        let to = Self::determine_target_state(task.status, event)?;

        let (attempts, error_message, platform_post_id) = match event {
            TaskEvent::Start => (
                task.attempts.saturating_add(1),
                task.error_message.clone(),
                None,
            ),
            TaskEvent::Publish(post_id) => (task.attempts, None, Some(post_id.clone())),
            TaskEvent::RateLimited(msg) | TaskEvent::Retry(msg) | TaskEvent::Fail(msg) => {
                (task.attempts, Some(msg.clone()), None)
            }
        };

        Ok(TaskTransition {
            from: task.status,
            to,
            event_type: event.event_type().to_string(),
            attempts,
            error_message,
            platform_post_id,
        })
    }
}
