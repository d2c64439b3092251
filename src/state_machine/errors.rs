use thiserror::Error;

/// State machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Task {task_id} is in terminal state {state}")]
    TerminalState { task_id: String, state: String },

    #[error("Attempts would decrease for task {task_id}: {current} -> {proposed}")]
    AttemptsRegression {
        task_id: String,
        current: u32,
        proposed: u32,
    },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Helper for building an invalid transition error
pub fn invalid_transition(from: impl ToString, event: impl ToString) -> StateMachineError {
    StateMachineError::InvalidTransition {
        from: from.to_string(),
        event: event.to_string(),
    }
}
