// State machine module for publishing task orchestration
//
// Pure transition rules for publishing tasks plus the task and job status
// enums. Persistence of a planned transition is the store's job.

pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use states::{JobStatus, TaskStatus};
pub use task_state_machine::{TaskStateMachine, TaskTransition};
