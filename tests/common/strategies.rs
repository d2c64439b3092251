use proptest::prelude::*;
use publishing_core::models::Platform;
use publishing_core::state_machine::{TaskEvent, TaskStatus};
use std::time::Duration;

pub fn platform_strategy() -> impl Strategy<Value = Platform> {
    prop::sample::select(Platform::ALL.to_vec())
}

pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Pending),
        Just(TaskStatus::Uploading),
        Just(TaskStatus::Published),
        Just(TaskStatus::Retrying),
        Just(TaskStatus::Failed),
    ]
}

/// Task status multisets as a job could hold them
pub fn task_statuses_strategy() -> impl Strategy<Value = Vec<TaskStatus>> {
    prop::collection::vec(task_status_strategy(), 0..12)
}

pub fn task_event_strategy() -> impl Strategy<Value = TaskEvent> {
    let message = "[a-z ]{1,20}";
    prop_oneof![
        Just(TaskEvent::Start),
        message.prop_map(TaskEvent::RateLimited),
        "[a-z0-9-]{1,16}".prop_map(TaskEvent::Publish),
        message.prop_map(TaskEvent::Retry),
        message.prop_map(TaskEvent::Fail),
    ]
}

pub fn task_events_strategy() -> impl Strategy<Value = Vec<TaskEvent>> {
    prop::collection::vec(task_event_strategy(), 1..24)
}

/// (base_delay_ms, max_delay_ms, multiplier) for backoff checks
pub fn backoff_strategy() -> impl Strategy<Value = (Duration, Duration, f64)> {
    (1u64..5_000, 1u64..120_000, 1.0f64..4.0).prop_map(|(base, extra, multiplier)| {
        (
            Duration::from_millis(base),
            Duration::from_millis(base + extra),
            multiplier,
        )
    })
}
