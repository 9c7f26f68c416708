//! Task orchestration
//!
//! Periodic tasks are registered with an [`Orchestrator`], which arms one
//! timer per task and runs every firing through the task's circuit breaker
//! and load gate before invoking the body.

pub mod orchestrator;
pub mod schedule;
pub mod task;

pub use orchestrator::{ExecutionOutcome, Orchestrator, TaskSnapshot};
pub use schedule::{parse_schedule, CronSchedule, IntervalSchedule, Schedule};
pub use task::{validate_task_id, TaskDefinition, TaskFn, MAX_TASK_ID_LEN};
