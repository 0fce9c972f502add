// src/dag/mod.rs

//! Task registry and per-run scheduling.
//!
//! - [`graph`] holds the named tasks, resolves dependency closures and
//!   detects cycles.
//! - [`scheduler`] is the per-run state machine that decides which tasks
//!   are ready.
//! - [`task_info`] provides per-run task state.

pub mod graph;
pub mod scheduler;
pub mod task_info;

pub use graph::{TaskDef, TaskGraph};
pub use scheduler::{Scheduler, SchedulerStep};
pub use task_info::TaskRunState;
