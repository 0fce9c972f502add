// src/dag/task_info.rs

//! Per-run task state.

use crate::engine::TaskName;

/// Per-run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// Waiting on dependencies.
    Pending,
    /// Action dispatched and not finished yet.
    Running,
    Succeeded,
    Failed,
    /// Not started because a dependency failed.
    Blocked,
    /// Not started because the run was halted by an unrelated failure.
    Skipped,
}

impl TaskRunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskRunState::Pending | TaskRunState::Running)
    }
}

/// A task participating in one run.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    /// Direct dependencies (all of which are in the same run).
    pub deps: Vec<TaskName>,
    pub state: TaskRunState,
}

impl TaskInfo {
    pub fn new(name: TaskName, deps: Vec<TaskName>) -> Self {
        Self {
            name,
            deps,
            state: TaskRunState::Pending,
        }
    }
}
