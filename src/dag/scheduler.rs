// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::debug;

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::{TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};

/// Result of feeding one event into the [`Scheduler`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Tasks that became ready and are now `Running`.
    pub newly_scheduled: Vec<TaskName>,
    /// Tasks that can no longer run because of this event.
    pub newly_blocked: Vec<TaskName>,
}

/// Per-run state machine over a resolved dependency closure.
///
/// Pure: it never spawns anything, it only decides which tasks are ready.
/// Ready tasks are always reported in closure order, which keeps dispatch
/// deterministic for a given graph.
#[derive(Debug)]
pub struct Scheduler {
    /// Tasks in closure (dependency-first) order.
    order: Vec<TaskName>,
    tasks: HashMap<TaskName, TaskInfo>,
    dependents: HashMap<TaskName, Vec<TaskName>>,
    halted: bool,
}

impl Scheduler {
    /// Build a scheduler for `closure`, as returned by
    /// [`TaskGraph::resolve`].
    pub fn new(graph: &TaskGraph, closure: &[TaskName]) -> Self {
        let mut tasks = HashMap::with_capacity(closure.len());
        let mut dependents: HashMap<TaskName, Vec<TaskName>> = HashMap::new();

        for name in closure {
            let deps = graph.dependencies_of(name).to_vec();
            for dep in &deps {
                dependents.entry(dep.clone()).or_default().push(name.clone());
            }
            tasks.insert(name.clone(), TaskInfo::new(name.clone(), deps));
        }

        Self {
            order: closure.to_vec(),
            tasks,
            dependents,
            halted: false,
        }
    }

    /// Schedule every task with no unfinished dependencies.
    pub fn start(&mut self) -> SchedulerStep {
        SchedulerStep {
            newly_scheduled: self.collect_ready(),
            newly_blocked: Vec::new(),
        }
    }

    /// Record the outcome of a running task.
    pub fn complete(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(info) = self.tasks.get_mut(task) else {
            debug!(task = %task, "completion for task outside this run; ignoring");
            return SchedulerStep::default();
        };

        match outcome {
            TaskOutcome::Success => {
                info.state = TaskRunState::Succeeded;
                SchedulerStep {
                    newly_scheduled: self.collect_ready(),
                    newly_blocked: Vec::new(),
                }
            }
            TaskOutcome::Failed => {
                info.state = TaskRunState::Failed;
                SchedulerStep {
                    newly_scheduled: Vec::new(),
                    newly_blocked: self.block_dependents(task),
                }
            }
        }
    }

    /// Stop scheduling: every task that has not started is marked `Skipped`.
    ///
    /// Tasks already running are left alone; their completions are still
    /// accepted but schedule nothing.
    pub fn halt(&mut self) -> Vec<TaskName> {
        self.halted = true;
        let mut skipped = Vec::new();
        for name in &self.order {
            if let Some(info) = self.tasks.get_mut(name) {
                if info.state == TaskRunState::Pending {
                    info.state = TaskRunState::Skipped;
                    skipped.push(name.clone());
                }
            }
        }
        skipped
    }

    /// Force a running task into a terminal state without an outcome
    /// (aborted by the runtime).
    pub fn cancel(&mut self, task: &str) {
        if let Some(info) = self.tasks.get_mut(task) {
            if info.state == TaskRunState::Running {
                info.state = TaskRunState::Skipped;
            }
        }
    }

    pub fn state_of(&self, task: &str) -> Option<TaskRunState> {
        self.tasks.get(task).map(|t| t.state)
    }

    /// True once every task is in a terminal state.
    pub fn is_finished(&self) -> bool {
        self.tasks.values().all(|t| t.state.is_terminal())
    }

    fn collect_ready(&mut self) -> Vec<TaskName> {
        if self.halted {
            return Vec::new();
        }

        let ready: Vec<TaskName> = self
            .order
            .iter()
            .filter(|name| {
                self.tasks.get(*name).is_some_and(|info| {
                    info.state == TaskRunState::Pending
                        && info.deps.iter().all(|d| {
                            self.tasks
                                .get(d)
                                .is_some_and(|dep| dep.state == TaskRunState::Succeeded)
                        })
                })
            })
            .cloned()
            .collect();

        for name in &ready {
            if let Some(info) = self.tasks.get_mut(name) {
                info.state = TaskRunState::Running;
            }
        }
        ready
    }

    /// Mark every transitive dependent of `task` that has not started as
    /// `Blocked`.
    fn block_dependents(&mut self, task: &str) -> Vec<TaskName> {
        let mut blocked = Vec::new();
        let mut stack = vec![task.to_string()];

        while let Some(current) = stack.pop() {
            let Some(children) = self.dependents.get(&current) else {
                continue;
            };
            for child in children {
                let Some(info) = self.tasks.get_mut(child) else {
                    continue;
                };
                if info.state == TaskRunState::Pending {
                    info.state = TaskRunState::Blocked;
                    blocked.push(child.clone());
                    stack.push(child.clone());
                }
            }
        }
        blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureMode;

    fn noop() -> impl Fn() -> std::future::Ready<anyhow::Result<()>> + Send + Sync {
        || std::future::ready(Ok(()))
    }

    fn diamond() -> TaskGraph {
        let mut graph = TaskGraph::new(FailureMode::default());
        graph.register("a", &[], noop());
        graph.register("b", &["a"], noop());
        graph.register("c", &["a"], noop());
        graph.register("d", &["b", "c"], noop());
        graph
    }

    #[test]
    fn diamond_schedules_in_waves() {
        let graph = diamond();
        let closure = graph.resolve("d").unwrap();
        let mut sched = Scheduler::new(&graph, &closure);

        assert_eq!(sched.start().newly_scheduled, vec!["a"]);
        assert_eq!(
            sched.complete("a", TaskOutcome::Success).newly_scheduled,
            vec!["b", "c"]
        );
        assert!(sched.complete("b", TaskOutcome::Success).newly_scheduled.is_empty());
        assert_eq!(
            sched.complete("c", TaskOutcome::Success).newly_scheduled,
            vec!["d"]
        );
        sched.complete("d", TaskOutcome::Success);
        assert!(sched.is_finished());
    }

    #[test]
    fn failure_blocks_transitive_dependents() {
        let graph = diamond();
        let closure = graph.resolve("d").unwrap();
        let mut sched = Scheduler::new(&graph, &closure);

        sched.start();
        let step = sched.complete("a", TaskOutcome::Failed);
        assert!(step.newly_scheduled.is_empty());
        assert_eq!(step.newly_blocked.len(), 3);
        assert_eq!(sched.state_of("d"), Some(TaskRunState::Blocked));
        assert!(sched.is_finished());
    }

    #[test]
    fn halt_skips_pending_but_not_running() {
        let graph = diamond();
        let closure = graph.resolve("d").unwrap();
        let mut sched = Scheduler::new(&graph, &closure);

        sched.start();
        sched.complete("a", TaskOutcome::Success);
        sched.complete("b", TaskOutcome::Failed);
        let skipped = sched.halt();

        assert!(skipped.is_empty(), "d was blocked, c is running");
        assert_eq!(sched.state_of("c"), Some(TaskRunState::Running));
        assert!(!sched.is_finished());

        let step = sched.complete("c", TaskOutcome::Success);
        assert!(step.newly_scheduled.is_empty());
        assert!(sched.is_finished());
    }
}
