// src/engine/runtime.rs

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::scheduler::Scheduler;
use crate::errors::{PipelineError, Result};
use crate::types::FailureMode;

use super::{RunReport, TaskAction, TaskName, TaskOutcome};

/// Drives one `TaskGraph::run`.
///
/// An IO shell around [`Scheduler`]: it spawns ready actions on a
/// [`JoinSet`], feeds completions back into the scheduler and dispatches
/// whatever becomes ready. After the first failure nothing new is started;
/// [`FailureMode`] decides whether tasks already running are awaited or
/// aborted.
pub struct Runtime<'g> {
    graph: &'g TaskGraph,
    run_id: u64,
    join: JoinSet<(TaskName, anyhow::Result<()>)>,
    running: HashMap<Id, TaskName>,
    report: RunReport,
}

impl fmt::Debug for Runtime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("run_id", &self.run_id)
            .field("running", &self.running.len())
            .finish_non_exhaustive()
    }
}

impl<'g> Runtime<'g> {
    pub fn new(graph: &'g TaskGraph, run_id: u64) -> Self {
        Self {
            graph,
            run_id,
            join: JoinSet::new(),
            running: HashMap::new(),
            report: RunReport {
                run_id,
                completed: Vec::new(),
            },
        }
    }

    pub async fn run(mut self, root: &str) -> Result<RunReport> {
        // Resolution fails on unknown tasks and cycles before anything runs.
        let closure = self.graph.resolve(root)?;
        info!(run_id = self.run_id, task = %root, tasks = closure.len(), "starting run");

        let mut scheduler = Scheduler::new(self.graph, &closure);
        let mut failure: Option<(TaskName, anyhow::Error)> = None;

        let initial = scheduler.start().newly_scheduled;
        self.dispatch(&mut scheduler, initial);

        while let Some(joined) = self.join.join_next_with_id().await {
            let (name, result) = match joined {
                Ok((id, (name, result))) => {
                    self.running.remove(&id);
                    (name, result)
                }
                Err(join_err) => {
                    let name = self
                        .running
                        .remove(&join_err.id())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    if join_err.is_cancelled() {
                        debug!(run_id = self.run_id, task = %name, "task aborted");
                        scheduler.cancel(&name);
                        continue;
                    }
                    (name, Err(anyhow::anyhow!("task panicked: {join_err}")))
                }
            };

            match result {
                Ok(()) => {
                    info!(run_id = self.run_id, task = %name, "task finished");
                    self.report.completed.push(name.clone());
                    let ready = scheduler.complete(&name, TaskOutcome::Success).newly_scheduled;
                    self.dispatch(&mut scheduler, ready);
                }
                Err(cause) => {
                    error!(run_id = self.run_id, task = %name, error = %format!("{cause:#}"), "task failed");
                    let step = scheduler.complete(&name, TaskOutcome::Failed);
                    if !step.newly_blocked.is_empty() {
                        debug!(task = %name, blocked = ?step.newly_blocked, "dependents will not run");
                    }

                    if failure.is_none() {
                        let skipped = scheduler.halt();
                        if !skipped.is_empty() {
                            debug!(skipped = ?skipped, "run halted");
                        }
                        if self.graph.failure_mode() == FailureMode::CancelSiblings
                            && !self.join.is_empty()
                        {
                            warn!(
                                run_id = self.run_id,
                                running = self.join.len(),
                                "aborting running tasks"
                            );
                            self.join.abort_all();
                        }
                        failure = Some((name, cause));
                    } else {
                        // Only the first failure is reported.
                        debug!(task = %name, error = %format!("{cause:#}"), "additional failure");
                    }
                }
            }
        }

        if let Some((failed, cause)) = failure {
            return Err(if failed == root {
                PipelineError::TaskFailed {
                    task: failed,
                    cause,
                }
            } else {
                PipelineError::DependencyFailed {
                    task: root.to_string(),
                    failed,
                    cause,
                }
            });
        }

        debug_assert!(scheduler.is_finished());
        info!(run_id = self.run_id, task = %root, "run finished");
        Ok(self.report)
    }

    /// Spawn the actions of `ready` tasks. Action-less tasks complete
    /// immediately, which may make more tasks ready.
    fn dispatch(&mut self, scheduler: &mut Scheduler, ready: Vec<TaskName>) {
        let mut queue: VecDeque<TaskName> = ready.into();

        while let Some(name) = queue.pop_front() {
            let action: Option<Arc<dyn TaskAction>> =
                self.graph.get(&name).and_then(|def| def.action.clone());

            match action {
                Some(action) => {
                    debug!(run_id = self.run_id, task = %name, "starting task");
                    let fut = action.call();
                    let task = name.clone();
                    let handle = self.join.spawn(async move { (task, fut.await) });
                    self.running.insert(handle.id(), name);
                }
                None => {
                    debug!(run_id = self.run_id, task = %name, "no action; completing");
                    self.report.completed.push(name.clone());
                    let step = scheduler.complete(&name, TaskOutcome::Success);
                    queue.extend(step.newly_scheduled);
                }
            }
        }
    }
}
