// src/dag/graph.rs

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::engine::{RunReport, Runtime, TaskAction, TaskName};
use crate::errors::{CyclePath, PipelineError, Result};
use crate::types::FailureMode;

/// A registered task.
#[derive(Clone)]
pub struct TaskDef {
    pub name: TaskName,
    /// Direct dependencies, in declaration order.
    pub deps: Vec<TaskName>,
    /// `None` for aliases / shortcuts.
    pub action: Option<Arc<dyn TaskAction>>,
}

impl fmt::Debug for TaskDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDef")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

/// Registry of named tasks and their dependencies.
///
/// Registration is unchecked; unknown dependencies and cycles are reported
/// when a task is resolved (`resolve` / `run`) or by [`TaskGraph::validate`].
#[derive(Debug)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskName, TaskDef>,
    failure_mode: FailureMode,
    run_counter: AtomicU64,
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new(FailureMode::default())
    }
}

impl TaskGraph {
    pub fn new(failure_mode: FailureMode) -> Self {
        Self {
            tasks: BTreeMap::new(),
            failure_mode,
            run_counter: AtomicU64::new(0),
        }
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Register (or overwrite) a task with an action.
    pub fn register<A>(&mut self, name: impl Into<TaskName>, deps: &[&str], action: A)
    where
        A: TaskAction + 'static,
    {
        self.insert(name.into(), deps, Some(Arc::new(action)));
    }

    /// Register (or overwrite) a task without an action.
    ///
    /// Running it just runs its dependencies; with no dependencies it is a
    /// no-op.
    pub fn alias(&mut self, name: impl Into<TaskName>, deps: &[&str]) {
        self.insert(name.into(), deps, None);
    }

    fn insert(&mut self, name: TaskName, deps: &[&str], action: Option<Arc<dyn TaskAction>>) {
        let def = TaskDef {
            name: name.clone(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            action,
        };
        if self.tasks.insert(name.clone(), def).is_some() {
            warn!(task = %name, "task re-registered; previous definition replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// All task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.tasks
            .get(name)
            .map(|t| t.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Transitive dependency closure of `root` (including `root`), ordered so
    /// that every task comes after all of its dependencies.
    ///
    /// Fails with `CyclicDependency` if resolution reaches a task that is
    /// still on the current resolution path, and with `TaskNotFound` for
    /// unknown names.
    pub fn resolve(&self, root: &str) -> Result<Vec<TaskName>> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut path = Vec::new();
        self.visit(root, &mut path, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        path: &mut Vec<TaskName>,
        done: &mut HashSet<TaskName>,
        order: &mut Vec<TaskName>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = path.iter().position(|p| p == name) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(PipelineError::CyclicDependency {
                path: CyclePath(cycle),
            });
        }

        let Some(def) = self.tasks.get(name) else {
            if let Some(parent) = path.last() {
                warn!(task = %parent, dep = %name, "dependency is not a registered task");
            }
            return Err(PipelineError::TaskNotFound(name.to_string()));
        };

        path.push(name.to_string());
        for dep in &def.deps {
            self.visit(dep, path, done, order)?;
        }
        path.pop();

        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    /// Check the whole registry: every dependency exists and the graph has
    /// no cycle.
    pub fn validate(&self) -> Result<()> {
        for def in self.tasks.values() {
            for dep in &def.deps {
                if !self.tasks.contains_key(dep) {
                    return Err(PipelineError::ConfigError(format!(
                        "task '{}' has unknown dependency '{}'",
                        def.name, dep
                    )));
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// All tasks in dependency order (petgraph toposort).
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.tasks.keys() {
            graph.add_node(name.as_str());
        }
        for def in self.tasks.values() {
            for dep in &def.deps {
                graph.add_edge(dep.as_str(), def.name.as_str(), ());
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            let node = cycle.node_id();
            // Resolving from the offending node yields the full path.
            match self.resolve(node) {
                Err(err @ PipelineError::CyclicDependency { .. }) => err,
                _ => PipelineError::CyclicDependency {
                    path: CyclePath(vec![node.to_string()]),
                },
            }
        })
    }

    /// Run `name` and its transitive dependencies.
    ///
    /// Each task in the closure runs at most once. Independent tasks run
    /// concurrently; a task starts only after all its dependencies
    /// succeeded. No action starts if the closure contains a cycle.
    pub async fn run(&self, name: &str) -> Result<RunReport> {
        let run_id = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Runtime::new(self, run_id).run(name).await
    }

    /// Run several tasks strictly one after another, stopping at the first
    /// failure.
    pub async fn run_sequence(&self, names: &[&str]) -> Result<Vec<RunReport>> {
        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            reports.push(self.run(name).await?);
        }
        Ok(reports)
    }
}
