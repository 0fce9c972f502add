// src/engine/mod.rs

//! Execution engine for task graphs.
//!
//! The pure per-run state machine lives in [`crate::dag::scheduler`]; this
//! module is the async shell around it: it spawns task actions on Tokio,
//! feeds their outcomes back into the scheduler and applies the
//! [`FailureMode`](crate::types::FailureMode) policy.

use std::future::Future;
use std::pin::Pin;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Future returned by a task action.
pub type ActionFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// The work a task performs once its dependencies have succeeded.
///
/// Implemented for any `Fn() -> impl Future<Output = anyhow::Result<()>>`,
/// so most actions are plain async closures.
pub trait TaskAction: Send + Sync {
    fn call(&self) -> ActionFuture;
}

impl<F, Fut> TaskAction for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn call(&self) -> ActionFuture {
        Box::pin(self())
    }
}

/// Outcome of one task action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed,
}

/// Summary of a successful `TaskGraph::run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: u64,
    /// Tasks in the order they completed.
    pub completed: Vec<TaskName>,
}

pub mod runtime;

pub use runtime::Runtime;
