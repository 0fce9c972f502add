// src/stage/mod.rs

//! File stages: match -> transform -> write.
//!
//! - [`matcher`] resolves glob lists into an ordered file list.
//! - [`transform`] defines the per-file and merge transform traits.
//! - [`plugins`] holds the built-in transforms.
//! - [`runner`] executes a [`Stage`] against a `FileSystem`.

pub mod matcher;
pub mod plugins;
pub mod runner;
pub mod transform;

use std::path::{Path, PathBuf};

use crate::errors::TransformError;

pub use matcher::{match_files, MatchedFile};
pub use runner::StageRunner;
pub use transform::{FileItem, FileTransform, MergeTransform, Step, TransformMode};

/// What a stage does with a fail-fast transform error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop accepting files and return the error.
    #[default]
    FailFast,
    /// Skip the failing file, keep going, and list the error in the report.
    Collect,
}

/// One match + transform + write step.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    /// Directory the patterns are evaluated against; output keeps paths
    /// relative to it.
    pub base: PathBuf,
    pub patterns: Vec<String>,
    pub steps: Vec<Step>,
    pub destination: PathBuf,
    pub on_error: ErrorPolicy,
}

impl Stage {
    pub fn new(
        name: impl Into<String>,
        base: impl Into<PathBuf>,
        patterns: &[&str],
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            steps: Vec::new(),
            destination: destination.into(),
            on_error: ErrorPolicy::FailFast,
        }
    }

    /// Replace the pattern list (for priority lists from config).
    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Append a step; steps run in the order they were added.
    pub fn pipe(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn on_error(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }
}

/// A finding from an advisory transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub transform: String,
    pub path: PathBuf,
    pub message: String,
}

/// What a finished stage did.
#[derive(Debug, Default)]
pub struct StageReport {
    /// Files written, in write order.
    pub written: Vec<PathBuf>,
    pub advisories: Vec<Advisory>,
    /// Only populated under [`ErrorPolicy::Collect`].
    pub errors: Vec<TransformError>,
}

impl StageReport {
    pub fn wrote(&self, path: &Path) -> bool {
        self.written.iter().any(|p| p == path)
    }
}
