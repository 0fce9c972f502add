// src/errors.rs

//! Crate-wide error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A content transform failed on one file of a stage.
#[derive(Error, Debug)]
#[error("stage '{stage}': transform '{transform}' failed on {path:?}: {cause:#}")]
pub struct TransformError {
    pub stage: String,
    pub transform: String,
    pub path: PathBuf,
    pub cause: anyhow::Error,
}

/// Resolution path of a dependency cycle, e.g. `A -> B -> A`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(pub Vec<String>);

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" -> "))
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cyclic dependency: {path}")]
    CyclicDependency { path: CyclePath },

    #[error("Task '{task}' not run: dependency '{failed}' failed: {cause:#}")]
    DependencyFailed {
        task: String,
        failed: String,
        cause: anyhow::Error,
    },

    #[error("Task '{task}' failed: {cause:#}")]
    TaskFailed { task: String, cause: anyhow::Error },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Cannot match '{pattern}': {cause:#}")]
    MatchError {
        pattern: String,
        cause: anyhow::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;
