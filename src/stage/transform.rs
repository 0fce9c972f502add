// src/stage/transform.rs

//! Transform traits used by stages.
//!
//! A stage pipes every matched file through its [`Step`]s in order.
//! [`Step::Map`] steps work on one file at a time; a [`Step::Merge`] step
//! is a barrier that receives every surviving file and returns a single
//! named output (concatenation).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

/// One file flowing through a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// Output location relative to the stage destination (`/` separators).
    pub rel_path: String,
    /// Where the content originally came from; used in error reports.
    pub source: PathBuf,
    pub contents: Vec<u8>,
}

impl FileItem {
    pub fn new(rel_path: impl Into<String>, source: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            rel_path: rel_path.into(),
            source: source.into(),
            contents,
        }
    }

    /// Contents as UTF-8 text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.contents)
            .with_context(|| format!("{:?} is not valid UTF-8", self.source))
    }

    /// Same file with new contents.
    pub fn with_contents(self, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            ..self
        }
    }
}

/// How a transform failure affects its stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformMode {
    /// The error becomes a `TransformError` and the file is not written.
    #[default]
    FailFast,
    /// The error is reported as a finding; the file passes through unchanged.
    Advisory,
}

/// Per-file transform.
pub trait FileTransform: Send + Sync {
    fn name(&self) -> &str;

    fn mode(&self) -> TransformMode {
        TransformMode::FailFast
    }

    fn apply(&self, file: FileItem) -> Result<FileItem>;
}

/// Many-to-one transform.
pub trait MergeTransform: Send + Sync {
    fn name(&self) -> &str;

    /// Combine `files` (in match order). `None` means there was nothing to
    /// produce, e.g. zero inputs.
    fn merge(&self, files: Vec<FileItem>) -> Result<Option<FileItem>>;
}

#[derive(Clone)]
pub enum Step {
    Map(Arc<dyn FileTransform>),
    Merge(Arc<dyn MergeTransform>),
}

impl Step {
    pub fn map(t: impl FileTransform + 'static) -> Self {
        Step::Map(Arc::new(t))
    }

    pub fn merge(t: impl MergeTransform + 'static) -> Self {
        Step::Merge(Arc::new(t))
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Map(t) => write!(f, "Map({}, {:?})", t.name(), t.mode()),
            Step::Merge(t) => write!(f, "Merge({})", t.name()),
        }
    }
}
