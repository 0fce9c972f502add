// src/stage/runner.rs

//! Stage execution.
//!
//! Files are streamed: each matched file is read, passed through the
//! per-file steps and written before the next one is read. A merge step
//! collects every file that survived the steps before it, and the merged
//! output continues through the remaining steps.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{PipelineError, Result, TransformError};
use crate::fs::FileSystem;
use crate::stage::matcher::match_files;
use crate::stage::transform::{FileItem, Step, TransformMode};
use crate::stage::{Advisory, ErrorPolicy, Stage, StageReport};

/// Runs [`Stage`]s against a [`FileSystem`].
#[derive(Debug, Clone)]
pub struct StageRunner {
    fs: Arc<dyn FileSystem>,
}

impl StageRunner {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Match, transform and write.
    ///
    /// Zero matches is a successful, empty run. Under
    /// [`ErrorPolicy::FailFast`] the first fail-fast transform error is
    /// returned; files written before it stay written.
    pub fn run(&self, stage: &Stage) -> Result<StageReport> {
        let matched = match_files(self.fs.as_ref(), &stage.base, &stage.patterns)?;
        debug!(stage = %stage.name, matched = matched.len(), "stage inputs resolved");

        let mut report = StageReport::default();
        let inputs = matched.into_iter().map(|m| -> anyhow::Result<FileItem> {
            let contents = self.fs.read(&m.path)?;
            Ok(FileItem::new(m.rel, m.path, contents))
        });

        self.run_steps(stage, &stage.steps, inputs, &mut report)?;

        info!(
            stage = %stage.name,
            written = report.written.len(),
            advisories = report.advisories.len(),
            errors = report.errors.len(),
            "stage finished"
        );
        Ok(report)
    }

    fn run_steps(
        &self,
        stage: &Stage,
        steps: &[Step],
        inputs: impl Iterator<Item = anyhow::Result<FileItem>>,
        report: &mut StageReport,
    ) -> Result<()> {
        let barrier = steps.iter().enumerate().find_map(|(i, step)| match step {
            Step::Merge(m) => Some((i, Arc::clone(m))),
            Step::Map(_) => None,
        });
        let per_file = &steps[..barrier.as_ref().map_or(steps.len(), |(i, _)| *i)];

        let mut survivors = Vec::new();

        for input in inputs {
            let file = input?;
            match apply_per_file(stage, per_file, file, report) {
                Ok(file) if barrier.is_some() => survivors.push(file),
                Ok(file) => self.write(stage, &file, report)?,
                Err(err) => match stage.on_error {
                    ErrorPolicy::FailFast => return Err(PipelineError::Transform(err)),
                    ErrorPolicy::Collect => {
                        warn!(stage = %stage.name, error = %err, "transform failed; skipping file");
                        report.errors.push(err);
                    }
                },
            }
        }

        let Some((idx, merge)) = barrier else {
            return Ok(());
        };

        let merged = merge.merge(survivors).map_err(|cause| {
            PipelineError::Transform(TransformError {
                stage: stage.name.clone(),
                transform: merge.name().to_string(),
                path: stage.destination.clone(),
                cause,
            })
        })?;

        match merged {
            Some(file) => {
                self.run_steps(stage, &steps[idx + 1..], std::iter::once(Ok(file)), report)
            }
            None => {
                debug!(stage = %stage.name, merge = merge.name(), "nothing to merge");
                Ok(())
            }
        }
    }

    fn write(&self, stage: &Stage, file: &FileItem, report: &mut StageReport) -> Result<()> {
        let target = stage.destination.join(&file.rel_path);
        self.fs.write(&target, &file.contents)?;
        debug!(stage = %stage.name, path = ?target, "wrote file");
        report.written.push(target);
        Ok(())
    }
}

/// Run the per-file steps on one file.
///
/// Advisory failures are recorded and the file continues unchanged.
fn apply_per_file(
    stage: &Stage,
    steps: &[Step],
    mut file: FileItem,
    report: &mut StageReport,
) -> std::result::Result<FileItem, TransformError> {
    for step in steps {
        let Step::Map(transform) = step else {
            continue;
        };

        match transform.mode() {
            TransformMode::Advisory => match transform.apply(file.clone()) {
                Ok(out) => file = out,
                Err(findings) => {
                    warn!(
                        stage = %stage.name,
                        transform = transform.name(),
                        path = ?file.source,
                        "{findings:#}"
                    );
                    report.advisories.push(Advisory {
                        transform: transform.name().to_string(),
                        path: file.source.clone(),
                        message: format!("{findings:#}"),
                    });
                }
            },
            TransformMode::FailFast => {
                let path = file.source.clone();
                file = transform.apply(file).map_err(|cause| TransformError {
                    stage: stage.name.clone(),
                    transform: transform.name().to_string(),
                    path,
                    cause,
                })?;
            }
        }
    }
    Ok(file)
}
