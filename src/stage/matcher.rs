// src/stage/matcher.rs

//! Glob matching for stage inputs.
//!
//! Ordering contract: patterns are applied in the order given; within one
//! pattern, matches come in lexical order of their `/`-separated path
//! relative to the base. A file matched by an earlier pattern is not
//! repeated by a later one, so `["**/jquery*.js", "**/*.js"]` yields jQuery
//! first and then everything else.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

use crate::errors::{PipelineError, Result};
use crate::fs::FileSystem;

/// One file selected by a pattern list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Full path as seen by the [`FileSystem`].
    pub path: PathBuf,
    /// Path relative to the match base, always with `/` separators.
    pub rel: String,
}

/// Compile a stage glob.
///
/// `*` does not cross directory boundaries; `**/` also matches zero
/// directories.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| PipelineError::MatchError {
            pattern: pattern.to_string(),
            cause: anyhow!(e),
        })?;
    Ok(glob.compile_matcher())
}

/// Match `patterns` against all files under `base`.
///
/// A missing `base` directory yields no matches; an unreadable one is a
/// [`PipelineError::MatchError`].
pub fn match_files(
    fs: &dyn FileSystem,
    base: &Path,
    patterns: &[String],
) -> Result<Vec<MatchedFile>> {
    let matchers = patterns
        .iter()
        .map(|p| compile_glob(p))
        .collect::<Result<Vec<_>>>()?;

    if !fs.is_dir(base) {
        debug!(base = ?base, ?patterns, "match base missing; zero matches");
        return Ok(Vec::new());
    }

    let mut candidates = walk_files(fs, base).map_err(|cause| PipelineError::MatchError {
        pattern: patterns.join(", "),
        cause,
    })?;
    candidates.sort_by(|a, b| a.rel.cmp(&b.rel));

    let mut seen: HashSet<String> = HashSet::new();
    let mut matched = Vec::new();

    for matcher in &matchers {
        for file in &candidates {
            if matcher.is_match(&file.rel) && seen.insert(file.rel.clone()) {
                matched.push(file.clone());
            }
        }
    }

    debug!(base = ?base, ?patterns, count = matched.len(), "matched files");
    Ok(matched)
}

fn walk_files(fs: &dyn FileSystem, base: &Path) -> anyhow::Result<Vec<MatchedFile>> {
    let mut files = Vec::new();
    let mut stack = vec![base.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(base) {
                    let rel = rel.to_string_lossy().replace('\\', "/");
                    files.push(MatchedFile { path, rel });
                }
            }
        }
    }

    Ok(files)
}
