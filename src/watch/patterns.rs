// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled watch / exclude globs.
///
/// Patterns are relative to the watched root; [`WatchFilter::matches`]
/// expects paths in that form with forward slashes (e.g. `"app/main.js"`).
#[derive(Clone)]
pub struct WatchFilter {
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchFilter")
            .field("watch", &self.watch_set.len())
            .field("exclude", &self.exclude_set.as_ref().map_or(0, |s| s.len()))
            .finish()
    }
}

impl WatchFilter {
    pub fn new(pattern: &str, exclude: &[String]) -> Result<Self> {
        let watch_set = build_globset(std::slice::from_ref(&pattern.to_string()))
            .context("building watch globset")?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };
        Ok(Self {
            watch_set,
            exclude_set,
        })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        match &self.exclude_set {
            Some(exclude) => !exclude.is_match(rel_path),
            None => true,
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pattern_needs_an_extension() {
        let filter = WatchFilter::new("**/*.*", &[]).unwrap();
        assert!(filter.matches("index.html"));
        assert!(filter.matches("app/main.js"));
        assert!(!filter.matches("Makefile"));
    }

    #[test]
    fn exclude_wins() {
        let filter = WatchFilter::new("**/*.js", &["**/*.min.js".to_string()]).unwrap();
        assert!(filter.matches("app/main.js"));
        assert!(!filter.matches("lib/jquery.min.js"));
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(WatchFilter::new("a[", &[]).is_err());
    }
}
