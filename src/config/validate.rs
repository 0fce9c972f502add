// src/config/validate.rs

use std::path::{Component, Path, PathBuf};

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PipelineError, Result};
use crate::types::BuildMode;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

impl ConfigFile {
    /// Checks that only matter for one pipeline.
    ///
    /// The bundle names are ignored by the local build, so they are only
    /// required once `compile` is selected.
    pub fn validate_for(&self, mode: BuildMode) -> Result<()> {
        if mode == BuildMode::Compile {
            non_empty("compile.css_file", &self.compile.css_file)?;
            non_empty("compile.js_lib_file", &self.compile.js_lib_file)?;
            non_empty("compile.js_app_file", &self.compile.js_app_file)?;
        }
        Ok(())
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_paths(cfg)?;
    validate_server(cfg)?;
    validate_watch(cfg)?;
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    let p = &cfg.paths;
    non_empty("paths.source_dir", &p.source_dir)?;
    non_empty("paths.build_dir", &p.build_dir)?;
    non_empty("paths.index_file", &p.index_file)?;
    non_empty("paths.js_lib_dir", &p.js_lib_dir)?;
    non_empty("paths.js_app_dir", &p.js_app_dir)?;
    non_empty("paths.css_dir", &p.css_dir)?;
    non_empty("paths.images_dir", &p.images_dir)?;
    non_empty("paths.files_dir", &p.files_dir)?;

    // Watching the source tree must not see build writes, and `clean` must
    // not delete sources.
    let source = normalized(&p.source_dir);
    let build = normalized(&p.build_dir);
    if source.starts_with(&build) || build.starts_with(&source) {
        return Err(PipelineError::ConfigError(format!(
            "[paths].source_dir ('{}') and [paths].build_dir ('{}') must differ \
             and must not be nested inside each other",
            p.source_dir, p.build_dir
        )));
    }

    if p.lib_order.is_empty() {
        return Err(PipelineError::ConfigError(
            "[paths].lib_order must contain at least one pattern".to_string(),
        ));
    }
    for pat in &p.lib_order {
        valid_glob("paths.lib_order", pat)?;
    }
    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    non_empty("server.host", &cfg.server.host)?;
    if cfg.server.port == 0 {
        return Err(PipelineError::ConfigError(
            "[server].port must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    valid_glob("watch.pattern", &cfg.watch.pattern)?;
    for pat in &cfg.watch.exclude {
        valid_glob("watch.exclude", pat)?;
    }
    if cfg.watch.coalesce_ms == 0 {
        return Err(PipelineError::ConfigError(
            "[watch].coalesce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Path components with `.` segments and trailing separators dropped.
fn normalized(dir: &str) -> PathBuf {
    Path::new(dir)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn non_empty(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::ConfigError(format!(
            "{key} must not be empty"
        )));
    }
    Ok(())
}

fn valid_glob(key: &str, pattern: &str) -> Result<()> {
    Glob::new(pattern).map_err(|e| {
        PipelineError::ConfigError(format!("{key}: invalid glob pattern '{pattern}': {e}"))
    })?;
    Ok(())
}
