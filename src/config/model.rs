// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::FailureMode;

/// Top-level configuration as read from a TOML file.
///
/// Every section is optional; the defaults reproduce the classic
/// `src/` -> `build/` front-end layout:
///
/// ```toml
/// [config]
/// failure_mode = "continue_siblings"
///
/// [paths]
/// source_dir = "src"
/// build_dir = "build"
/// lib_order = ["**/jquery*.js", "**/*.js"]
///
/// [compile]
/// js_lib_file = "lib.min.js"
///
/// [server]
/// host = "localhost"
/// port = 8000
///
/// [watch]
/// coalesce_ms = 300
/// ```
///
/// This is the unvalidated form; convert it with `ConfigFile::try_from`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub compile: CompileSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub watch: WatchSection,
    #[serde(default)]
    pub lint: LintSection,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on non-empty directory names and compilable globs.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub paths: PathsSection,
    pub compile: CompileSection,
    pub server: ServerSection,
    pub watch: WatchSection,
    pub lint: LintSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            paths: raw.paths,
            compile: raw.compile,
            server: raw.server,
            watch: raw.watch,
            lint: raw.lint,
        }
    }

    /// Resolved directory layout relative to a project root.
    pub fn layout(&self, root: &Path) -> Layout {
        Layout::new(root, &self.paths)
    }
}

/// `[config]` section: orchestration behaviour.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// `"continue_siblings"` (default) or `"cancel_siblings"`.
    #[serde(default)]
    pub failure_mode: FailureMode,
}

/// `[paths]` section: directory layout and file-name conventions.
///
/// `js_lib_dir`, `js_app_dir`, `css_dir` and `images_dir` are relative to
/// both the source and the build directory. `files_dir` is relative to the
/// project root on the source side and to `build_dir` on the output side.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsSection {
    pub source_dir: String,
    pub build_dir: String,
    pub index_file: String,
    pub js_lib_dir: String,
    pub js_app_dir: String,
    pub css_dir: String,
    pub images_dir: String,
    pub files_dir: String,
    /// Priority-ordered globs (relative to the lib dir) deciding the order
    /// in which libraries are injected and concatenated.
    pub lib_order: Vec<String>,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            source_dir: "src".to_string(),
            build_dir: "build".to_string(),
            index_file: "index.html".to_string(),
            js_lib_dir: "lib".to_string(),
            js_app_dir: "app".to_string(),
            css_dir: "css".to_string(),
            images_dir: "css/images".to_string(),
            files_dir: "files".to_string(),
            lib_order: vec!["**/jquery*.js".to_string(), "**/*.js".to_string()],
        }
    }
}

/// `[compile]` section: names of the bundles produced by `compile`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileSection {
    pub css_file: String,
    pub js_lib_file: String,
    pub js_app_file: String,
}

impl Default for CompileSection {
    fn default() -> Self {
        Self {
            css_file: "app.min.css".to_string(),
            js_lib_file: "lib.min.js".to_string(),
            js_app_file: "app.min.js".to_string(),
        }
    }
}

/// `[server]` section: dev server and reload commands.
///
/// `serve_cmd` may use the `{root}`, `{host}` and `{port}` placeholders.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub serve_cmd: String,
    pub reload_cmd: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            serve_cmd: "browser-sync start --server {root} --proxy {host}:{port} --no-open"
                .to_string(),
            reload_cmd: "browser-sync reload".to_string(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSection {
    /// Glob (relative to `source_dir`) a changed path must match.
    pub pattern: String,
    pub exclude: Vec<String>,
    /// Events closer together than this collapse into one rebuild.
    pub coalesce_ms: u64,
    /// Ignore modify events that leave the file content unchanged.
    pub use_hash: bool,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            pattern: "**/*.*".to_string(),
            exclude: Vec::new(),
            coalesce_ms: 300,
            use_hash: false,
        }
    }
}

/// `[lint]` section for the advisory JS lint stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintSection {
    pub enabled: bool,
    /// 0 disables the line-length rule.
    pub max_line_length: usize,
}

impl Default for LintSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_line_length: 120,
        }
    }
}

/// Concrete directories derived from [`PathsSection`] and a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub index_file: PathBuf,
    pub source_js_lib: PathBuf,
    pub source_js_app: PathBuf,
    pub source_css: PathBuf,
    pub source_images: PathBuf,
    pub source_files: PathBuf,
    pub build_js_lib: PathBuf,
    pub build_js_app: PathBuf,
    pub build_css: PathBuf,
    pub build_images: PathBuf,
    pub build_files: PathBuf,
}

impl Layout {
    pub fn new(root: &Path, paths: &PathsSection) -> Self {
        let source_dir = root.join(&paths.source_dir);
        let build_dir = root.join(&paths.build_dir);
        Self {
            root: root.to_path_buf(),
            index_file: source_dir.join(&paths.index_file),
            source_js_lib: source_dir.join(&paths.js_lib_dir),
            source_js_app: source_dir.join(&paths.js_app_dir),
            source_css: source_dir.join(&paths.css_dir),
            source_images: source_dir.join(&paths.images_dir),
            source_files: root.join(&paths.files_dir),
            build_js_lib: build_dir.join(&paths.js_lib_dir),
            build_js_app: build_dir.join(&paths.js_app_dir),
            build_css: build_dir.join(&paths.css_dir),
            build_images: build_dir.join(&paths.images_dir),
            build_files: build_dir.join(&paths.files_dir),
            source_dir,
            build_dir,
        }
    }
}
