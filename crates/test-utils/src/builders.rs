#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use taskpipe::config::{ConfigFile, RawConfigFile};
use taskpipe::types::FailureMode;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn source_dir(mut self, dir: &str) -> Self {
        self.config.paths.source_dir = dir.to_string();
        self
    }

    pub fn build_dir(mut self, dir: &str) -> Self {
        self.config.paths.build_dir = dir.to_string();
        self
    }

    pub fn lib_order(mut self, patterns: &[&str]) -> Self {
        self.config.paths.lib_order = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn lint(mut self, enabled: bool) -> Self {
        self.config.lint.enabled = enabled;
        self
    }

    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.config.config.failure_mode = mode;
        self
    }

    pub fn server(mut self, host: &str, port: u16) -> Self {
        self.config.server.host = host.to_string();
        self.config.server.port = port;
        self
    }

    pub fn coalesce_ms(mut self, ms: u64) -> Self {
        self.config.watch.coalesce_ms = ms;
        self
    }

    pub fn use_hash(mut self, val: bool) -> Self {
        self.config.watch.use_hash = val;
        self
    }

    pub fn js_lib_file(mut self, name: &str) -> Self {
        self.config.compile.js_lib_file = name.to_string();
        self
    }

    /// The unvalidated config, for validation tests.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes a small front-end project onto disk.
pub struct SiteBuilder {
    root: PathBuf,
}

impl SiteBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Write `contents` to `root/rel`, creating parent directories.
    pub fn file(self, rel: &str, contents: &str) -> Self {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write site file");
        self
    }

    /// The default-layout site used by most pipeline tests.
    pub fn standard(self) -> Self {
        self.file(
            "src/index.html",
            "<html>\n<head>\n  <!-- inject:css -->\n  <!-- endinject -->\n</head>\n<body>\n  <!-- inject:js-lib -->\n  <!-- endinject -->\n  <!-- inject:js-app -->\n  <!-- endinject -->\n</body>\n</html>\n",
        )
        .file("src/lib/underscore.js", "var _ = {};\n")
        .file("src/lib/jquery-2.1.js", "var $ = function () {};\n")
        .file("src/app/main.js", "// entry\nvar app = 1;\n")
        .file("src/app/views/list.js", "var list = [];\n")
        .file("src/css/site.css", "body {\n  color: red;\n}\n")
        .file("src/css/images/logo.png", "PNG")
        .file("files/robots.txt", "User-agent: *\n")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
