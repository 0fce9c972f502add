// tests/stage_runner.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use taskpipe::errors::PipelineError;
use taskpipe::fs::FileSystem;
use taskpipe::fs::mock::MockFileSystem;
use taskpipe::stage::plugins::{Concat, Lint, MinifyCss, MinifyJs};
use taskpipe::stage::{
    ErrorPolicy, FileItem, FileTransform, Stage, StageRunner, Step, TransformMode,
};

/// Fails on any file whose relative path contains `needle`.
struct Reject(&'static str);

impl FileTransform for Reject {
    fn name(&self) -> &str {
        "reject"
    }

    fn apply(&self, file: FileItem) -> Result<FileItem> {
        if file.rel_path.contains(self.0) {
            bail!("rejected {}", file.rel_path);
        }
        Ok(file)
    }
}

/// Always reports an advisory finding.
struct Grumble;

impl FileTransform for Grumble {
    fn name(&self) -> &str {
        "grumble"
    }

    fn mode(&self) -> TransformMode {
        TransformMode::Advisory
    }

    fn apply(&self, _file: FileItem) -> Result<FileItem> {
        bail!("I don't like this file")
    }
}

struct Upper;

impl FileTransform for Upper {
    fn name(&self) -> &str {
        "upper"
    }

    fn apply(&self, file: FileItem) -> Result<FileItem> {
        let text = file.text()?.to_uppercase();
        Ok(file.with_contents(text))
    }
}

fn fs_with(files: &[(&str, &str)]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    for (path, contents) in files {
        fs.add_file(path, *contents);
    }
    fs
}

fn runner(fs: &MockFileSystem) -> StageRunner {
    StageRunner::new(Arc::new(fs.clone()))
}

fn read(fs: &MockFileSystem, path: &str) -> String {
    fs.read_to_string(Path::new(path)).unwrap()
}

#[test]
fn advisory_findings_do_not_block_the_write() {
    let fs = fs_with(&[("src/app/main.js", "var a = 1;")]);
    let stage = Stage::new("js", "src/app", &["**/*.js"], "build/app").pipe(Step::map(Grumble));

    let report = runner(&fs).run(&stage).unwrap();

    assert!(report.wrote(Path::new("build/app/main.js")));
    assert_eq!(read(&fs, "build/app/main.js"), "var a = 1;");
    assert_eq!(report.advisories.len(), 1);
    assert_eq!(report.advisories[0].transform, "grumble");
    assert_eq!(report.advisories[0].path, PathBuf::from("src/app/main.js"));
}

#[test]
fn lint_findings_are_advisory() {
    let fs = fs_with(&[("src/app/main.js", "if (a == b) { debugger; }   \n")]);
    let stage =
        Stage::new("js", "src/app", &["**/*.js"], "build/app").pipe(Step::map(Lint::new(120)));

    let report = runner(&fs).run(&stage).unwrap();

    assert!(fs.is_file(Path::new("build/app/main.js")));
    assert_eq!(report.advisories.len(), 1);
    let message = &report.advisories[0].message;
    assert!(message.contains("3 issue(s)"), "{message}");
    assert!(message.contains("debugger"));
}

#[test]
fn fail_fast_error_stops_the_stage_with_the_file_path() {
    let fs = fs_with(&[
        ("src/a.js", "a"),
        ("src/b.js", "b"),
        ("src/c.js", "c"),
    ]);
    let stage = Stage::new("js", "src", &["*.js"], "out").pipe(Step::map(Reject("b.js")));

    match runner(&fs).run(&stage) {
        Err(PipelineError::Transform(err)) => {
            assert_eq!(err.stage, "js");
            assert_eq!(err.transform, "reject");
            assert_eq!(err.path, PathBuf::from("src/b.js"));
        }
        other => panic!("expected a transform error, got {other:?}"),
    }

    // Files before the failure stay written; the failing one and the rest
    // are not written.
    assert!(fs.is_file(Path::new("out/a.js")));
    assert!(!fs.exists(Path::new("out/b.js")));
    assert!(!fs.exists(Path::new("out/c.js")));
}

#[test]
fn collect_policy_skips_failing_files_and_reports_them() {
    let fs = fs_with(&[("src/a.js", "a"), ("src/b.js", "b"), ("src/c.js", "c")]);
    let stage = Stage::new("js", "src", &["*.js"], "out")
        .pipe(Step::map(Reject("b.js")))
        .on_error(ErrorPolicy::Collect);

    let report = runner(&fs).run(&stage).unwrap();

    assert_eq!(
        report.written,
        vec![PathBuf::from("out/a.js"), PathBuf::from("out/c.js")]
    );
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, PathBuf::from("src/b.js"));
}

#[test]
fn transforms_apply_in_order() {
    let fs = fs_with(&[("src/one.js", "x"), ("src/two.js", "y")]);
    let stage = Stage::new("bundle", "src", &["*.js"], "out")
        .pipe(Step::map(Upper))
        .pipe(Step::merge(Concat::new("all.js")));

    let report = runner(&fs).run(&stage).unwrap();

    assert_eq!(report.written, vec![PathBuf::from("out/all.js")]);
    assert_eq!(read(&fs, "out/all.js"), "X\nY");
}

#[test]
fn zero_matches_is_an_empty_success() {
    let fs = MockFileSystem::new();
    let stage = Stage::new("js", "src/app", &["**/*.js"], "build/app")
        .pipe(Step::merge(Concat::new("app.min.js")))
        .pipe(Step::map(MinifyJs));

    let report = runner(&fs).run(&stage).unwrap();
    assert!(report.written.is_empty());
    assert!(fs.file_paths().is_empty());
}

#[test]
fn concat_then_minify_produces_one_bundle() {
    let fs = fs_with(&[
        ("src/css/a.css", "/* header */\nbody {\n  color: red;\n}\n"),
        ("src/css/b.css", "p {\n  margin: 0;\n}\n"),
    ]);
    let stage = Stage::new("css", "src/css", &["**/*.css"], "build/css")
        .pipe(Step::merge(Concat::new("app.min.css")))
        .pipe(Step::map(MinifyCss));

    runner(&fs).run(&stage).unwrap();

    assert_eq!(read(&fs, "build/css/app.min.css"), "body{color:red}p{margin:0}");
    assert_eq!(
        fs.file_paths(),
        vec![
            PathBuf::from("build/css/app.min.css"),
            PathBuf::from("src/css/a.css"),
            PathBuf::from("src/css/b.css"),
        ]
    );
}

#[test]
fn minify_failure_after_merge_names_the_bundle() {
    let fs = fs_with(&[("src/app/a.js", "var s = 'unterminated;\n")]);
    let stage = Stage::new("js", "src/app", &["*.js"], "build/app")
        .pipe(Step::merge(Concat::new("app.min.js")))
        .pipe(Step::map(MinifyJs));

    match runner(&fs).run(&stage) {
        Err(PipelineError::Transform(err)) => {
            assert_eq!(err.transform, "minify-js");
            // The merged item has no single source; it carries the bundle name.
            assert_eq!(err.path, PathBuf::from("app.min.js"));
        }
        other => panic!("expected a transform error, got {other:?}"),
    }
    assert!(!fs.exists(Path::new("build/app/app.min.js")));
}
