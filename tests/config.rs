// tests/config.rs

use std::io::Write;
use std::path::Path;

use taskpipe::config::{ConfigFile, RawConfigFile, load_and_validate, load_or_default};
use taskpipe::errors::PipelineError;
use taskpipe::types::{BuildMode, FailureMode};
use taskpipe_test_utils::builders::ConfigFileBuilder;
use tempfile::NamedTempFile;

fn config_error(raw: RawConfigFile) -> String {
    match ConfigFile::try_from(raw) {
        Err(PipelineError::ConfigError(msg)) => msg,
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_are_valid_and_resolve_the_classic_layout() {
    let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
    assert_eq!(cfg.config.failure_mode, FailureMode::ContinueSiblings);
    cfg.validate_for(BuildMode::Compile).unwrap();

    let layout = cfg.layout(Path::new("/site"));
    assert_eq!(layout.index_file, Path::new("/site/src/index.html"));
    assert_eq!(layout.source_js_lib, Path::new("/site/src/lib"));
    assert_eq!(layout.build_images, Path::new("/site/build/css/images"));
    assert_eq!(layout.source_files, Path::new("/site/files"));
    assert_eq!(layout.build_files, Path::new("/site/build/files"));
}

#[test]
fn source_and_build_dirs_must_differ() {
    let raw = ConfigFileBuilder::new()
        .source_dir("www")
        .build_dir("www/")
        .build_raw();
    assert!(config_error(raw).contains("must differ"));

    let dotted = ConfigFileBuilder::new()
        .source_dir("./www")
        .build_dir("www")
        .build_raw();
    assert!(config_error(dotted).contains("must differ"));
}

#[test]
fn source_and_build_dirs_must_not_nest() {
    for (source, build) in [("src", "src/build"), ("src/", "./src/out/"), ("build/src", "build")] {
        let raw = ConfigFileBuilder::new()
            .source_dir(source)
            .build_dir(build)
            .build_raw();
        assert!(
            config_error(raw).contains("nested"),
            "source {source:?} / build {build:?}"
        );
    }

    // Sharing a name prefix is not nesting.
    let cfg = ConfigFileBuilder::new()
        .source_dir("src")
        .build_dir("src-build")
        .build_raw();
    ConfigFile::try_from(cfg).unwrap();
}

#[test]
fn numeric_limits_are_checked() {
    let port = ConfigFileBuilder::new().server("localhost", 0).build_raw();
    assert!(config_error(port).contains("port"));

    let coalesce = ConfigFileBuilder::new().coalesce_ms(0).build_raw();
    assert!(config_error(coalesce).contains("coalesce_ms"));
}

#[test]
fn lib_order_must_be_non_empty_and_valid() {
    let empty = ConfigFileBuilder::new().lib_order(&[]).build_raw();
    assert!(config_error(empty).contains("lib_order"));

    let bad = ConfigFileBuilder::new().lib_order(&["lib/[broken"]).build_raw();
    assert!(config_error(bad).contains("lib/[broken"));
}

#[test]
fn bundle_names_are_only_required_for_compile() {
    let cfg = ConfigFileBuilder::new().js_lib_file("").build();
    cfg.validate_for(BuildMode::Local).unwrap();

    let err = cfg.validate_for(BuildMode::Compile).unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(msg) if msg.contains("js_lib_file")));
}

#[test]
fn toml_sections_override_defaults() {
    let file = toml_file(
        r#"
[config]
failure_mode = "cancel_siblings"

[paths]
source_dir = "web"
lib_order = ["**/angular.js", "**/*.js"]

[server]
port = 3000

[watch]
coalesce_ms = 50
use_hash = true
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.config.failure_mode, FailureMode::CancelSiblings);
    assert_eq!(cfg.paths.source_dir, "web");
    assert_eq!(cfg.paths.build_dir, "build");
    assert_eq!(cfg.paths.lib_order[0], "**/angular.js");
    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.server.host, "localhost");
    assert_eq!(cfg.watch.coalesce_ms, 50);
    assert!(cfg.watch.use_hash);
}

#[test]
fn unknown_keys_are_rejected() {
    let file = toml_file("[paths]\nsource = \"src\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(PipelineError::TomlError(_))
    ));

    let file = toml_file("[config]\nfailure_mode = \"explode\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(PipelineError::TomlError(_))
    ));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let err = load_or_default("/definitely/not/here/Taskpipe.toml").unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(msg) if msg.contains("cannot read config")));
}

#[test]
fn starter_demo_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/starter/Taskpipe.toml");
    let cfg = load_and_validate(path).unwrap();
    cfg.validate_for(BuildMode::Compile).unwrap();
    assert_eq!(cfg.paths.source_dir, "src");
}
