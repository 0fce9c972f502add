// src/pipeline.rs

//! The concrete front-end build graph.
//!
//! `local:*` tasks copy sources into the build directory unchanged and
//! inject one reference per file into the entry template. `remote:*` tasks
//! concatenate and minify into single bundles and inject those instead.
//! Stage and filesystem work runs on the blocking pool.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use anyhow::{Context, anyhow};
use tracing::{debug, info};

use crate::config::{ConfigFile, Layout};
use crate::dag::TaskGraph;
use crate::engine::TaskAction;
use crate::fs::{FileSystem, copy_tree};
use crate::inject::{Injection, Injector, MarkerRegion, reference_path};
use crate::server::DevServer;
use crate::stage::plugins::{Concat, Lint, MinifyCss, MinifyJs};
use crate::stage::{Stage, StageReport, StageRunner, Step, match_files};

/// Task names registered by [`build_graph`].
pub mod tasks {
    pub const CLEAN: &str = "clean";
    pub const COPY_FILES: &str = "copy:files";
    pub const COPY_IMAGES: &str = "copy:images";
    pub const LOCAL_JS_LIB: &str = "local:js-lib";
    pub const LOCAL_JS_APP: &str = "local:js-app";
    pub const LOCAL_CSS: &str = "local:css";
    pub const LOCAL_BUILD: &str = "local:build";
    pub const LOCAL_SERVER: &str = "local:server";
    pub const LOCAL_RELOAD: &str = "local:reload";
    pub const LOCAL_FIRST_BUILD: &str = "local:first-build";
    pub const LOCAL_WATCH_BUILD: &str = "local:watch-build";
    pub const REMOTE_JS_LIB: &str = "remote:js-lib";
    pub const REMOTE_JS_APP: &str = "remote:js-app";
    pub const REMOTE_CSS: &str = "remote:css";
    pub const REMOTE_COMPILE: &str = "remote:compile";
    pub const REMOTE_BUILD: &str = "remote:build";
    pub const COMPILE: &str = "compile";

    /// Names that mean "start the watch command" rather than a graph task.
    pub const WATCH_ALIASES: &[&str] = &["local:watch", "watch", "default"];
}

use tasks::*;

/// Marker regions in the entry template.
pub const REGION_JS_LIB: &str = "js-lib";
pub const REGION_JS_APP: &str = "js-app";
pub const REGION_CSS: &str = "css";

/// Shared state captured by every task action.
#[derive(Debug)]
pub struct PipelineContext {
    cfg: ConfigFile,
    layout: Layout,
    fs: Arc<dyn FileSystem>,
    server: Arc<dyn DevServer>,
}

impl PipelineContext {
    pub fn new(
        cfg: ConfigFile,
        root: &Path,
        fs: Arc<dyn FileSystem>,
        server: Arc<dyn DevServer>,
    ) -> Self {
        let layout = cfg.layout(root);
        Self {
            cfg,
            layout,
            fs,
            server,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Where the injected entry template is written.
    pub fn built_index(&self) -> PathBuf {
        self.layout.build_dir.join(&self.cfg.paths.index_file)
    }

    pub fn local_js_lib_stage(&self) -> Stage {
        Stage::new(
            LOCAL_JS_LIB,
            &self.layout.source_js_lib,
            &["**/*.js"],
            &self.layout.build_js_lib,
        )
    }

    pub fn local_js_app_stage(&self) -> Stage {
        let stage = Stage::new(
            LOCAL_JS_APP,
            &self.layout.source_js_app,
            &["**/*.js"],
            &self.layout.build_js_app,
        );
        if self.cfg.lint.enabled {
            stage.pipe(Step::map(Lint::new(self.cfg.lint.max_line_length)))
        } else {
            stage
        }
    }

    pub fn local_css_stage(&self) -> Stage {
        Stage::new(
            LOCAL_CSS,
            &self.layout.source_css,
            &["**/*.css"],
            &self.layout.build_css,
        )
    }

    pub fn remote_js_lib_stage(&self) -> Stage {
        Stage::new(
            REMOTE_JS_LIB,
            &self.layout.source_js_lib,
            &[],
            &self.layout.build_js_lib,
        )
        .with_patterns(self.cfg.paths.lib_order.clone())
        .pipe(Step::merge(Concat::new(&self.cfg.compile.js_lib_file)))
        .pipe(Step::map(MinifyJs))
    }

    pub fn remote_js_app_stage(&self) -> Stage {
        Stage::new(
            REMOTE_JS_APP,
            &self.layout.source_js_app,
            &["**/*.js"],
            &self.layout.build_js_app,
        )
        .pipe(Step::merge(Concat::new(&self.cfg.compile.js_app_file)))
        .pipe(Step::map(MinifyJs))
    }

    pub fn remote_css_stage(&self) -> Stage {
        Stage::new(
            REMOTE_CSS,
            &self.layout.source_css,
            &["**/*.css"],
            &self.layout.build_css,
        )
        .pipe(Step::merge(Concat::new(&self.cfg.compile.css_file)))
        .pipe(Step::map(MinifyCss))
    }

    /// References for the development build: every copied file, lib files
    /// in `lib_order` priority.
    pub fn local_injections(&self) -> anyhow::Result<Vec<Injection>> {
        let lib = self.references(&self.layout.build_js_lib, &self.cfg.paths.lib_order)?;
        let app = self.references(&self.layout.build_js_app, &["**/*.js".to_string()])?;
        let css = self.references(&self.layout.build_css, &["**/*.css".to_string()])?;
        Ok(vec![
            Injection::new(MarkerRegion::named(REGION_JS_LIB), lib),
            Injection::new(MarkerRegion::named(REGION_JS_APP), app),
            Injection::new(MarkerRegion::named(REGION_CSS), css),
        ])
    }

    /// References for the compiled build: one bundle per region, if it was
    /// produced.
    pub fn compiled_injections(&self) -> Vec<Injection> {
        let bundle = |dir: &Path, file: &str| -> Vec<String> {
            let path = dir.join(file);
            if self.fs.is_file(&path) {
                vec![reference_path(&self.layout.build_dir, &path)]
            } else {
                debug!(path = ?path, "bundle not produced; region left as is");
                Vec::new()
            }
        };
        let compile = &self.cfg.compile;
        vec![
            Injection::new(
                MarkerRegion::named(REGION_JS_LIB),
                bundle(&self.layout.build_js_lib, &compile.js_lib_file),
            ),
            Injection::new(
                MarkerRegion::named(REGION_JS_APP),
                bundle(&self.layout.build_js_app, &compile.js_app_file),
            ),
            Injection::new(
                MarkerRegion::named(REGION_CSS),
                bundle(&self.layout.build_css, &compile.css_file),
            ),
        ]
    }

    fn references(&self, base: &Path, patterns: &[String]) -> anyhow::Result<Vec<String>> {
        Ok(match_files(self.fs.as_ref(), base, patterns)?
            .into_iter()
            .map(|m| reference_path(&self.layout.build_dir, &m.path))
            .collect())
    }

    /// Read the entry template, inject, and write it into the build dir.
    pub fn write_index(&self, injections: Vec<Injection>) -> anyhow::Result<PathBuf> {
        let template = self
            .fs
            .read_to_string(&self.layout.index_file)
            .with_context(|| format!("reading template {:?}", self.layout.index_file))?;
        let html = Injector::new(injections)?.inject(&template);

        let target = self.built_index();
        self.fs
            .write(&target, html.as_bytes())
            .with_context(|| format!("writing {target:?}"))?;
        info!(path = ?target, "wrote entry template");
        Ok(target)
    }

    pub fn clean(&self) -> anyhow::Result<()> {
        info!(dir = ?self.layout.build_dir, "cleaning build directory");
        self.fs.remove_tree(&self.layout.build_dir)
    }

    fn copy(&self, task: &str, src: &Path, dst: &Path) -> anyhow::Result<()> {
        let copied = copy_tree(self.fs.as_ref(), src, dst)?;
        info!(task, copied, "copied files");
        Ok(())
    }

    /// Run `f` on the blocking pool.
    async fn blocking<T, F>(self: &Arc<Self>, what: &str, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&PipelineContext) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let ctx = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&ctx))
            .await
            .with_context(|| format!("{what} did not complete"))?
    }

    async fn run_stage(self: &Arc<Self>, stage: Stage) -> anyhow::Result<StageReport> {
        let name = stage.name.clone();
        self.blocking(&name, move |ctx| {
            Ok(StageRunner::new(Arc::clone(&ctx.fs)).run(&stage)?)
        })
        .await
    }

    async fn serve(&self) -> anyhow::Result<()> {
        let server = &self.cfg.server;
        self.server
            .serve(&self.layout.build_dir, &server.host, server.port)
            .await
    }

    async fn reload(&self) -> anyhow::Result<()> {
        self.server.notify_reload().await
    }
}

/// Wrap an async method of the context as a task action.
fn action<F, Fut>(ctx: &Arc<PipelineContext>, f: F) -> impl TaskAction + 'static
where
    F: Fn(Arc<PipelineContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    move || f(Arc::clone(&ctx))
}

/// Register every pipeline task.
///
/// `remote:build` (and its alias `compile`) runs `clean` and then
/// `remote:compile` as two consecutive runs of the returned graph.
pub fn build_graph(ctx: Arc<PipelineContext>) -> Arc<TaskGraph> {
    Arc::new_cyclic(|weak: &Weak<TaskGraph>| {
        let mut graph = TaskGraph::new(ctx.cfg.config.failure_mode);

        graph.register(
            CLEAN,
            &[],
            action(&ctx, |ctx| async move { ctx.blocking(CLEAN, |c| c.clean()).await }),
        );
        graph.register(
            COPY_FILES,
            &[],
            action(&ctx, |ctx| async move {
                ctx.blocking(COPY_FILES, |c| {
                    c.copy(COPY_FILES, &c.layout.source_files, &c.layout.build_files)
                })
                .await
            }),
        );
        graph.register(
            COPY_IMAGES,
            &[],
            action(&ctx, |ctx| async move {
                ctx.blocking(COPY_IMAGES, |c| {
                    c.copy(COPY_IMAGES, &c.layout.source_images, &c.layout.build_images)
                })
                .await
            }),
        );

        graph.register(
            LOCAL_JS_LIB,
            &[],
            action(&ctx, |ctx| async move {
                ctx.run_stage(ctx.local_js_lib_stage()).await.map(|_| ())
            }),
        );
        graph.register(
            LOCAL_JS_APP,
            &[],
            action(&ctx, |ctx| async move {
                let report = ctx.run_stage(ctx.local_js_app_stage()).await?;
                if !report.advisories.is_empty() {
                    info!(
                        task = LOCAL_JS_APP,
                        findings = report.advisories.len(),
                        "lint reported issues"
                    );
                }
                anyhow::Ok(())
            }),
        );
        graph.register(
            LOCAL_CSS,
            &[],
            action(&ctx, |ctx| async move {
                ctx.run_stage(ctx.local_css_stage()).await.map(|_| ())
            }),
        );
        graph.register(
            LOCAL_BUILD,
            &[COPY_FILES, COPY_IMAGES, LOCAL_JS_LIB, LOCAL_JS_APP, LOCAL_CSS],
            action(&ctx, |ctx| async move {
                ctx.blocking(LOCAL_BUILD, |c| c.write_index(c.local_injections()?))
                    .await
                    .map(|_| ())
            }),
        );

        graph.register(
            LOCAL_SERVER,
            &[],
            action(&ctx, |ctx| async move { ctx.serve().await }),
        );
        graph.register(
            LOCAL_RELOAD,
            &[],
            action(&ctx, |ctx| async move { ctx.reload().await }),
        );
        graph.register(
            LOCAL_FIRST_BUILD,
            &[LOCAL_BUILD],
            action(&ctx, |ctx| async move { ctx.serve().await }),
        );
        graph.register(
            LOCAL_WATCH_BUILD,
            &[LOCAL_BUILD],
            action(&ctx, |ctx| async move { ctx.reload().await }),
        );

        graph.register(
            REMOTE_JS_LIB,
            &[],
            action(&ctx, |ctx| async move {
                ctx.run_stage(ctx.remote_js_lib_stage()).await.map(|_| ())
            }),
        );
        graph.register(
            REMOTE_JS_APP,
            &[],
            action(&ctx, |ctx| async move {
                ctx.run_stage(ctx.remote_js_app_stage()).await.map(|_| ())
            }),
        );
        graph.register(
            REMOTE_CSS,
            &[],
            action(&ctx, |ctx| async move {
                ctx.run_stage(ctx.remote_css_stage()).await.map(|_| ())
            }),
        );
        graph.register(
            REMOTE_COMPILE,
            &[COPY_FILES, COPY_IMAGES, REMOTE_JS_LIB, REMOTE_JS_APP, REMOTE_CSS],
            action(&ctx, |ctx| async move {
                ctx.blocking(REMOTE_COMPILE, |c| c.write_index(c.compiled_injections()))
                    .await
                    .map(|_| ())
            }),
        );

        let weak = weak.clone();
        graph.register(REMOTE_BUILD, &[], move || {
            let weak = weak.clone();
            async move {
                let graph = weak
                    .upgrade()
                    .ok_or_else(|| anyhow!("task graph dropped during {REMOTE_BUILD}"))?;
                graph.run_sequence(&[CLEAN, REMOTE_COMPILE]).await?;
                anyhow::Ok(())
            }
        });
        graph.alias(COMPILE, &[REMOTE_BUILD]);

        graph
    })
}
