// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod inject;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod stage;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::cli::{CliArgs, Command};
use crate::config::ConfigFile;
use crate::config::loader::load_or_default;
use crate::dag::TaskGraph;
use crate::fs::RealFileSystem;
use crate::pipeline::PipelineContext;
use crate::pipeline::tasks::{
    CLEAN, COMPILE, LOCAL_FIRST_BUILD, LOCAL_WATCH_BUILD, REMOTE_COMPILE, WATCH_ALIASES,
};
use crate::server::CommandDevServer;
use crate::types::BuildMode;
use crate::watch::{WatchLoop, WatchSettings, WatchState};

/// High-level entry point used by `main.rs`.
///
/// Loads the config, builds the task graph rooted at the config file's
/// directory and dispatches on the selected command.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_or_default(&config_path)?;
    if let Some(mode) = args.failure_mode {
        debug!(?mode, "failure mode overridden on the command line");
        cfg.config.failure_mode = mode;
    }
    let root = config_root_dir(&config_path);

    let ctx = Arc::new(PipelineContext::new(
        cfg.clone(),
        &root,
        Arc::new(RealFileSystem),
        Arc::new(CommandDevServer::from_config(&cfg.server)),
    ));
    let graph = pipeline::build_graph(Arc::clone(&ctx));
    graph.validate()?;

    if args.dry_run {
        print_dry_run(&cfg, &root, &graph)?;
        return Ok(());
    }

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => run_watch(graph, &ctx, &cfg).await,
        Command::Compile => {
            cfg.validate_for(BuildMode::Compile)?;
            graph.run_sequence(&[CLEAN, REMOTE_COMPILE]).await?;
            info!("compile finished");
            Ok(())
        }
        Command::Run { task } => {
            if WATCH_ALIASES.contains(&task.as_str()) {
                return run_watch(graph, &ctx, &cfg).await;
            }
            if task == COMPILE || task.starts_with("remote:") {
                cfg.validate_for(BuildMode::Compile)?;
            }
            let report = graph.run(&task).await?;
            info!(task = %task, completed = report.completed.len(), "task finished");
            Ok(())
        }
        Command::List => {
            print_tasks(&graph);
            Ok(())
        }
    }
}

/// Clean, then rebuild on every burst of changes under the source dir until
/// Ctrl-C.
///
/// The first successful rebuild also starts the dev server; later ones ask
/// it to reload.
async fn run_watch(graph: Arc<TaskGraph>, ctx: &PipelineContext, cfg: &ConfigFile) -> Result<()> {
    graph.run(CLEAN).await?;

    let state = WatchState::new();
    let watch_loop = WatchLoop::new(
        &ctx.layout().source_dir,
        WatchSettings::from(&cfg.watch),
        state,
    )?;

    let on_trigger = move |first_run: bool| {
        let graph = Arc::clone(&graph);
        async move {
            let task = if first_run {
                LOCAL_FIRST_BUILD
            } else {
                LOCAL_WATCH_BUILD
            };
            graph.run(task).await?;
            anyhow::Ok(())
        }
    };

    tokio::select! {
        res = watch_loop.start(on_trigger) => res,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for Ctrl+C");
            }
            info!("interrupted; stopping watch");
            Ok(())
        }
    }
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Taskpipe.toml"),
///   we use that directory.
/// - If it's just a bare filename, we fall back to the current working
///   directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_tasks(graph: &TaskGraph) {
    for name in graph.tasks() {
        let deps = graph.dependencies_of(name);
        if deps.is_empty() {
            println!("{name}");
        } else {
            println!("{name} <- {}", deps.join(", "));
        }
    }
}

/// Print the resolved layout and the task graph in dependency order.
fn print_dry_run(cfg: &ConfigFile, root: &Path, graph: &TaskGraph) -> Result<()> {
    let layout = cfg.layout(root);

    println!("taskpipe dry-run");
    println!("  root = {}", layout.root.display());
    println!("  source_dir = {}", layout.source_dir.display());
    println!("  build_dir = {}", layout.build_dir.display());
    println!("  index_file = {}", layout.index_file.display());
    println!("  lib_order = {:?}", cfg.paths.lib_order);
    println!(
        "  compile = {}, {}, {}",
        cfg.compile.js_lib_file, cfg.compile.js_app_file, cfg.compile.css_file
    );
    println!("  server = {}:{}", cfg.server.host, cfg.server.port);
    println!(
        "  watch = {:?} (exclude {:?}, {} ms, use_hash = {})",
        cfg.watch.pattern, cfg.watch.exclude, cfg.watch.coalesce_ms, cfg.watch.use_hash
    );
    println!("  config.failure_mode = {:?}", cfg.config.failure_mode);
    println!();

    let order = graph.topological_order()?;
    println!("tasks ({}):", order.len());
    for name in order {
        let deps = graph.dependencies_of(name);
        let kind = match graph.get(name) {
            Some(def) if def.action.is_none() => " (alias)",
            _ => "",
        };
        println!("  - {name}{kind}");
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
