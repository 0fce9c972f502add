// src/watch/watcher.rs

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::WatchSection;
use crate::fs::RealFileSystem;
use crate::watch::hash::ContentHashes;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchFilter;

/// Watch settings resolved from the `[watch]` config section.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub pattern: String,
    pub exclude: Vec<String>,
    pub coalesce: Duration,
    pub use_hash: bool,
}

impl From<&WatchSection> for WatchSettings {
    fn from(section: &WatchSection) -> Self {
        Self {
            pattern: section.pattern.clone(),
            exclude: section.exclude.clone(),
            coalesce: Duration::from_millis(section.coalesce_ms),
            use_hash: section.use_hash,
        }
    }
}

/// The "first run" flag shared between the orchestration layer and the
/// watch loop. Clones share the flag.
#[derive(Debug, Clone)]
pub struct WatchState {
    first_run: Arc<AtomicBool>,
}

impl Default for WatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchState {
    pub fn new() -> Self {
        Self {
            first_run: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_first_run(&self) -> bool {
        self.first_run.load(Ordering::SeqCst)
    }

    /// Record a successful trigger. Only the first call has an effect.
    pub fn mark_triggered(&self) {
        if self.first_run.swap(false, Ordering::SeqCst) {
            debug!("first run completed");
        }
    }
}

/// Observes a directory tree and turns bursts of changes into single
/// triggers.
#[derive(Debug)]
pub struct WatchLoop {
    root: PathBuf,
    settings: WatchSettings,
    state: WatchState,
    filter: WatchFilter,
    hashes: Option<ContentHashes>,
}

impl WatchLoop {
    pub fn new(root: impl Into<PathBuf>, settings: WatchSettings, state: WatchState) -> Result<Self> {
        let root = root.into();
        // Canonicalize once so event paths strip cleanly.
        let root = root.canonicalize().unwrap_or(root);
        let filter = WatchFilter::new(&settings.pattern, &settings.exclude)?;
        let hashes = settings.use_hash.then(ContentHashes::new);

        Ok(Self {
            root,
            settings,
            state,
            filter,
            hashes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    /// Watch `root` recursively and call `on_trigger(first_run)` once per
    /// burst of relevant changes.
    ///
    /// Runs until the returned future is dropped.
    pub async fn start<F, Fut>(mut self, on_trigger: F) -> Result<()>
    where
        F: FnMut(bool) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let (path_tx, path_rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !is_content_event(&event.kind) {
                        return;
                    }
                    for path in event.paths {
                        if path_tx.send(path).is_err() {
                            debug!("watch channel closed; dropping event");
                            return;
                        }
                    }
                }
                Err(err) => warn!(error = %err, "file watch error"),
            },
            Config::default(),
        )?;

        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        info!(root = ?self.root, pattern = %self.settings.pattern, "watching for changes");

        // `watcher` must stay alive for as long as events are consumed.
        let result = self.run_events(path_rx, on_trigger).await;
        drop(watcher);
        result
    }

    /// Consume changed paths from `rx`, coalescing and triggering.
    ///
    /// After the first relevant path, further paths are absorbed until the
    /// coalescing window passes without a new one. Trigger errors are logged
    /// and the loop continues. Returns when `rx` closes.
    pub async fn run_events<F, Fut>(
        &mut self,
        mut rx: mpsc::UnboundedReceiver<PathBuf>,
        mut on_trigger: F,
    ) -> Result<()>
    where
        F: FnMut(bool) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut closed = false;

        while !closed {
            let Some(first) = rx.recv().await else {
                break;
            };
            let mut changed = Vec::new();
            if let Some(rel) = self.relevant(&first) {
                changed.push(rel);
            }

            loop {
                match tokio::time::timeout(self.settings.coalesce, rx.recv()).await {
                    Ok(Some(path)) => {
                        if let Some(rel) = self.relevant(&path) {
                            changed.push(rel);
                        }
                    }
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_elapsed) => break,
                }
            }

            if changed.is_empty() {
                continue;
            }
            changed.sort();
            changed.dedup();

            let first_run = self.state.is_first_run();
            info!(changed = changed.len(), first_run, "change detected");
            debug!(paths = ?changed, "changed paths");

            match on_trigger(first_run).await {
                Ok(()) => self.state.mark_triggered(),
                Err(err) => error!(error = %format!("{err:#}"), "rebuild failed; still watching"),
            }
        }

        debug!("watch event stream closed");
        Ok(())
    }

    /// Relative path of `path` if it should count as a change.
    fn relevant(&mut self, path: &Path) -> Option<String> {
        let rel = relative_str(&self.root, path)?;
        if rel.is_empty() || !self.filter.matches(&rel) {
            return None;
        }
        if let Some(hashes) = self.hashes.as_mut() {
            if !hashes.has_changed(&RealFileSystem, path) {
                return None;
            }
        }
        Some(rel)
    }
}

fn is_content_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
