// tests/watch_loop.rs

mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use common::{TestResult, init_tracing};
use taskpipe::watch::{WatchLoop, WatchSettings, WatchState};
use tempfile::tempdir;
use tokio::sync::mpsc;

fn settings(pattern: &str, use_hash: bool) -> WatchSettings {
    WatchSettings {
        pattern: pattern.to_string(),
        exclude: vec!["**/*.tmp".to_string()],
        coalesce: Duration::from_millis(300),
        use_hash,
    }
}

type Calls = Arc<Mutex<Vec<bool>>>;

/// Trigger handler that records `first_run` and succeeds.
fn recording(calls: &Calls) -> impl FnMut(bool) -> std::future::Ready<anyhow::Result<()>> {
    let calls = Arc::clone(calls);
    move |first_run| {
        calls.lock().unwrap().push(first_run);
        std::future::ready(Ok(()))
    }
}

#[tokio::test(start_paused = true)]
async fn burst_of_events_triggers_once_with_first_run() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let mut watch = WatchLoop::new(dir.path(), settings("**/*.*", false), WatchState::new())?;
    let root = watch.root().to_path_buf();

    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();
    tx.send(root.join("app/main.js"))?;
    tx.send(root.join("css/site.css"))?;
    tx.send(root.join("index.html"))?;
    drop(tx);

    let calls = Calls::default();
    watch.run_events(rx, recording(&calls)).await?;

    assert_eq!(*calls.lock().unwrap(), vec![true]);
    assert!(!watch.state().is_first_run());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn separate_bursts_trigger_separately() -> TestResult {
    let dir = tempdir()?;
    let mut watch = WatchLoop::new(dir.path(), settings("**/*.*", false), WatchState::new())?;
    let root = watch.root().to_path_buf();

    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();
    let producer = tokio::spawn(async move {
        tx.send(root.join("a.js")).unwrap();
        tx.send(root.join("b.js")).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        tx.send(root.join("a.js")).unwrap();
    });

    let calls = Calls::default();
    watch.run_events(rx, recording(&calls)).await?;
    producer.await?;

    assert_eq!(*calls.lock().unwrap(), vec![true, false]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_trigger_keeps_first_run_and_the_loop_alive() -> TestResult {
    let dir = tempdir()?;
    let state = WatchState::new();
    let mut watch = WatchLoop::new(dir.path(), settings("**/*.*", false), state.clone())?;
    let root = watch.root().to_path_buf();

    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();
    tokio::spawn(async move {
        for _ in 0..3 {
            tx.send(root.join("main.js")).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });

    let calls = Calls::default();
    let seen = Arc::clone(&calls);
    let mut attempt = 0;
    watch
        .run_events(rx, move |first_run| {
            seen.lock().unwrap().push(first_run);
            attempt += 1;
            let result = if attempt == 1 {
                Err(anyhow!("build broke"))
            } else {
                Ok(())
            };
            std::future::ready(result)
        })
        .await?;

    assert_eq!(*calls.lock().unwrap(), vec![true, true, false]);
    assert!(!state.is_first_run());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn irrelevant_paths_do_not_trigger() -> TestResult {
    let dir = tempdir()?;
    let mut watch = WatchLoop::new(dir.path(), settings("**/*.js", false), WatchState::new())?;
    let root = watch.root().to_path_buf();

    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();
    tx.send(root.join("style.css"))?;
    tx.send(root.join("scratch.tmp"))?;
    tx.send(PathBuf::from("/somewhere/else/app.js"))?;
    drop(tx);

    let calls = Calls::default();
    watch.run_events(rx, recording(&calls)).await?;

    assert!(calls.lock().unwrap().is_empty());
    assert!(watch.state().is_first_run());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unchanged_content_is_ignored_with_hashing() -> TestResult {
    let dir = tempdir()?;
    let file = dir.path().join("main.js");
    std::fs::write(&file, "var a = 1;")?;

    let mut watch = WatchLoop::new(dir.path(), settings("**/*.js", true), WatchState::new())?;
    let path = watch.root().join("main.js");

    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();
    let producer = tokio::spawn(async move {
        tx.send(path.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        // Same bytes: a no-op save.
        tx.send(path.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        std::fs::write(&path, "var a = 2;").unwrap();
        tx.send(path).unwrap();
    });

    let calls = Calls::default();
    watch.run_events(rx, recording(&calls)).await?;
    producer.await?;

    assert_eq!(*calls.lock().unwrap(), vec![true, false]);
    Ok(())
}

#[tokio::test]
async fn real_file_write_triggers_once_as_first_run() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    std::fs::create_dir_all(dir.path().join("app"))?;

    let watch = WatchLoop::new(dir.path(), settings("**/*.js", false), WatchState::new())?;
    let root = watch.root().to_path_buf();
    let state = watch.state().clone();

    let (tx, mut rx) = mpsc::unbounded_channel::<bool>();
    let watching = watch.start(move |first_run| {
        let _ = tx.send(first_run);
        std::future::ready(Ok(()))
    });
    tokio::pin!(watching);

    let edits = async {
        // Let the watcher register before touching the tree.
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(root.join("app/main.js"), "var app = 1;\n").unwrap();
        std::fs::write(root.join("notes.txt"), "not a script").unwrap();

        let first = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        (first, second)
    };

    let (first, second) = tokio::select! {
        res = &mut watching => panic!("watch loop ended early: {res:?}"),
        out = edits => out,
    };

    assert_eq!(first?, Some(true));
    assert!(second.is_err(), "unexpected second trigger: {second:?}");
    assert!(!state.is_first_run());
    Ok(())
}
