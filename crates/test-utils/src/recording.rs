use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use taskpipe::engine::{ActionFuture, TaskAction};
use taskpipe::server::{DevServer, ServerFuture};

/// Shared, ordered event log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Position of `event` in the log.
    pub fn index_of(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    /// Action that logs `start:<name>` and `end:<name>`.
    pub fn action(&self, name: &str) -> RecordingAction {
        RecordingAction {
            name: name.to_string(),
            recorder: self.clone(),
            delay: Duration::ZERO,
            fail: false,
        }
    }
}

/// A task action that records when it starts and ends.
#[derive(Debug, Clone)]
pub struct RecordingAction {
    name: String,
    recorder: Recorder,
    delay: Duration,
    fail: bool,
}

impl RecordingAction {
    /// Sleep between start and end.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Return an error after logging `start`.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl TaskAction for RecordingAction {
    fn call(&self) -> ActionFuture {
        let this = self.clone();
        Box::pin(async move {
            this.recorder.push(format!("start:{}", this.name));
            if !this.delay.is_zero() {
                tokio::time::sleep(this.delay).await;
            }
            if this.fail {
                return Err(anyhow!("{} failed on purpose", this.name));
            }
            this.recorder.push(format!("end:{}", this.name));
            Ok(())
        })
    }
}

/// A `DevServer` that only records calls.
#[derive(Debug, Clone, Default)]
pub struct RecordingDevServer {
    pub recorder: Recorder,
}

impl RecordingDevServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serves(&self) -> usize {
        self.recorder
            .events()
            .iter()
            .filter(|e| e.starts_with("serve:"))
            .count()
    }

    pub fn reloads(&self) -> usize {
        self.recorder.count("reload")
    }
}

impl DevServer for RecordingDevServer {
    fn serve<'a>(&'a self, root: &'a Path, host: &'a str, port: u16) -> ServerFuture<'a> {
        Box::pin(async move {
            self.recorder
                .push(format!("serve:{}:{host}:{port}", root.display()));
            Ok(())
        })
    }

    fn notify_reload(&self) -> ServerFuture<'_> {
        Box::pin(async move {
            self.recorder.push("reload");
            Ok(())
        })
    }
}
