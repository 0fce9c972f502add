// src/server/mod.rs

//! Development server collaborator.
//!
//! The pipeline only needs two things from a dev server: start serving the
//! build directory, and tell connected browsers to reload. Both sit behind
//! [`DevServer`] so tests can substitute a recording fake.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ServerSection;

pub type ServerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

pub trait DevServer: Send + Sync + fmt::Debug {
    /// Start serving `root` on `host:port`. Returns once the server has been
    /// launched; it keeps running in the background.
    fn serve<'a>(&'a self, root: &'a Path, host: &'a str, port: u16) -> ServerFuture<'a>;

    /// Ask connected clients to reload.
    fn notify_reload(&self) -> ServerFuture<'_>;
}

/// A [`DevServer`] backed by two shell commands.
///
/// `serve_cmd` is spawned once and kept alive for the lifetime of this value
/// (the child is killed on drop). `reload_cmd` runs to completion on every
/// reload. `serve_cmd` may contain `{root}`, `{host}` and `{port}`.
pub struct CommandDevServer {
    serve_cmd: String,
    reload_cmd: String,
    child: Mutex<Option<Child>>,
}

impl fmt::Debug for CommandDevServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDevServer")
            .field("serve_cmd", &self.serve_cmd)
            .field("reload_cmd", &self.reload_cmd)
            .finish_non_exhaustive()
    }
}

impl CommandDevServer {
    pub fn new(serve_cmd: impl Into<String>, reload_cmd: impl Into<String>) -> Self {
        Self {
            serve_cmd: serve_cmd.into(),
            reload_cmd: reload_cmd.into(),
            child: Mutex::new(None),
        }
    }

    pub fn from_config(server: &ServerSection) -> Self {
        Self::new(server.serve_cmd.clone(), server.reload_cmd.clone())
    }

    async fn serve_inner(&self, root: &Path, host: &str, port: u16) -> Result<()> {
        let mut guard = self.child.lock().await;

        if let Some(child) = guard.as_mut() {
            match child.try_wait() {
                Ok(None) => {
                    debug!("dev server already running");
                    return Ok(());
                }
                Ok(Some(status)) => warn!(%status, "dev server exited; restarting"),
                Err(err) => warn!(error = %err, "could not poll dev server; restarting"),
            }
        }

        let cmdline = expand_placeholders(&self.serve_cmd, root, host, port);
        info!(cmd = %cmdline, "starting dev server");

        let mut child = shell_command(&cmdline)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning dev server `{cmdline}`"))?;

        if let Some(stdout) = child.stdout.take() {
            forward_lines("stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines("stderr", stderr);
        }

        *guard = Some(child);
        Ok(())
    }

    async fn reload_inner(&self) -> Result<()> {
        debug!(cmd = %self.reload_cmd, "reloading clients");
        let output = shell_command(&self.reload_cmd)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("running reload command `{}`", self.reload_cmd))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "reload command `{}` exited with {}: {}",
                self.reload_cmd,
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

impl DevServer for CommandDevServer {
    fn serve<'a>(&'a self, root: &'a Path, host: &'a str, port: u16) -> ServerFuture<'a> {
        Box::pin(self.serve_inner(root, host, port))
    }

    fn notify_reload(&self) -> ServerFuture<'_> {
        Box::pin(self.reload_inner())
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(cmdline: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmdline);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmdline);
        c
    }
}

/// Substitute `{root}`, `{host}` and `{port}`.
pub fn expand_placeholders(template: &str, root: &Path, host: &str, port: u16) -> String {
    template
        .replace("{root}", &root.to_string_lossy())
        .replace("{host}", host)
        .replace("{port}", &port.to_string())
}

// Server output is consumed so pipes don't fill; logged at debug.
fn forward_lines<R>(stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(stream, "dev server: {}", line);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_expanded() {
        let cmd = expand_placeholders(
            "serve --root {root} --proxy {host}:{port}",
            Path::new("build"),
            "localhost",
            8000,
        );
        assert_eq!(cmd, "serve --root build --proxy localhost:8000");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_reload_is_an_error() {
        let server = CommandDevServer::new("true", "exit 3");
        let err = server.notify_reload().await.unwrap_err();
        assert!(format!("{err:#}").contains("exit"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn serve_spawns_once() {
        let server = CommandDevServer::new("sleep 5", "true");
        server.serve(Path::new("."), "localhost", 8000).await.unwrap();
        server.serve(Path::new("."), "localhost", 8000).await.unwrap();
        server.notify_reload().await.unwrap();
    }
}
