//! Loopback HTTP callback server for applet renders.
//!
//! While the external renderer draws an applet, it can reach back into this
//! process over HTTP: `GET` requests serve static assets from the applet
//! directory, `POST` requests run helper programs (packaged library helpers
//! or applet-relative scripts) as subprocesses and return their output.
//!
//! One [`CallbackServer`] is started per render on an ephemeral loopback
//! port and torn down when the render finishes. Helper responses are cached
//! per `(path, body)` for the lifetime of the instance, with a single-flight
//! guard so a concurrent duplicate call fails fast instead of running the
//! helper twice.

mod app;
mod cache;
mod handlers;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use pixtap_process::ProcessRunner;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::cache::CallCache;
use crate::state::ServerState;

/// Error starting the callback server.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// Could not write the packaged library helpers to a temp directory.
    #[error("failed to materialize packaged library: {0}")]
    Materialize(#[source] std::io::Error),

    /// Could not bind the loopback listener.
    #[error("failed to bind loopback listener: {0}")]
    Bind(#[source] std::io::Error),
}

/// A running callback server bound to an ephemeral loopback port.
pub struct CallbackServer {
    base_url: String,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    // Holds the materialized pixlib helpers for the server's lifetime.
    _pixlib_dir: TempDir,
}

impl CallbackServer {
    /// Start a server serving assets from `asset_dir` and running helper
    /// programs through `runner` with the `python` interpreter.
    pub async fn start(
        asset_dir: PathBuf,
        python: String,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self, CallbackError> {
        let pixlib_dir = TempDir::new().map_err(CallbackError::Materialize)?;
        pixtap_pixlib::materialize(pixlib_dir.path()).map_err(CallbackError::Materialize)?;

        let state = Arc::new(ServerState {
            asset_dir,
            pixlib_dir: pixlib_dir.path().to_path_buf(),
            python,
            runner,
            cache: CallCache::default(),
        });
        let router = app::create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(CallbackError::Bind)?;
        let addr = listener.local_addr().map_err(CallbackError::Bind)?;
        let base_url = format!("http://{addr}/");
        tracing::info!(url = %base_url, "Serving applet assets and helpers");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, router).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(err) = serve.await {
                tracing::error!(error = %err, "Callback server exited with error");
            }
        });

        Ok(Self {
            base_url,
            shutdown_tx,
            task,
            _pixlib_dir: pixlib_dir,
        })
    }

    /// Base URL of the server, always with a trailing slash
    /// (`http://127.0.0.1:<port>/`).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Shut the server down and wait for it to finish. Teardown problems
    /// are logged, never surfaced: they must not mask the render outcome.
    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            tracing::warn!("Callback server already stopped");
        }
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "Callback server task failed during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use pixtap_process::{MockRunner, ProcessOutput};

    use super::*;

    #[tokio::test]
    async fn test_start_binds_ephemeral_loopback_port() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockRunner::with_output(ProcessOutput::default()));

        let server = CallbackServer::start(dir.path().to_path_buf(), "python3".to_owned(), runner)
            .await
            .unwrap();

        assert!(server.base_url().starts_with("http://127.0.0.1:"));
        assert!(server.base_url().ends_with('/'));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_two_servers_get_distinct_ports() {
        let dir = tempfile::tempdir().unwrap();
        let runner: Arc<dyn pixtap_process::ProcessRunner> =
            Arc::new(MockRunner::with_output(ProcessOutput::default()));

        let first = CallbackServer::start(
            dir.path().to_path_buf(),
            "python3".to_owned(),
            Arc::clone(&runner),
        )
        .await
        .unwrap();
        let second = CallbackServer::start(
            dir.path().to_path_buf(),
            "python3".to_owned(),
            Arc::clone(&runner),
        )
        .await
        .unwrap();

        assert_ne!(first.base_url(), second.base_url());
        first.shutdown().await;
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_materialized_pixlib_contains_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockRunner::with_output(ProcessOutput::default()));

        let server = CallbackServer::start(dir.path().to_path_buf(), "python3".to_owned(), runner)
            .await
            .unwrap();

        assert!(server._pixlib_dir.path().join("_rpc.py").exists());
        server.shutdown().await;
    }
}
