//! Pixlet render orchestration.
//!
//! One render: bundle the applet (directory applets get a callback server
//! and a temporary flattened script), invoke the external `pixlet` binary,
//! retry bounded-ly on timeout-class failures, and return the rendered
//! image as base64.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pixtap_bundle::bundle_script;
use pixtap_callback::CallbackServer;
use pixtap_process::{ProcessRequest, ProcessRunner};

use crate::error::RenderError;

/// Stderr signature of a renderer failure eligible for retry.
const TIMEOUT_SIGNATURE: &str = "context deadline exceeded";

/// Renderer invocation settings.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Renderer binary.
    pub pixlet: String,
    /// Python interpreter for callback helper programs.
    pub python: String,
    /// Pixel magnification factor passed to the renderer.
    pub magnify: Option<u32>,
    /// Maximum retries after the initial attempt for timeout-class failures.
    pub max_retries: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
    /// `key=value` pairs passed through to the applet.
    pub app_config: Vec<(String, String)>,
    /// Timezone handed to the applet as the reserved `$tz` pair.
    pub timezone: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pixlet: "pixlet".to_owned(),
            python: "python3".to_owned(),
            magnify: None,
            max_retries: 3,
            retry_delay: Duration::from_secs(3),
            app_config: Vec::new(),
            timezone: std::env::var("TZ").ok(),
        }
    }
}

/// A successfully rendered applet.
#[derive(Clone, Debug)]
pub struct RenderedImage {
    /// Base64-encoded WebP bytes from the renderer's stdout.
    pub image_data: String,
}

/// Outcome of one renderer invocation, kept for the retry decision and
/// attempt logging.
#[derive(Clone, Debug)]
pub struct RenderAttempt {
    /// 1-based attempt number.
    pub ordinal: u32,
    /// Renderer exit code, `None` if killed by a signal.
    pub code: Option<i32>,
    /// Renderer stderr as text.
    pub stderr: String,
}

impl RenderAttempt {
    /// True if this failure is eligible for retry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.stderr.contains(TIMEOUT_SIGNATURE)
    }
}

/// Drives the external renderer for one applet at a time.
pub struct PixletRenderer {
    options: RenderOptions,
    runner: Arc<dyn ProcessRunner>,
}

impl PixletRenderer {
    pub fn new(options: RenderOptions, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { options, runner }
    }

    /// Render the applet at `app_path`.
    ///
    /// A directory applet gets a callback server for its assets and helper
    /// programs, and its `<stem>.star` entry point is flattened to a
    /// temporary script first. A single-file applet is rendered as-is with
    /// no server.
    pub async fn render(&self, app_path: &Path) -> Result<RenderedImage, RenderError> {
        if !app_path.is_dir() {
            return self.invoke_pixlet(app_path, None).await;
        }

        let server = CallbackServer::start(
            app_path.to_path_buf(),
            self.options.python.clone(),
            Arc::clone(&self.runner),
        )
        .await?;
        let result = self.render_directory(app_path, server.base_url()).await;
        server.shutdown().await;
        result
    }

    /// Bundle a directory applet to a temp script and render it.
    ///
    /// The temp script is deleted on success. On failure it is left on disk
    /// and its path logged, so the flattened source can be inspected.
    async fn render_directory(
        &self,
        dir: &Path,
        callback_url: &str,
    ) -> Result<RenderedImage, RenderError> {
        let stem = dir
            .file_stem()
            .map_or_else(|| "app".to_owned(), |s| s.to_string_lossy().into_owned());
        let script_path = dir.join(format!("{stem}.star"));
        let bundle = bundle_script(&script_path, Some(callback_url))?;

        let temp = tempfile::Builder::new()
            .prefix(&format!("{stem}-"))
            .suffix(".star")
            .tempfile()
            .map_err(RenderError::BundleWrite)?;
        std::fs::write(temp.path(), &bundle).map_err(RenderError::BundleWrite)?;

        match self.invoke_pixlet(temp.path(), Some(callback_url)).await {
            Ok(image) => Ok(image),
            Err(err) => {
                match temp.keep() {
                    Ok((_file, path)) => {
                        tracing::info!(path = %path.display(), "Bundled applet kept for inspection");
                    }
                    Err(keep_err) => {
                        tracing::warn!(error = %keep_err, "Failed to keep bundled applet");
                    }
                }
                Err(err)
            }
        }
    }

    /// Invoke `pixlet render` with bounded retries on timeout-class
    /// failures.
    async fn invoke_pixlet(
        &self,
        script: &Path,
        asset_url: Option<&str>,
    ) -> Result<RenderedImage, RenderError> {
        let request = self.build_request(script, asset_url);
        let mut retries = 0;

        loop {
            tracing::info!(script = %script.display(), "Rendering Pixlet applet");
            let output = self.runner.run(request.clone()).await?;

            if output.success() {
                return Ok(RenderedImage {
                    image_data: BASE64.encode(&output.stdout),
                });
            }

            let attempt = RenderAttempt {
                ordinal: retries + 1,
                code: output.code,
                stderr: output.stderr_text(),
            };
            tracing::debug!(ordinal = attempt.ordinal, code = ?attempt.code, "Renderer attempt failed");

            if attempt.is_timeout() && retries < self.options.max_retries {
                retries += 1;
                tracing::warn!(
                    "Pixlet timed out, retrying after {:?} ({}/{})",
                    self.options.retry_delay,
                    retries,
                    self.options.max_retries,
                );
                tokio::time::sleep(self.options.retry_delay).await;
                continue;
            }

            return Err(RenderError::PixletFailed {
                stderr: attempt.stderr,
            });
        }
    }

    /// Build the renderer command line: fixed flags, then the reserved
    /// `$tz` pair (only when a timezone is known), user config pairs, and
    /// the reserved `$asset_url` pair.
    fn build_request(&self, script: &Path, asset_url: Option<&str>) -> ProcessRequest {
        let mut request = ProcessRequest::new(&self.options.pixlet)
            .arg("render")
            .arg_path(script)
            .arg("-o")
            .arg("-");
        if let Some(magnify) = self.options.magnify {
            request = request.arg("--magnify").arg(magnify.to_string());
        }
        if let Some(tz) = &self.options.timezone {
            request = request.arg(format!("$tz={tz}"));
        }
        for (key, value) in &self.options.app_config {
            request = request.arg(format!("{key}={value}"));
        }
        if let Some(url) = asset_url {
            request = request.arg(format!("$asset_url={url}"));
        }
        request
    }
}
