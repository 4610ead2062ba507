//! Render errors.

use pixtap_bundle::BundleError;
use pixtap_callback::CallbackError;
use pixtap_process::ProcessError;

/// Error rendering an applet.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Bundling the applet script failed.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// The callback server could not be started.
    #[error(transparent)]
    Callback(#[from] CallbackError),

    /// The bundled script could not be written to a temp file.
    #[error("failed to write bundled applet: {0}")]
    BundleWrite(#[source] std::io::Error),

    /// The renderer binary could not be spawned.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The renderer exited non-zero (after exhausting any retries).
    #[error("pixlet failed: {stderr}")]
    PixletFailed {
        /// Renderer stderr, verbatim.
        stderr: String,
    },
}
