//! Server state.
//!
//! Owned by one [`crate::CallbackServer`] instance and shared across its
//! request handlers; nothing here outlives the render that started it.

use std::path::PathBuf;
use std::sync::Arc;

use pixtap_process::ProcessRunner;

use crate::cache::CallCache;

/// State shared across all handlers of one server instance.
pub(crate) struct ServerState {
    /// Applet directory that GET requests serve files from.
    pub(crate) asset_dir: PathBuf,
    /// Directory holding the materialized packaged library helpers.
    pub(crate) pixlib_dir: PathBuf,
    /// Python interpreter used to run helper programs.
    pub(crate) python: String,
    /// Subprocess capability for helper execution.
    pub(crate) runner: Arc<dyn ProcessRunner>,
    /// Single-flight helper-call cache.
    pub(crate) cache: CallCache,
}
