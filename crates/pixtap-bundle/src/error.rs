//! Bundling error types.

use std::path::PathBuf;

/// Error raised while resolving or assembling an applet bundle.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// A `load()` statement attempted to rebind a symbol
    /// (`load("x.star", alias = "y")`), which the bundler cannot express.
    #[error("loading with symbol reassignment is not supported: load(\"{path}\", {alias} = \"{symbol}\")")]
    UnsupportedRebinding {
        /// Load target path as written in the statement.
        path: String,
        /// The rebinding alias.
        alias: String,
        /// The exported symbol being rebound.
        symbol: String,
    },

    /// A script-relative module file could not be read.
    #[error("failed to read module {}: {source}", .path.display())]
    ModuleRead {
        /// Resolved filesystem path of the module.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A `pixlib/` path did not match any packaged library module.
    #[error("unknown pixlib module: {0}")]
    UnknownPixlibModule(String),

    /// A packaged library module is not valid UTF-8.
    #[error("pixlib module {0} is not valid UTF-8")]
    InvalidPixlibModule(String),

    /// The applet entry script could not be read.
    #[error("failed to read applet script {}: {source}", .path.display())]
    ScriptRead {
        /// Path of the entry script.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
