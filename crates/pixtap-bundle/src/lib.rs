//! Applet script bundling for pixtap.
//!
//! Pixlet applets are written in a restricted Starlark dialect whose `load()`
//! statement is the only import mechanism. The sandboxed renderer cannot read
//! arbitrary local files, so this crate flattens an applet's module graph into
//! a single self-contained script before rendering:
//!
//! - [`rewrite`]: renames qualified `symbol.NAME` references when a module is
//!   inlined under a caller-chosen symbol
//! - [`loads`]: scans `load()` statements, inlines resolvable modules
//!   (packaged `pixlib/` or script-relative `./`) and collects the rest as
//!   system imports for the renderer's own loader
//! - [`bundler`]: assembles the final document and injects the callback
//!   endpoint URL
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use pixtap_bundle::bundle_script;
//!
//! let bundled = bundle_script(Path::new("clock/clock.star"), None)?;
//! assert!(!bundled.contains("load(\"./"));
//! ```

mod bundler;
mod error;
mod loads;
mod rewrite;

pub use bundler::{CALLBACK_URL_PLACEHOLDER, bundle_script, bundle_source};
pub use error::BundleError;
pub use loads::{ModuleImport, ResolvedSource, extract_loads};
pub use rewrite::{prefix_definitions, rewrite_references};
