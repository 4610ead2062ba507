//! Bundle assembly.
//!
//! Concatenates the resolved module graph into one self-contained document:
//! system import statements first (deduplicated by symbol), then inlined
//! module bodies in discovery order, then the processed script body. When a
//! callback endpoint is supplied, the fixed placeholder token is replaced
//! with the literal URL — the only way the sandboxed script learns where to
//! send its callback requests.

use std::path::Path;

use crate::error::BundleError;
use crate::loads::{ModuleImport, extract_loads};

/// Placeholder token substituted with the callback endpoint URL at bundle
/// time. Library modules embed this token where they need the endpoint.
pub const CALLBACK_URL_PLACEHOLDER: &str = "{{PIXTAP_CALLBACK_URL}}";

/// Bundle the applet script at `script_path`.
///
/// Reads the script and delegates to [`bundle_source`] with the script's own
/// directory as the resolution context.
pub fn bundle_script(
    script_path: &Path,
    callback_url: Option<&str>,
) -> Result<String, BundleError> {
    let source =
        std::fs::read_to_string(script_path).map_err(|source| BundleError::ScriptRead {
            path: script_path.to_path_buf(),
            source,
        })?;
    let dir = script_path.parent().unwrap_or_else(|| Path::new("."));
    bundle_source(&source, dir, callback_url)
}

/// Flatten `source` (resolved against `dir`) into a single document.
///
/// Re-running on the produced output is byte-identical: the output contains
/// no import statements and all renamed references no longer match.
pub fn bundle_source(
    source: &str,
    dir: &Path,
    callback_url: Option<&str>,
) -> Result<String, BundleError> {
    let resolved = extract_loads(dir, source)?;

    let mut sections: Vec<String> = Vec::new();
    for (_, import) in &resolved.imports {
        if let ModuleImport::System { statement } = import {
            sections.push(statement.clone());
        }
    }
    for (_, import) in &resolved.imports {
        if let ModuleImport::Resolved { text } = import {
            sections.push(text.clone());
        }
    }
    sections.push(resolved.text.trim_matches('\n').to_owned());

    let mut bundle = sections.join("\n\n");
    if let Some(url) = callback_url {
        bundle = bundle.replace(CALLBACK_URL_PLACEHOLDER, url);
    }
    Ok(bundle)
}
