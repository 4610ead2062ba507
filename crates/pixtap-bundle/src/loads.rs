//! `load()` statement resolution.
//!
//! Scans a module's source for line-anchored `load("<path>.star", "<symbol>")`
//! statements and classifies each by target:
//!
//! - `pixlib/…` resolves against the packaged library namespace
//! - `./…` resolves against the containing module's directory context
//! - anything else is a **system** import the external renderer's own loader
//!   must resolve, preserved as a statement in the bundle header
//!
//! Resolvable modules are read, recursively resolved, renamed under the bound
//! symbol and collected for inlining. Transitively discovered system imports
//! bubble all the way to the top of the module graph.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::BundleError;
use crate::rewrite::{prefix_definitions, rewrite_references};

/// Reserved prefix for the packaged library namespace.
const PIXLIB_PREFIX: &str = "pixlib/";

/// Fixed grammar for import statements. Anything that fails to match is left
/// in the text verbatim; only this statement shape is special-cased.
static LOAD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^load\(['"](?P<path>[^'"]+\.star)['"], ?(?:(?P<alias>[a-z_]+) ?= ?)?['"](?P<symbol>[^'"]+)['"]\)\n"#,
    )
    .unwrap_or_else(|_| unreachable!("static pattern"))
});

/// One import discovered during load resolution, keyed by bound symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleImport {
    /// Unresolvable locally; the statement is re-emitted for the renderer's
    /// own loader.
    System {
        /// The original statement text.
        statement: String,
    },
    /// Resolved and inlined: the module body, renamed under the bound symbol
    /// and wrapped in origin markers.
    Resolved {
        /// Renamed, marker-wrapped module text.
        text: String,
    },
}

/// Result of resolving one module's imports.
#[derive(Debug)]
pub struct ResolvedSource {
    /// The module text with all import statements stripped and references to
    /// locally resolved symbols rewritten.
    pub text: String,
    /// Discovered imports in discovery order (transitive imports first),
    /// deduplicated by bound symbol.
    pub imports: Vec<(String, ModuleImport)>,
}

/// Namespace a module's `./` imports resolve against.
#[derive(Clone, Debug)]
enum ModuleContext {
    /// Filesystem directory of the containing script.
    Dir(PathBuf),
    /// Subpath within the packaged pixlib namespace (empty for its root).
    Pixlib(String),
}

/// Resolve all imports of an applet script rooted at `dir`.
pub fn extract_loads(dir: &Path, source: &str) -> Result<ResolvedSource, BundleError> {
    let mut imports = Vec::new();
    let text = extract_loads_inner(&ModuleContext::Dir(dir.to_path_buf()), source, &mut imports)?;
    Ok(ResolvedSource { text, imports })
}

fn extract_loads_inner(
    context: &ModuleContext,
    source: &str,
    accumulator: &mut Vec<(String, ModuleImport)>,
) -> Result<String, BundleError> {
    let mut my_imports: Vec<(String, ModuleImport)> = Vec::new();
    let mut stripped = String::with_capacity(source.len());
    let mut last = 0;

    for caps in LOAD_PATTERN.captures_iter(source) {
        let whole = caps
            .get(0)
            .unwrap_or_else(|| unreachable!("group 0 always present"));
        stripped.push_str(&source[last..whole.start()]);
        last = whole.end();

        let path = &caps["path"];
        let symbol = &caps["symbol"];

        // Rebinding must fail fast, before any module file is touched.
        if let Some(alias) = caps.name("alias") {
            return Err(BundleError::UnsupportedRebinding {
                path: path.to_owned(),
                alias: alias.as_str().to_owned(),
                symbol: symbol.to_owned(),
            });
        }

        match resolve_target(context, path)? {
            Some((child_context, child_source)) => {
                tracing::debug!(path, symbol, "inlining module");
                let child = extract_loads_inner(&child_context, &child_source, accumulator)?;
                let renamed = rewrite_references(symbol, &prefix_definitions(symbol, &child));
                let wrapped = format!(
                    "### Start {path}\n{}\n### End {path}",
                    renamed.trim_matches('\n')
                );
                upsert(&mut my_imports, symbol, ModuleImport::Resolved { text: wrapped });
            }
            None => {
                tracing::debug!(path, symbol, "keeping system import");
                let statement = format!("load(\"{path}\", \"{symbol}\")");
                upsert(&mut my_imports, symbol, ModuleImport::System { statement });
            }
        }
    }
    stripped.push_str(&source[last..]);

    // References in the importing module itself must match the renamed
    // definitions of every module resolved at this level.
    let mut text = stripped;
    for (symbol, import) in &my_imports {
        if matches!(import, ModuleImport::Resolved { .. }) {
            text = rewrite_references(symbol, &text);
        }
    }

    // Children first, then this level: deepest modules end up earliest in
    // the bundle so definitions precede their uses.
    for (symbol, import) in my_imports {
        upsert_owned(accumulator, symbol, import);
    }

    Ok(text)
}

/// Read the target of a resolvable import, or `None` for a system import.
fn resolve_target(
    context: &ModuleContext,
    path: &str,
) -> Result<Option<(ModuleContext, String)>, BundleError> {
    if let Some(key) = path.strip_prefix(PIXLIB_PREFIX) {
        let text = read_pixlib(key)?;
        return Ok(Some((ModuleContext::Pixlib(parent_of(key)), text)));
    }

    if let Some(relative) = path.strip_prefix("./") {
        return match context {
            ModuleContext::Dir(dir) => {
                let full = dir.join(relative);
                let text = std::fs::read_to_string(&full).map_err(|source| {
                    BundleError::ModuleRead { path: full.clone(), source }
                })?;
                let parent = full.parent().map(Path::to_path_buf).unwrap_or_default();
                Ok(Some((ModuleContext::Dir(parent), text)))
            }
            ModuleContext::Pixlib(subdir) => {
                let key = format!("{subdir}{relative}");
                let text = read_pixlib(&key)?;
                Ok(Some((ModuleContext::Pixlib(parent_of(&key)), text)))
            }
        };
    }

    Ok(None)
}

/// Read a packaged library module as UTF-8 text.
fn read_pixlib(key: &str) -> Result<String, BundleError> {
    let bytes = pixtap_pixlib::get(key)
        .ok_or_else(|| BundleError::UnknownPixlibModule(key.to_owned()))?;
    String::from_utf8(bytes.into_owned())
        .map_err(|_| BundleError::InvalidPixlibModule(key.to_owned()))
}

/// Directory part of a pixlib key, with trailing slash (empty for the root).
fn parent_of(key: &str) -> String {
    key.rfind('/').map_or_else(String::new, |i| key[..=i].to_owned())
}

/// Insert or replace by symbol, keeping the original position on replace.
fn upsert(imports: &mut Vec<(String, ModuleImport)>, symbol: &str, import: ModuleImport) {
    upsert_owned(imports, symbol.to_owned(), import);
}

fn upsert_owned(imports: &mut Vec<(String, ModuleImport)>, symbol: String, import: ModuleImport) {
    if let Some(entry) = imports.iter_mut().find(|(s, _)| *s == symbol) {
        entry.1 = import;
    } else {
        imports.push((symbol, import));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn write_module(dir: &Path, name: &str, text: &str) {
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn test_system_import_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let source = "load(\"render.star\", \"render\")\nrender.Root()\n";

        let resolved = extract_loads(dir.path(), source).unwrap();

        assert_eq!(resolved.text, "render.Root()\n");
        assert_eq!(
            resolved.imports,
            vec![(
                "render".to_owned(),
                ModuleImport::System {
                    statement: "load(\"render.star\", \"render\")".to_owned()
                }
            )]
        );
    }

    #[test]
    fn test_relative_import_inlined_and_renamed() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "greeter.star", "def greet(name):\n    return name\n");
        let source = "load(\"./greeter.star\", \"g\")\ng.greet(\"hi\")\n";

        let resolved = extract_loads(dir.path(), source).unwrap();

        assert_eq!(resolved.text, "g__greet(\"hi\")\n");
        let (symbol, import) = &resolved.imports[0];
        assert_eq!(symbol, "g");
        let ModuleImport::Resolved { text } = import else {
            panic!("expected resolved import, got {import:?}");
        };
        assert_eq!(
            text,
            "### Start ./greeter.star\ndef g__greet(name):\n    return name\n### End ./greeter.star"
        );
    }

    #[test]
    fn test_rebinding_fails_without_reading_module() {
        let dir = tempfile::tempdir().unwrap();
        // The module file deliberately does not exist: the rebinding check
        // must fire before any read is attempted.
        let source = "load(\"./missing.star\", alias = \"y\")\n";

        let err = extract_loads(dir.path(), source).unwrap_err();

        assert!(
            matches!(err, BundleError::UnsupportedRebinding { .. }),
            "expected UnsupportedRebinding, got {err:?}"
        );
    }

    #[test]
    fn test_missing_relative_module_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = "load(\"./nope.star\", \"n\")\n";

        let err = extract_loads(dir.path(), source).unwrap_err();

        assert!(matches!(err, BundleError::ModuleRead { .. }));
    }

    #[test]
    fn test_transitive_system_imports_bubble_up() {
        let dir = tempfile::tempdir().unwrap();
        write_module(
            dir.path(),
            "child.star",
            "load(\"http.star\", \"http\")\ndef fetch(url):\n    return http.get(url)\n",
        );
        let source = "load(\"./child.star\", \"c\")\nc.fetch(\"x\")\n";

        let resolved = extract_loads(dir.path(), source).unwrap();

        let symbols: Vec<&str> = resolved.imports.iter().map(|(s, _)| s.as_str()).collect();
        // The child's system import is discovered before the child itself.
        assert_eq!(symbols, vec!["http", "c"]);
        assert!(matches!(resolved.imports[0].1, ModuleImport::System { .. }));
        assert!(matches!(resolved.imports[1].1, ModuleImport::Resolved { .. }));
    }

    #[test]
    fn test_nested_relative_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        write_module(dir.path().join("lib").as_path(), "inner.star", "VALUE = 7\n");
        write_module(
            dir.path(),
            "lib/outer.star",
            "load(\"./inner.star\", \"inner\")\ndef read():\n    return inner.VALUE\n",
        );
        // inner.star lives next to outer.star, not next to the applet script.
        let source = "load(\"./lib/outer.star\", \"o\")\no.read()\n";

        let resolved = extract_loads(dir.path(), source).unwrap();

        let symbols: Vec<&str> = resolved.imports.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(symbols, vec!["inner", "o"]);
        let ModuleImport::Resolved { text } = &resolved.imports[0].1 else {
            panic!("expected resolved inner module");
        };
        assert!(text.contains("inner__VALUE = 7"));
    }

    #[test]
    fn test_duplicate_symbol_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let source =
            "load(\"http.star\", \"http\")\nload(\"http.star\", \"http\")\nhttp.get(\"x\")\n";

        let resolved = extract_loads(dir.path(), source).unwrap();

        assert_eq!(resolved.imports.len(), 1);
    }

    #[test]
    fn test_malformed_statement_left_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        // Missing the .star suffix: not special-cased, stays in the text.
        let source = "load(\"weird\", \"w\")\n";

        let resolved = extract_loads(dir.path(), source).unwrap();

        assert_eq!(resolved.text, source);
        assert!(resolved.imports.is_empty());
    }

    #[test]
    fn test_pixlib_module_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let source = "load(\"pixlib/html.star\", \"html\")\nhtml.unescape(\"&amp;\")\n";

        let resolved = extract_loads(dir.path(), source).unwrap();

        assert_eq!(resolved.text, "html__unescape(\"&amp;\")\n");
        let (symbol, ModuleImport::Resolved { text }) = &resolved.imports[resolved.imports.len() - 1]
        else {
            panic!("expected resolved pixlib module");
        };
        assert_eq!(symbol, "html");
        assert!(text.starts_with("### Start pixlib/html.star\n"));
        assert!(text.contains("def html__unescape("));
    }

    #[test]
    fn test_unknown_pixlib_module_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = "load(\"pixlib/nope.star\", \"n\")\n";

        let err = extract_loads(dir.path(), source).unwrap_err();

        assert!(matches!(err, BundleError::UnknownPixlibModule(_)));
    }
}
