//! Import specifier -> file resolution.
//!
//! Resolution is a pure function of the importing file and the specifier.
//! Bare package specifiers never resolve; relative and absolute specifiers try
//! the literal path, then each known extension appended, then `index.*` inside
//! the path taken as a directory.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Extensions tried, in order, when a specifier omits one.
pub const EXTENSIONS: [&str; 4] = ["ts", "tsx", "js", "jsx"];

/// Resolves `(fromFile, importSpecifier)` to a file path.
pub trait ImportResolver: Sync {
    fn resolve(&self, from_file: &str, specifier: &str) -> Option<String>;
}

/// Resolves against files that exist on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImportResolver;

impl ImportResolver for FsImportResolver {
    fn resolve(&self, from_file: &str, specifier: &str) -> Option<String> {
        candidates(from_file, specifier)
            .into_iter()
            .find(|candidate| Path::new(candidate).is_file())
    }
}

/// Resolves against a fixed set of known paths, typically the indexed files.
#[derive(Debug, Default, Clone)]
pub struct MemoryImportResolver {
    known: HashSet<String>,
}

impl MemoryImportResolver {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.known.contains(path)
    }
}

impl ImportResolver for MemoryImportResolver {
    fn resolve(&self, from_file: &str, specifier: &str) -> Option<String> {
        candidates(from_file, specifier)
            .into_iter()
            .find(|candidate| self.known.contains(candidate))
    }
}

/// Whether a specifier can point into the project at all.
pub fn is_relative_or_absolute(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// Candidate file paths for `specifier` imported from `from_file`, in the
/// order they should be tried.
pub fn candidates(from_file: &str, specifier: &str) -> Vec<String> {
    if !is_relative_or_absolute(specifier) {
        return Vec::new();
    }

    let joined = if specifier.starts_with('/') {
        PathBuf::from(specifier)
    } else {
        match Path::new(from_file).parent() {
            Some(dir) => dir.join(specifier),
            None => PathBuf::from(specifier),
        }
    };
    let base = normalize(&joined).to_string_lossy().to_string();
    let base = base.trim_end_matches('/').to_string();

    let mut out = Vec::with_capacity(1 + EXTENSIONS.len() * 2);
    out.push(base.clone());
    for ext in EXTENSIONS {
        out.push(format!("{base}.{ext}"));
    }
    for ext in EXTENSIONS {
        out.push(format!("{base}/index.{ext}"));
    }
    out
}

/// Fold `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_bare_specifiers_do_not_resolve() {
        assert!(candidates("/src/a.ts", "react").is_empty());
        assert!(candidates("/src/a.ts", "@styleslice/core").is_empty());
    }

    #[test]
    fn test_candidate_order() {
        assert_eq!(
            candidates("/src/app/a.ts", "../tokens"),
            vec![
                "/src/tokens",
                "/src/tokens.ts",
                "/src/tokens.tsx",
                "/src/tokens.js",
                "/src/tokens.jsx",
                "/src/tokens/index.ts",
                "/src/tokens/index.tsx",
                "/src/tokens/index.js",
                "/src/tokens/index.jsx",
            ]
        );
    }

    #[test]
    fn test_dotted_names_append_extension() {
        let resolver = MemoryImportResolver::new(["/src/button.styles.ts"]);
        assert_eq!(
            resolver.resolve("/src/button.tsx", "./button.styles"),
            Some("/src/button.styles.ts".to_string())
        );
    }

    #[test]
    fn test_memory_resolver_index_fallback() {
        let resolver = MemoryImportResolver::new(["/src/theme/index.tsx"]);
        assert_eq!(
            resolver.resolve("/src/a.ts", "./theme"),
            Some("/src/theme/index.tsx".to_string())
        );
        assert_eq!(resolver.resolve("/src/a.ts", "./missing"), None);
    }

    #[test]
    fn test_fs_resolver_prefers_existing_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("colors")).unwrap();
        fs::write(src.join("colors").join("index.js"), "export const red = 'red';").unwrap();
        let from = src.join("app.ts").to_string_lossy().to_string();

        let resolved = FsImportResolver.resolve(&from, "./colors").unwrap();
        assert!(resolved.ends_with("colors/index.js"));
        assert_eq!(FsImportResolver.resolve(&from, "./nothing"), None);
    }
}
