//! Project file discovery.
//!
//! Walks the include directories under a root and returns every script file
//! that survives the ignore rules. Include entries with wildcards are expanded
//! to directories; ignore entries with wildcards match full paths, the rest
//! are directory prefixes relative to the root.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::{Pattern, glob};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{Config, TEST_FILE_PATTERNS};
use crate::core::resolve::{EXTENSIONS, normalize};

/// Directories never worth descending into.
const ALWAYS_SKIPPED: &[&str] = &["node_modules", ".git"];

fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions<'c> {
    pub includes: &'c [String],
    pub ignores: &'c [String],
    pub ignore_test_files: bool,
    /// Extra directory excluded from the walk, typically the output directory.
    pub exclude_dir: Option<PathBuf>,
}

impl<'c> ScanOptions<'c> {
    pub fn from_config(config: &'c Config) -> Self {
        Self {
            includes: &config.includes,
            ignores: &config.ignores,
            ignore_test_files: config.ignore_test_files,
            exclude_dir: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanResult {
    /// Normalized paths, sorted.
    pub files: BTreeSet<String>,
    /// Entries that could not be read.
    pub skipped_count: usize,
}

pub fn scan_files(root: &Path, options: &ScanOptions<'_>) -> ScanResult {
    let mut literal_ignores: Vec<PathBuf> = Vec::new();
    let mut glob_ignores: Vec<Pattern> = Vec::new();
    for p in options.ignores {
        if is_glob_pattern(p) {
            match Pattern::new(p) {
                Ok(pattern) => glob_ignores.push(pattern),
                Err(e) => warn!(pattern = %p, "invalid ignore pattern: {e}"),
            }
        } else {
            literal_ignores.push(root.join(p));
        }
    }
    if options.ignore_test_files {
        glob_ignores.extend(TEST_FILE_PATTERNS.iter().filter_map(|p| Pattern::new(p).ok()));
    }
    literal_ignores.extend(options.exclude_dir.clone());

    let mut result = ScanResult::default();
    for dir in include_dirs(root, options.includes) {
        let walker = WalkDir::new(&dir).into_iter().filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| ALWAYS_SKIPPED.contains(&name)))
        });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    result.skipped_count += 1;
                    warn!("cannot access path: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if literal_ignores.iter().any(|ignored| path.starts_with(ignored)) {
                continue;
            }
            let path_str = path.to_string_lossy();
            if glob_ignores.iter().any(|p| p.matches(&path_str)) {
                continue;
            }
            if entry.file_type().is_file() && is_script_file(path) {
                result.files.insert(normalize(path).to_string_lossy().into_owned());
            }
        }
    }
    debug!(files = result.files.len(), skipped = result.skipped_count, "scanned project files");
    result
}

fn include_dirs(root: &Path, includes: &[String]) -> Vec<PathBuf> {
    if includes.is_empty() {
        return vec![root.to_path_buf()];
    }
    let mut dirs = Vec::new();
    for include in includes {
        if is_glob_pattern(include) {
            let pattern = root.join(include);
            match glob(&pattern.to_string_lossy()) {
                Ok(entries) => dirs.extend(entries.flatten().filter(|entry| entry.is_dir())),
                Err(e) => warn!(pattern = %include, "invalid include pattern: {e}"),
            }
        } else {
            let path = root.join(include);
            if path.exists() {
                dirs.push(path);
            } else {
                debug!(path = %path.display(), "include path does not exist");
            }
        }
    }
    dirs
}

fn is_script_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext))
        && !path.to_string_lossy().ends_with(".d.ts")
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn touch(root: &Path, path: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    fn relative(root: &Path, result: &ScanResult) -> Vec<String> {
        let root = normalize(root);
        result
            .files
            .iter()
            .map(|f| Path::new(f).strip_prefix(&root).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn everything() -> ScanOptions<'static> {
        ScanOptions::default()
    }

    #[test]
    fn test_scan_script_files() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "app.tsx");
        touch(dir.path(), "utils.ts");
        touch(dir.path(), "types.d.ts");
        touch(dir.path(), "style.css");

        let result = scan_files(dir.path(), &everything());
        assert_eq!(relative(dir.path(), &result), vec!["app.tsx", "utils.ts"]);
    }

    #[test]
    fn test_scan_skips_node_modules_and_ignores() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "node_modules/lib/index.js");
        touch(dir.path(), "dist/bundle.js");
        touch(dir.path(), "src/generated/tokens.ts");
        touch(dir.path(), "src/app.ts");

        let ignores = vec!["dist".to_string(), "**/generated/**".to_string()];
        let options = ScanOptions {
            ignores: &ignores,
            ..everything()
        };
        let result = scan_files(dir.path(), &options);
        assert_eq!(relative(dir.path(), &result), vec!["src/app.ts"]);
    }

    #[test]
    fn test_scan_with_includes() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "src/app.tsx");
        touch(dir.path(), "src/components/Button.tsx");
        touch(dir.path(), "lib/utils.ts");

        // Overlapping includes must not duplicate files.
        let includes = vec!["src".to_string(), "src/components".to_string(), "missing".to_string()];
        let options = ScanOptions {
            includes: &includes,
            ..everything()
        };
        let result = scan_files(dir.path(), &options);
        assert_eq!(
            relative(dir.path(), &result),
            vec!["src/app.tsx", "src/components/Button.tsx"]
        );
    }

    #[test]
    fn test_scan_with_glob_include() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "packages/a/src/index.ts");
        touch(dir.path(), "packages/b/src/index.ts");
        touch(dir.path(), "packages/b/README.md");

        let includes = vec!["packages/*/src".to_string()];
        let options = ScanOptions {
            includes: &includes,
            ..everything()
        };
        let result = scan_files(dir.path(), &options);
        assert_eq!(
            relative(dir.path(), &result),
            vec!["packages/a/src/index.ts", "packages/b/src/index.ts"]
        );
    }

    #[test]
    fn test_scan_test_files_and_exclude_dir() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "app.tsx");
        touch(dir.path(), "app.test.tsx");
        touch(dir.path(), "__tests__/helper.ts");
        touch(dir.path(), ".styleslice/out.js");

        let options = ScanOptions {
            ignore_test_files: true,
            exclude_dir: Some(dir.path().join(".styleslice")),
            ..everything()
        };
        let result = scan_files(dir.path(), &options);
        assert_eq!(relative(dir.path(), &result), vec!["app.tsx"]);

        let result = scan_files(dir.path(), &everything());
        assert_eq!(result.files.len(), 4);
    }
}
