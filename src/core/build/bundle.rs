//! In-memory module bundler.
//!
//! Links a synthetic entry module and everything reachable from it into one
//! [`Bundle`]. Specifiers resolve against the in-memory source map first and
//! fall back to the filesystem only for paths the map does not mention.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use swc_common::SourceMap;
use swc_ecma_ast::*;

use crate::core::parsers::{ParsedFile, parse_source};
use crate::core::resolve::{candidates, is_relative_or_absolute};
use crate::error::{ExtractError, Result};

/// Where an import specifier of a bundled module points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Index into [`Bundle::modules`].
    Module(usize),
    /// Not bundled; reading its bindings fails at run time.
    External(String),
}

#[derive(Debug)]
pub struct BundledModule {
    pub path: String,
    pub file: ParsedFile,
    pub links: HashMap<String, Link>,
}

impl BundledModule {
    pub fn link(&self, specifier: &str) -> Link {
        self.links
            .get(specifier)
            .cloned()
            .unwrap_or_else(|| Link::External(specifier.to_string()))
    }
}

/// A linked set of modules with a fixed execution order.
#[derive(Debug)]
pub struct Bundle {
    pub modules: Vec<BundledModule>,
    pub entry: usize,
    /// Dependencies before dependents; every module appears once.
    pub order: Vec<usize>,
}

impl Bundle {
    /// The bundle as readable source, one section per module in execution order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for &i in &self.order {
            let module = &self.modules[i];
            out.push_str(&format!("// {}\n", module.path));
            let source = module.file.snippet(module.file.module.span);
            out.push_str(source.trim_end());
            out.push_str("\n\n");
        }
        out
    }

    pub fn position(&self, path: &str) -> Option<usize> {
        self.modules.iter().position(|module| module.path == path)
    }
}

/// Turns a root file plus in-memory sources into one executable [`Bundle`].
pub trait Bundler {
    /// `modules` maps paths to their source; `None` stands for a module with
    /// no code.
    fn bundle(&self, entry: &str, modules: &BTreeMap<String, Option<String>>) -> Result<Bundle>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBundler;

impl Bundler for MemoryBundler {
    fn bundle(&self, entry: &str, modules: &BTreeMap<String, Option<String>>) -> Result<Bundle> {
        let mut linker = Linker {
            sources: modules,
            source_map: Arc::new(SourceMap::default()),
            modules: Vec::new(),
            by_path: HashMap::new(),
        };
        let entry = linker.load(entry)?.ok_or_else(|| ExtractError::Bundle {
            path: entry.to_string(),
            message: "entry module not found".to_string(),
        })?;
        let order = linker.execution_order(entry);
        tracing::debug!(modules = linker.modules.len(), "bundled modules");
        Ok(Bundle {
            modules: linker.modules,
            entry,
            order,
        })
    }
}

struct Linker<'m> {
    sources: &'m BTreeMap<String, Option<String>>,
    source_map: Arc<SourceMap>,
    modules: Vec<BundledModule>,
    by_path: HashMap<String, usize>,
}

impl Linker<'_> {
    /// Load `path` and its dependencies. `Ok(None)` when no source exists.
    fn load(&mut self, path: &str) -> Result<Option<usize>> {
        if let Some(&i) = self.by_path.get(path) {
            return Ok(Some(i));
        }
        let code = match self.sources.get(path) {
            Some(code) => code.clone().unwrap_or_default(),
            None => match std::fs::read_to_string(path) {
                Ok(code) => code,
                Err(_) => return Ok(None),
            },
        };
        let file = parse_source(code, path, self.source_map.clone()).map_err(|e| ExtractError::Bundle {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        let index = self.modules.len();
        let specifiers = module_specifiers(&file.module);
        self.modules.push(BundledModule {
            path: path.to_string(),
            file,
            links: HashMap::new(),
        });
        self.by_path.insert(path.to_string(), index);

        for specifier in specifiers {
            let link = match self.resolve(path, &specifier) {
                Some(target) => match self.load(&target)? {
                    Some(target) => Link::Module(target),
                    None => Link::External(specifier.clone()),
                },
                None => Link::External(specifier.clone()),
            };
            self.modules[index].links.insert(specifier, link);
        }
        Ok(Some(index))
    }

    fn resolve(&self, from: &str, specifier: &str) -> Option<String> {
        if !is_relative_or_absolute(specifier) {
            return None;
        }
        let candidates = candidates(from, specifier);
        candidates
            .iter()
            .find(|candidate| self.sources.contains_key(candidate.as_str()))
            .or_else(|| candidates.iter().find(|candidate| Path::new(candidate).is_file()))
            .cloned()
    }

    fn execution_order(&self, entry: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut visited = vec![false; self.modules.len()];
        self.visit(entry, &mut visited, &mut order);
        order
    }

    fn visit(&self, index: usize, visited: &mut Vec<bool>, order: &mut Vec<usize>) {
        if visited[index] {
            return;
        }
        visited[index] = true;
        for specifier in module_specifiers(&self.modules[index].file.module) {
            if let Some(Link::Module(target)) = self.modules[index].links.get(&specifier) {
                self.visit(*target, visited, order);
            }
        }
        order.push(index);
    }
}

/// Specifiers a module depends on, in source order, without duplicates.
fn module_specifiers(module: &Module) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in &module.body {
        let ModuleItem::ModuleDecl(decl) = item else {
            continue;
        };
        let source = match decl {
            ModuleDecl::Import(import) if !import.type_only => Some(&*import.src),
            ModuleDecl::ExportNamed(export) if !export.type_only => export.src.as_deref(),
            ModuleDecl::ExportAll(export) if !export.type_only => Some(&*export.src),
            _ => None,
        };
        if let Some(source) = source.and_then(|src| src.value.as_str())
            && !out.iter().any(|s| s == source)
        {
            out.push(source.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sources(entries: &[(&str, Option<&str>)]) -> BTreeMap<String, Option<String>> {
        entries
            .iter()
            .map(|(path, code)| (path.to_string(), code.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_links_and_dependency_order() {
        let bundle = MemoryBundler
            .bundle(
                "/entry.js",
                &sources(&[
                    ("/entry.js", Some("import '/src/b.ts'; import '/src/a.ts';")),
                    ("/src/a.ts", Some("export const a = 1;")),
                    ("/src/b.ts", Some("import { a } from './a'; import x from 'pkg';")),
                ]),
            )
            .unwrap();

        let paths: Vec<&str> = bundle.order.iter().map(|&i| bundle.modules[i].path.as_str()).collect();
        assert_eq!(paths, vec!["/src/a.ts", "/src/b.ts", "/entry.js"]);

        let b = &bundle.modules[bundle.position("/src/b.ts").unwrap()];
        assert_eq!(b.link("./a"), Link::Module(bundle.position("/src/a.ts").unwrap()));
        assert_eq!(b.link("pkg"), Link::External("pkg".to_string()));
    }

    #[test]
    fn test_empty_modules_and_missing_files() {
        let bundle = MemoryBundler
            .bundle(
                "/entry.js",
                &sources(&[
                    ("/entry.js", Some("import './empty'; import './missing';")),
                    ("/empty.ts", None),
                ]),
            )
            .unwrap();
        let entry = &bundle.modules[bundle.entry];
        assert!(matches!(entry.link("./empty"), Link::Module(_)));
        assert_eq!(entry.link("./missing"), Link::External("./missing".to_string()));
        assert_eq!(bundle.order.len(), 2);
    }

    #[test]
    fn test_falls_back_to_disk_for_unmapped_paths() {
        let dir = tempfile::tempdir().unwrap();
        let on_disk = dir.path().join("tokens.ts");
        std::fs::write(&on_disk, "export const size = 4;").unwrap();
        let entry_path = dir.path().join("entry.ts");
        let entry_path = entry_path.to_string_lossy().to_string();

        let bundle = MemoryBundler
            .bundle(&entry_path, &sources(&[(&entry_path, Some("import { size } from './tokens';"))]))
            .unwrap();
        assert_eq!(bundle.modules.len(), 2);
        assert!(bundle.render().contains("export const size = 4;"));
    }

    #[test]
    fn test_parse_failures_are_bundle_errors() {
        let err = MemoryBundler
            .bundle("/entry.js", &sources(&[("/entry.js", Some("const = ;"))]))
            .unwrap_err();
        assert_eq!(err.code(), "bundle-error");
    }
}
