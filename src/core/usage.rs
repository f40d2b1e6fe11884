//! Usage propagation.
//!
//! Marks every declaration a style expression transitively depends on. Work
//! starts at the arguments of each recognized style call and follows reads to
//! their declarations, crossing into other files through imports and
//! re-exports. The used-node sets only grow, so running this twice leaves the
//! index unchanged the second time.

use std::collections::{HashSet, VecDeque};

use swc_ecma_ast::*;

use crate::core::index::{
    BindingKind, CallTarget, ExportEntry, FileIndex, ImportBinding, Imported, ProjectIndex, UsedBinding,
};
use crate::core::resolve::ImportResolver;
use crate::core::walk::Node;
use crate::extractors::ExtractorRegistry;

#[derive(Debug, Clone)]
enum Work<'a> {
    /// An identifier occurrence read by live code.
    Read { file: usize, ident: &'a Ident },
    /// A name another file imports.
    Export { file: usize, name: String },
    /// Every export, for namespace imports and `export * as ns`.
    AllExports { file: usize },
}

/// Counters reported once propagation settles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UsageStats {
    pub seeds: usize,
    pub bindings: usize,
    pub hops: usize,
}

struct Propagation<'p, 'a> {
    project: &'p mut ProjectIndex<'a>,
    registry: &'p ExtractorRegistry,
    resolver: &'p dyn ImportResolver,
    queue: VecDeque<Work<'a>>,
    exports_seen: HashSet<(usize, String)>,
    all_seen: HashSet<usize>,
    stats: UsageStats,
}

/// Propagate usage from every style call in the project.
pub fn propagate_usage(
    project: &mut ProjectIndex<'_>,
    registry: &ExtractorRegistry,
    resolver: &dyn ImportResolver,
) -> UsageStats {
    let mut propagation = Propagation {
        project,
        registry,
        resolver,
        queue: VecDeque::new(),
        exports_seen: HashSet::new(),
        all_seen: HashSet::new(),
        stats: UsageStats::default(),
    };
    propagation.seed();
    propagation.run();
    tracing::debug!(
        seeds = propagation.stats.seeds,
        bindings = propagation.stats.bindings,
        hops = propagation.stats.hops,
        "propagated usage"
    );
    propagation.stats
}

impl<'p, 'a> Propagation<'p, 'a> {
    fn seed(&mut self) {
        for i in 0..self.project.files.len() {
            let file = &mut self.project.files[i];
            let calls = file.style_calls.clone();
            for call in &calls {
                if let CallTarget::Derived { local, .. } = call.target {
                    self.queue.push_back(Work::Read { file: i, ident: local });
                }
                for arg in call.args {
                    let root = Node::Expr(&arg.expr);
                    file.mark_subtree(root);
                    let reads = file.reads_in(root);
                    self.queue
                        .extend(reads.into_iter().map(|ident| Work::Read { file: i, ident }));
                    self.stats.seeds += 1;
                }
            }
        }
    }

    fn run(&mut self) {
        while let Some(work) = self.queue.pop_front() {
            match work {
                Work::Read { file, ident } => {
                    if let Some(decl) = self.project.files[file].declaration_of(ident) {
                        self.use_declaration(file, decl);
                    }
                }
                Work::Export { file, name } => self.use_export(file, name),
                Work::AllExports { file } => self.use_all_exports(file),
            }
        }
    }

    fn reads(&mut self, file: usize, root: Node<'a>) {
        let reads = self.project.files[file].reads_in(root);
        self.queue
            .extend(reads.into_iter().map(|ident| Work::Read { file, ident }));
    }

    /// Retain what `decl` needs and queue its dependencies.
    fn use_declaration(&mut self, file: usize, decl: &'a Ident) {
        let index = &mut self.project.files[file];
        let key = Node::BindingIdent(decl).id();
        if index.used_bindings.contains_key(&key) {
            return;
        }
        let Some(binding) = index.classify(decl) else {
            return;
        };
        index.used_bindings.insert(key, binding);
        self.stats.bindings += 1;
        tracing::trace!(file = %index.path(), name = %decl.sym, kind = ?binding.kind, "used binding");

        match binding.kind {
            BindingKind::ImportSpecifier => {
                index.mark_path(Node::BindingIdent(decl));
                let import = index
                    .imports
                    .iter()
                    .find(|import| std::ptr::eq(import.local, decl))
                    .cloned();
                if let Some(import) = import {
                    self.hop_import(file, &import);
                }
            }
            BindingKind::VarDeclarator | BindingKind::DestructuringLeaf => {
                self.use_declarator(file, binding);
            }
            BindingKind::Other => {
                let root = Node::ModuleItem(binding.item);
                if self.project.files[file].mark_subtree(root) {
                    self.reads(file, root);
                }
            }
        }
    }

    fn use_declarator(&mut self, file: usize, binding: UsedBinding<'a>) {
        let Some(declarator) = binding.declarator else {
            return;
        };
        let index = &mut self.project.files[file];
        let path = index.path_to_item(Node::BindingIdent(binding.ident));
        index.mark_path(Node::BindingIdent(binding.ident));

        let factory_call = index
            .derived_in(declarator)
            .first()
            .map(|derived| (derived.call, derived.via));
        if let Some((call, via)) = factory_call {
            // The factory call is re-synthesized; only its arguments matter,
            // plus the callee when it is a derived factory.
            if index.mark_subtree(Node::Call(call)) {
                for arg in &call.args {
                    self.reads(file, Node::Expr(&arg.expr));
                }
                if let Some(callee) = via {
                    self.queue.push_back(Work::Read { file, ident: callee });
                }
            }
            return;
        }

        // Defaults and computed keys on the way down to this leaf.
        for node in path.into_iter().take_while(|node| !matches!(node, Node::VarDeclarator(_))) {
            match node {
                Node::Pat(Pat::Assign(assign)) => self.reads(file, Node::Expr(&assign.right)),
                Node::ObjectPatProp(ObjectPatProp::Assign(assign)) => {
                    if let Some(value) = &assign.value {
                        self.reads(file, Node::Expr(value));
                    }
                }
                Node::ObjectPatProp(ObjectPatProp::KeyValue(kv)) => {
                    if let PropName::Computed(computed) = &kv.key {
                        self.reads(file, Node::Expr(&computed.expr));
                    }
                }
                _ => {}
            }
        }

        if let Some(init) = declarator.init.as_deref() {
            let root = Node::Expr(init);
            if self.project.files[file].mark_subtree(root) {
                self.reads(file, root);
            }
        }
    }

    /// Follow an import of a project file to the export it names.
    fn hop_import(&mut self, file: usize, import: &ImportBinding<'a>) {
        if self.registry.is_library(import.source) {
            return;
        }
        let Some(target) = self.project.resolve_import(file, import.source, self.resolver) else {
            return;
        };
        self.stats.hops += 1;
        let work = match &import.imported {
            Imported::Named(name) => Work::Export {
                file: target,
                name: name.clone(),
            },
            Imported::Default => Work::Export {
                file: target,
                name: "default".to_string(),
            },
            Imported::Namespace => Work::AllExports { file: target },
        };
        self.queue.push_back(work);
    }

    fn use_export(&mut self, file: usize, name: String) {
        if !self.exports_seen.insert((file, name.clone())) {
            return;
        }
        let index = &self.project.files[file];
        let Some(entry) = index.exports.get(&name).copied() else {
            if name != "default" {
                self.use_star_exports(file, Some(name));
            }
            return;
        };

        match entry {
            ExportEntry::Declared { ident, .. } => self.use_declaration(file, ident),
            ExportEntry::Local { spec, orig, .. } => {
                self.project.files[file].mark_path(Node::ExportSpecifier { spec, local: true });
                self.queue.push_back(Work::Read { file, ident: orig });
            }
            ExportEntry::Reexport {
                spec, source, imported, ..
            } => {
                self.project.files[file].mark_path(Node::ExportSpecifier { spec, local: false });
                if self.registry.is_library(source) {
                    return;
                }
                let Some(target) = self.project.resolve_import(file, source, self.resolver) else {
                    return;
                };
                self.stats.hops += 1;
                self.queue.push_back(match imported {
                    Some(imported) => Work::Export {
                        file: target,
                        name: imported.to_string(),
                    },
                    None => Work::AllExports { file: target },
                });
            }
            ExportEntry::Default { item } => {
                let root = Node::ModuleItem(item);
                if self.project.files[file].mark_subtree(root) {
                    self.reads(file, root);
                }
            }
        }
    }

    fn use_all_exports(&mut self, file: usize) {
        if !self.all_seen.insert(file) {
            return;
        }
        let names: Vec<String> = self.project.files[file].exports.named.keys().cloned().collect();
        for name in names {
            self.queue.push_back(Work::Export { file, name });
        }
        self.use_star_exports(file, None);
    }

    /// Look for `name` (or everything, when `None`) behind `export *`.
    fn use_star_exports(&mut self, file: usize, name: Option<String>) {
        let stars = self.project.files[file].exports.stars.clone();
        for star in stars {
            if self.registry.is_library(star.source) {
                continue;
            }
            let Some(target) = self.project.resolve_import(file, star.source, self.resolver) else {
                continue;
            };
            let provides = match &name {
                Some(name) => exports_name(self.project, target, name, self.resolver),
                None => true,
            };
            if !provides {
                continue;
            }
            self.project.files[file].mark_subtree(Node::ModuleItem(star.item));
            self.stats.hops += 1;
            self.queue.push_back(match &name {
                Some(name) => Work::Export {
                    file: target,
                    name: name.clone(),
                },
                None => Work::AllExports { file: target },
            });
        }
    }
}

/// Whether `file` exports `name`, directly or through `export *`.
fn exports_name(project: &ProjectIndex<'_>, file: usize, name: &str, resolver: &dyn ImportResolver) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![file];
    while let Some(file) = stack.pop() {
        if !seen.insert(file) {
            continue;
        }
        let index: &FileIndex<'_> = &project.files[file];
        if index.exports.get(name).is_some() {
            return true;
        }
        stack.extend(
            index
                .exports
                .stars
                .iter()
                .filter_map(|star| project.resolve_import(file, star.source, resolver)),
        );
    }
    false
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::derived::resolve_derived;
    use crate::core::fixtures::{parse_project, registry};

    fn used_names(index: &FileIndex<'_>) -> Vec<String> {
        let mut names: Vec<String> = index
            .used_bindings
            .values()
            .map(|binding| binding.ident.sym.to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_cross_file_color_scenario() {
        let (files, resolver) = parse_project(&[
            ("/a.ts", r#"export const color = "red", unused = "blue";"#),
            (
                "/b.ts",
                r#"
                import { css } from "@styleslice/core";
                import { color } from "./a";
                css({ color });
                "#,
            ),
        ]);
        let registry = registry();
        let mut project = ProjectIndex::build(&files, &registry);
        let stats = propagate_usage(&mut project, &registry, &resolver);

        assert_eq!(stats.seeds, 1);
        assert_eq!(stats.hops, 1);
        assert_eq!(used_names(&project.files[0]), vec!["color"]);
        assert_eq!(used_names(&project.files[1]), vec!["color"]);
    }

    #[test]
    fn test_transitive_dependencies_within_a_file() {
        let (files, resolver) = parse_project(&[(
            "/a.ts",
            r#"
            import { css } from "@styleslice/core";
            const base = 4;
            function space(n) { return n * base; }
            const gap = space(2);
            const other = 1;
            css({ gap });
            "#,
        )]);
        let registry = registry();
        let mut project = ProjectIndex::build(&files, &registry);
        propagate_usage(&mut project, &registry, &resolver);

        assert_eq!(used_names(&project.files[0]), vec!["base", "gap", "n", "space"]);
    }

    #[test]
    fn test_destructuring_defaults_are_followed() {
        let (files, resolver) = parse_project(&[(
            "/a.ts",
            r#"
            import { css } from "@styleslice/core";
            const fallback = "red";
            const other = "blue";
            const { a = fallback, b = other } = {};
            css({ a });
            "#,
        )]);
        let registry = registry();
        let mut project = ProjectIndex::build(&files, &registry);
        propagate_usage(&mut project, &registry, &resolver);

        assert_eq!(used_names(&project.files[0]), vec!["a", "fallback"]);
    }

    #[test]
    fn test_namespace_imports_and_reexports() {
        let (files, resolver) = parse_project(&[
            ("/tokens.ts", "export const red = 'red'; export const blue = 'blue';"),
            ("/index.ts", "export * from './tokens'; export { red as primary } from './tokens';"),
            (
                "/a.ts",
                r#"
                import { css } from "@styleslice/core";
                import * as t from "./index";
                css({ color: t.primary });
                "#,
            ),
        ]);
        let registry = registry();
        let mut project = ProjectIndex::build(&files, &registry);
        propagate_usage(&mut project, &registry, &resolver);

        assert_eq!(used_names(&project.files[0]), vec!["blue", "red"]);
        assert_eq!(used_names(&project.files[2]), vec!["t"]);
    }

    #[test]
    fn test_unresolved_imports_are_not_followed() {
        let (files, resolver) = parse_project(&[(
            "/a.ts",
            r#"
            import { css } from "@styleslice/core";
            import { theme } from "some-package";
            css({ color: theme.red, width: window.innerWidth });
            "#,
        )]);
        let registry = registry();
        let mut project = ProjectIndex::build(&files, &registry);
        let stats = propagate_usage(&mut project, &registry, &resolver);

        assert_eq!(stats.hops, 0);
        assert_eq!(used_names(&project.files[0]), vec!["theme"]);
    }

    #[test]
    fn test_propagation_is_idempotent() {
        let (files, resolver) = parse_project(&[
            ("/a.ts", r#"export const color = "red"; export default { size: 2 };"#),
            (
                "/b.ts",
                r#"
                import { css } from "@styleslice/core";
                import sizes, { color } from "./a";
                css({ color, size: sizes.size });
                "#,
            ),
        ]);
        let registry = registry();
        let mut project = ProjectIndex::build(&files, &registry);
        propagate_usage(&mut project, &registry, &resolver);
        let first: Vec<_> = project.files.iter().map(|f| f.used.clone()).collect();
        let bindings: Vec<_> = project.files.iter().map(used_names).collect();

        propagate_usage(&mut project, &registry, &resolver);
        let second: Vec<_> = project.files.iter().map(|f| f.used.clone()).collect();

        assert_eq!(first, second);
        assert_eq!(bindings, project.files.iter().map(used_names).collect::<Vec<_>>());
    }

    #[test]
    fn test_derived_call_retains_factory_arguments_only() {
        let (files, resolver) = parse_project(&[
            (
                "/theme.ts",
                r#"
                import { createTheme } from "@styleslice/core";
                const brand = "red";
                const unrelated = 1;
                export const { css } = createTheme({ brand });
                "#,
            ),
            (
                "/button.ts",
                r#"
                import { css } from "./theme";
                css({ padding: 4 });
                "#,
            ),
        ]);
        let registry = registry();
        let mut project = ProjectIndex::build(&files, &registry);
        resolve_derived(&mut project, &registry, &resolver);
        propagate_usage(&mut project, &registry, &resolver);

        assert_eq!(used_names(&project.files[0]), vec!["brand", "css"]);
        assert_eq!(used_names(&project.files[1]), vec!["css"]);
    }
}
