//! Derived extractor resolution.
//!
//! A factory extractor (e.g. `createTheme`) returns an object whose properties
//! are new extractors. Destructuring that object at module level binds local
//! names to derived extractors:
//!
//! ```text
//! export const { css: themed } = createTheme({ prefix: "brand" });
//! ```
//!
//! Resolution records those bindings, then copies them along import and
//! re-export edges until no file learns anything new, and finally rescans call
//! sites so `themed({...})` is recognized in every file that can reach it.
//!
//! A derived extractor may itself be a factory. Destructuring its call result
//! binds the next level, so factory results and imports are revisited
//! together until neither yields a new binding.

use std::collections::HashSet;

use swc_ecma_ast::*;

use crate::core::index::{ExportEntry, FileIndex, Imported, ProjectIndex, callee_ident, unwrap_expr};
use crate::core::resolve::ImportResolver;
use crate::extractors::{Extractor, ExtractorId, ExtractorRegistry};

/// A local name bound to a sub-extractor produced by a factory call.
#[derive(Debug, Clone)]
pub struct DerivedExtractorBinding<'a> {
    /// The factory extractor that was called.
    pub parent: ExtractorId,
    /// Property name the factory produced, e.g. `css`.
    pub name: String,
    /// Id of the derived extractor (`parent.name`).
    pub extractor: ExtractorId,
    /// The factory call expression.
    pub call: &'a CallExpr,
    /// The callee of `call` when the factory is itself a derived binding.
    pub via: Option<&'a Ident>,
    /// The identifier bound to the derived extractor in this file.
    pub local: &'a Ident,
    pub origin: DerivedOrigin<'a>,
}

#[derive(Debug, Clone)]
pub enum DerivedOrigin<'a> {
    /// Destructured from the factory call in this file.
    Factory {
        declarator: &'a VarDeclarator,
        item: &'a ModuleItem,
        exported: bool,
    },
    /// Imported, directly or through re-exports, from `from`.
    Imported { spec: &'a ImportSpecifier, from: String },
}

impl<'a> DerivedExtractorBinding<'a> {
    pub fn declarator(&self) -> Option<&'a VarDeclarator> {
        match &self.origin {
            DerivedOrigin::Factory { declarator, .. } => Some(declarator),
            DerivedOrigin::Imported { .. } => None,
        }
    }

    pub fn is_exported(&self) -> bool {
        matches!(self.origin, DerivedOrigin::Factory { exported: true, .. })
    }
}

/// Resolve derived extractors across the project and rescan call sites.
pub fn resolve_derived(project: &mut ProjectIndex<'_>, registry: &ExtractorRegistry, resolver: &dyn ImportResolver) {
    let mut total = 0;
    loop {
        let mut round = 0;
        for file in &mut project.files {
            round += bind_factory_results(file, registry);
        }

        let mut learned = Vec::new();
        for (i, file) in project.files.iter().enumerate() {
            for import in &file.imports {
                if registry.is_library(import.source) {
                    continue;
                }
                let Some(reference) = file.reference(import.local) else {
                    continue;
                };
                if file.derived.contains(&reference) {
                    continue;
                }
                let Some(target) = project.resolve_import(i, import.source, resolver) else {
                    continue;
                };
                let name = match &import.imported {
                    Imported::Named(name) => name.as_str(),
                    Imported::Default => "default",
                    Imported::Namespace => continue,
                };
                let mut seen = HashSet::new();
                if let Some(found) = exported_binding(project, target, name, resolver, &mut seen) {
                    learned.push((
                        i,
                        reference,
                        DerivedExtractorBinding {
                            local: import.local,
                            origin: DerivedOrigin::Imported {
                                spec: import.spec,
                                from: project.files[target].path().to_string(),
                            },
                            ..found
                        },
                    ));
                }
            }
        }

        round += learned.len();
        for (i, reference, binding) in learned {
            project.files[i].derived.insert(&reference, binding);
        }
        if round == 0 {
            break;
        }
        total += round;
    }

    for file in &mut project.files {
        file.rescan_calls(registry);
    }
    tracing::debug!(bindings = total, "resolved derived extractors");
}

/// Record bindings created by destructuring a factory call at module level.
/// Names bound by an earlier round are skipped.
fn bind_factory_results<'a>(file: &mut FileIndex<'a>, registry: &ExtractorRegistry) -> usize {
    let parsed = file.file;
    let mut count = 0;

    for item in &parsed.module.body {
        let (var, exported) = match item {
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => (&**var, false),
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
                decl: Decl::Var(var), ..
            })) => (&**var, true),
            _ => continue,
        };

        for declarator in &var.decls {
            let Pat::Object(pattern) = &declarator.name else {
                continue;
            };
            let Some(Expr::Call(call)) = declarator.init.as_deref().map(unwrap_expr) else {
                continue;
            };
            let Some((factory, via)) = factory_for(file, registry, call) else {
                continue;
            };

            for prop in &pattern.props {
                let (name, local) = match prop {
                    ObjectPatProp::KeyValue(kv) => match (prop_name(&kv.key), unwrap_pat_ident(&kv.value)) {
                        (Some(name), Some(local)) => (name, local),
                        _ => continue,
                    },
                    ObjectPatProp::Assign(assign) => (assign.key.sym.to_string(), &assign.key.id),
                    ObjectPatProp::Rest(_) => continue,
                };
                let Some(derived) = factory.derived(&name) else {
                    continue;
                };
                let Some(reference) = file.reference(local) else {
                    continue;
                };
                if file.derived.contains(&reference) {
                    continue;
                }
                file.derived.insert(
                    &reference,
                    DerivedExtractorBinding {
                        parent: factory.id().clone(),
                        name,
                        extractor: derived.id().clone(),
                        call,
                        via,
                        local,
                        origin: DerivedOrigin::Factory {
                            declarator,
                            item,
                            exported,
                        },
                    },
                );
                count += 1;
            }
        }
    }
    count
}

/// The factory `call` invokes: a style-library intrinsic, or a derived binding
/// that is itself a factory (returned alongside its callee).
fn factory_for<'r, 'a>(
    file: &FileIndex<'a>,
    registry: &'r ExtractorRegistry,
    call: &'a CallExpr,
) -> Option<(&'r Extractor, Option<&'a Ident>)> {
    let callee = callee_ident(call)?;
    let reference = file.reference(callee);
    let (id, via) = match file.intrinsics.lookup(reference.as_ref()) {
        Some(id) => (id, None),
        None => (&file.derived.lookup(reference.as_ref())?.extractor, Some(callee)),
    };
    let factory = registry.find(id).filter(|extractor| extractor.is_factory())?;
    Some((factory, via))
}

/// The derived binding file `target` exports as `name`, following re-exports.
fn exported_binding<'a>(
    project: &ProjectIndex<'a>,
    target: usize,
    name: &str,
    resolver: &dyn ImportResolver,
    seen: &mut HashSet<(usize, String)>,
) -> Option<DerivedExtractorBinding<'a>> {
    if !seen.insert((target, name.to_string())) {
        return None;
    }
    let file = &project.files[target];

    let local_binding = |ident: &Ident| {
        file.reference(ident)
            .and_then(|reference| file.derived.get(&reference))
            .cloned()
    };

    match file.exports.get(name) {
        Some(ExportEntry::Declared { ident, .. }) => local_binding(ident),
        Some(ExportEntry::Local { orig, .. }) => local_binding(orig),
        Some(ExportEntry::Reexport {
            source,
            imported: Some(imported),
            ..
        }) => {
            let next = project.resolve_import(target, source, resolver)?;
            exported_binding(project, next, imported, resolver, seen)
        }
        Some(ExportEntry::Reexport { imported: None, .. }) | Some(ExportEntry::Default { .. }) => None,
        None if name != "default" => file.exports.stars.iter().find_map(|star| {
            let next = project.resolve_import(target, star.source, resolver)?;
            exported_binding(project, next, name, resolver, seen)
        }),
        None => None,
    }
}

fn prop_name(key: &PropName) -> Option<String> {
    match key {
        PropName::Ident(ident) => Some(ident.sym.to_string()),
        PropName::Str(s) => s.value.as_str().map(str::to_string),
        _ => None,
    }
}

fn unwrap_pat_ident(pat: &Pat) -> Option<&Ident> {
    match pat {
        Pat::Ident(binding) => Some(&binding.id),
        Pat::Assign(assign) => unwrap_pat_ident(&assign.left),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{parse_project as project, registry};
    use crate::core::index::CallTarget;

    #[test]
    fn test_factory_destructuring_binds_derived_names() {
        let (files, resolver) = project(&[(
            "/theme.ts",
            r#"
            import { createTheme } from "@styleslice/core";
            export const { css: themed, styled, palette } = createTheme({ brand: "red" });
            themed({ color: "red" });
            "#,
        )]);
        let registry = registry();
        let mut index = ProjectIndex::build(&files, &registry);
        resolve_derived(&mut index, &registry, &resolver);

        let file = &index.files[0];
        assert_eq!(file.derived.len(), 2);
        let names: Vec<String> = {
            let mut names: Vec<String> = file.derived.iter().map(|(r, _)| r.name).collect();
            names.sort();
            names
        };
        assert_eq!(names, vec!["styled", "themed"]);
        let (_, themed) = file.derived.iter().find(|(r, _)| r.name == "themed").unwrap();
        assert_eq!(themed.extractor.to_string(), "@styleslice/core:createTheme.css");
        assert!(themed.is_exported());

        assert_eq!(file.style_calls.len(), 1);
        assert!(matches!(file.style_calls[0].target, CallTarget::Derived { .. }));
    }

    #[test]
    fn test_bindings_follow_imports_and_reexports() {
        let (files, resolver) = project(&[
            (
                "/theme.ts",
                r#"
                import { createTheme } from "@styleslice/core";
                export const { css } = createTheme({});
                "#,
            ),
            ("/index.ts", r#"export { css as brandCss } from "./theme";"#),
            ("/barrel.ts", r#"export * from "./index";"#),
            (
                "/button.ts",
                r#"
                import { brandCss as bc } from "./barrel";
                bc({ color: "blue" });
                "#,
            ),
            (
                "/unused.ts",
                r#"import { brandCss } from "./index";"#,
            ),
        ]);
        let registry = registry();
        let mut index = ProjectIndex::build(&files, &registry);
        resolve_derived(&mut index, &registry, &resolver);

        let button = index.get("/button.ts").unwrap();
        assert_eq!(button.derived.len(), 1);
        assert_eq!(button.style_calls.len(), 1);
        assert_eq!(
            button.style_calls[0].extractor().to_string(),
            "@styleslice/core:createTheme.css"
        );

        let unused = index.get("/unused.ts").unwrap();
        assert_eq!(unused.derived.len(), 1);
        assert!(unused.style_calls.is_empty());
    }

    #[test]
    fn test_derived_factories_bind_the_next_level() {
        let config: crate::config::Config = serde_json::from_value(serde_json::json!({
            "extractors": [{
                "importPath": "kit",
                "symbol": "createKit",
                "kind": "factory",
                "derived": [{ "symbol": "theme", "kind": "factory", "derived": [{ "symbol": "css", "kind": "css" }] }]
            }]
        }))
        .unwrap();
        let registry = ExtractorRegistry::from_config(&config);
        let (files, resolver) = project(&[
            (
                "/kit.ts",
                r#"
                import { createKit } from "kit";
                export const { theme } = createKit({});
                "#,
            ),
            (
                "/button.ts",
                r#"
                import { theme } from "./kit";
                const { css: themed } = theme({ gap: 1 });
                themed({ color: "red" });
                "#,
            ),
        ]);
        let mut index = ProjectIndex::build(&files, &registry);
        resolve_derived(&mut index, &registry, &resolver);

        let button = index.get("/button.ts").unwrap();
        assert_eq!(button.derived.len(), 2);
        let (_, themed) = button.derived.iter().find(|(r, _)| r.name == "themed").unwrap();
        assert_eq!(themed.parent.to_string(), "kit:createKit.theme");
        assert_eq!(themed.extractor.to_string(), "kit:createKit.theme.css");
        assert_eq!(themed.via.map(|ident| ident.sym.as_str()), Some("theme"));

        assert_eq!(button.style_calls.len(), 1);
        assert_eq!(button.style_calls[0].extractor().to_string(), "kit:createKit.theme.css");
    }

    #[test]
    fn test_plain_call_results_are_not_derived() {
        let (files, resolver) = project(&[(
            "/a.ts",
            r#"
            import { css } from "@styleslice/core";
            const { css: inner } = css({});
            const { css: other } = somethingElse();
            "#,
        )]);
        let registry = registry();
        let mut index = ProjectIndex::build(&files, &registry);
        resolve_derived(&mut index, &registry, &resolver);
        assert!(index.files[0].derived.is_empty());
    }
}
