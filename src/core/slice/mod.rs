//! Minimal module generation.
//!
//! Reduces each file to the module items its used bindings need, then appends
//! a trailer that re-issues every style call through the registration
//! globals. A file with neither produces nothing.

mod pattern;
mod render;

use swc_ecma_ast::*;

pub use pattern::{SlicePat, SliceProp, prune_pattern};
pub use render::{
    EXTRACTORS_GLOBAL, INTRINSIC_GLOBAL, REGISTER_GLOBAL, REPORT_GLOBAL, quote, render_args,
};

use crate::core::index::{CallTarget, FileIndex, ImportBinding, Imported, ProjectIndex};
use crate::core::parsers::ParsedFile;
use crate::core::walk::Node;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::extractors::{ExtractorId, ExtractorRegistry};

#[derive(Debug, Clone)]
pub struct SliceDeclarator<'a> {
    pub declarator: &'a VarDeclarator,
    pub pattern: SlicePat<'a>,
}

/// One retained (possibly rewritten) top-level item.
#[derive(Debug, Clone)]
pub enum SliceItem<'a> {
    Whole(&'a ModuleItem),
    Import {
        decl: &'a ImportDecl,
        specifiers: Vec<&'a ImportSpecifier>,
    },
    Var {
        decl: &'a VarDecl,
        exported: bool,
        declarators: Vec<SliceDeclarator<'a>>,
    },
    Export {
        export: &'a NamedExport,
        specifiers: Vec<&'a ExportSpecifier>,
    },
    /// A style-library import replaced by an inert stand-in.
    Intrinsic { local: &'a Ident, id: String },
    /// A derived extractor, re-created from its factory's callback.
    Derived {
        local: &'a Ident,
        exported: bool,
        factory: ExtractorId,
        /// Local callee when the factory is itself derived.
        via: Option<&'a Ident>,
        name: String,
        call: &'a CallExpr,
    },
}

/// One trailer call.
#[derive(Debug, Clone)]
pub enum Registration<'a> {
    Intrinsic {
        extractor: ExtractorId,
        args: &'a [ExprOrSpread],
    },
    Derived {
        local: &'a Ident,
        args: &'a [ExprOrSpread],
    },
}

/// The pruned form of one file.
#[derive(Debug, Clone)]
pub struct SlicedModule<'a> {
    pub file: &'a ParsedFile,
    pub items: Vec<SliceItem<'a>>,
    pub registrations: Vec<Registration<'a>>,
}

impl<'a> SlicedModule<'a> {
    pub fn path(&self) -> &str {
        &self.file.path
    }

    /// Whether the module only exists for other files to import.
    pub fn is_dependency_only(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Reduce one top-level item. Empty when nothing in it is needed.
pub fn slice_item<'a>(
    index: &FileIndex<'a>,
    item: &'a ModuleItem,
    registry: &ExtractorRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<SliceItem<'a>> {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::Import(decl)) => slice_import(index, decl, registry),
        ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => slice_var(index, var, false, diagnostics),
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
            decl: Decl::Var(var), ..
        })) => slice_var(index, var, true, diagnostics),
        ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(export)) => slice_export(index, export, item),
        _ if index.is_used(Node::ModuleItem(item)) => vec![SliceItem::Whole(item)],
        _ => Vec::new(),
    }
}

fn slice_import<'a>(index: &FileIndex<'a>, decl: &'a ImportDecl, registry: &ExtractorRegistry) -> Vec<SliceItem<'a>> {
    let used: Vec<&ImportBinding<'a>> = index
        .imports
        .iter()
        .filter(|import| std::ptr::eq(import.decl, decl) && index.is_binding_used(import.local))
        .collect();
    if used.is_empty() {
        return Vec::new();
    }

    if registry.is_library(used[0].source) {
        return used
            .into_iter()
            .map(|import| {
                let id = index
                    .intrinsics
                    .lookup(index.reference(import.local).as_ref())
                    .map(ToString::to_string)
                    .unwrap_or_else(|| {
                        let symbol = match &import.imported {
                            Imported::Named(name) => name.as_str(),
                            Imported::Default => "default",
                            Imported::Namespace => "*",
                        };
                        ExtractorId::new(import.source, symbol).to_string()
                    });
                SliceItem::Intrinsic {
                    local: import.local,
                    id,
                }
            })
            .collect();
    }

    vec![SliceItem::Import {
        decl,
        specifiers: used.into_iter().map(|import| import.spec).collect(),
    }]
}

fn slice_var<'a>(
    index: &FileIndex<'a>,
    var: &'a VarDecl,
    exported: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<SliceItem<'a>> {
    let mut derived_items = Vec::new();
    let mut declarators = Vec::new();

    for declarator in &var.decls {
        let derived = index.derived_in(declarator);
        if derived.is_empty() {
            if let Some(pattern) = prune_pattern(index, &declarator.name) {
                declarators.push(SliceDeclarator { declarator, pattern });
            }
            continue;
        }

        for binding in &derived {
            if index.is_binding_used(binding.local) {
                derived_items.push(SliceItem::Derived {
                    local: binding.local,
                    exported: binding.is_exported(),
                    factory: binding.parent.clone(),
                    via: binding.via,
                    name: binding.name.clone(),
                    call: binding.call,
                });
            }
        }

        // Only the derived names are re-created; other names bound by the
        // same pattern are lost.
        for ident in crate::core::parsers::binding_idents(&declarator.name) {
            let is_derived = derived.iter().any(|binding| std::ptr::eq(binding.local, ident));
            if !is_derived && index.is_binding_used(ident) {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticCode::DerivedSiblingDropped,
                        format!(
                            "`{}` is destructured alongside a derived extractor and cannot be extracted",
                            ident.sym
                        ),
                    )
                    .in_file(index.path()),
                );
            }
        }
    }

    let mut items = Vec::new();
    if !declarators.is_empty() {
        items.push(SliceItem::Var {
            decl: var,
            exported,
            declarators,
        });
    }
    items.extend(derived_items);
    items
}

fn slice_export<'a>(index: &FileIndex<'a>, export: &'a NamedExport, item: &'a ModuleItem) -> Vec<SliceItem<'a>> {
    if export.type_only {
        return Vec::new();
    }
    let local = export.src.is_none();
    let specifiers: Vec<&ExportSpecifier> = export
        .specifiers
        .iter()
        .filter(|spec| index.is_used(Node::ExportSpecifier { spec: *spec, local }))
        .collect();

    if specifiers.is_empty() {
        Vec::new()
    } else if specifiers.len() == export.specifiers.len()
        || specifiers
            .iter()
            .any(|spec| !matches!(spec, ExportSpecifier::Named(_)))
    {
        vec![SliceItem::Whole(item)]
    } else {
        vec![SliceItem::Export { export, specifiers }]
    }
}

/// Trailer calls for every style call in the file, in source order.
pub fn registrations<'a>(index: &FileIndex<'a>) -> Vec<Registration<'a>> {
    let mut calls: Vec<_> = index.style_calls.iter().collect();
    calls.sort_by_key(|call| call.call.span.lo);
    calls
        .into_iter()
        .map(|call| match &call.target {
            CallTarget::Intrinsic(extractor) => Registration::Intrinsic {
                extractor: extractor.clone(),
                args: call.args,
            },
            CallTarget::Derived { local, .. } => Registration::Derived {
                local: *local,
                args: call.args,
            },
        })
        .collect()
}

/// Produce the minimal module for one file.
pub fn slice_module<'a>(index: &FileIndex<'a>, registry: &ExtractorRegistry) -> (Option<SlicedModule<'a>>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let items: Vec<SliceItem<'a>> = index
        .file
        .module
        .body
        .iter()
        .flat_map(|item| slice_item(index, item, registry, &mut diagnostics))
        .collect();
    let registrations = registrations(index);

    if items.is_empty() && registrations.is_empty() {
        return (None, diagnostics);
    }
    let module = SlicedModule {
        file: index.file,
        items,
        registrations,
    };
    (Some(module), diagnostics)
}

/// Slice every file in the project, in index order.
pub fn slice_project<'a>(
    project: &ProjectIndex<'a>,
    registry: &ExtractorRegistry,
) -> (Vec<SlicedModule<'a>>, Vec<Diagnostic>) {
    let mut modules = Vec::new();
    let mut diagnostics = Vec::new();
    for index in &project.files {
        let (module, found) = slice_module(index, registry);
        modules.extend(module);
        diagnostics.extend(found);
    }
    tracing::debug!(
        modules = modules.len(),
        dependency_only = modules.iter().filter(|m| m.is_dependency_only()).count(),
        "sliced project"
    );
    (modules, diagnostics)
}
