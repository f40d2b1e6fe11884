use std::collections::HashMap;

use swc_ecma_ast::*;

use crate::core::parsers::binding_idents;

/// How one exported name is provided by a module.
#[derive(Debug, Clone, Copy)]
pub enum ExportEntry<'a> {
    /// `export const x`, `export function x`, `export class x`, `export enum x`.
    Declared { item: &'a ModuleItem, ident: &'a Ident },
    /// `export { local as name }`
    Local {
        item: &'a ModuleItem,
        spec: &'a ExportSpecifier,
        orig: &'a Ident,
    },
    /// `export { name } from "..."`, or `export * as name from "..."` when
    /// `imported` is `None`.
    Reexport {
        item: &'a ModuleItem,
        spec: &'a ExportSpecifier,
        source: &'a str,
        imported: Option<&'a str>,
    },
    /// `export default ...`
    Default { item: &'a ModuleItem },
}

impl<'a> ExportEntry<'a> {
    pub fn item(&self) -> &'a ModuleItem {
        match self {
            ExportEntry::Declared { item, .. }
            | ExportEntry::Local { item, .. }
            | ExportEntry::Reexport { item, .. }
            | ExportEntry::Default { item } => item,
        }
    }
}

/// `export * from "..."`
#[derive(Debug, Clone, Copy)]
pub struct StarExport<'a> {
    pub item: &'a ModuleItem,
    pub source: &'a str,
}

/// Exported names of one module.
#[derive(Debug, Default)]
pub struct ExportTable<'a> {
    pub named: HashMap<String, ExportEntry<'a>>,
    pub stars: Vec<StarExport<'a>>,
}

impl<'a> ExportTable<'a> {
    pub fn build(module: &'a Module) -> Self {
        let mut table = ExportTable::default();
        for item in &module.body {
            let ModuleItem::ModuleDecl(decl) = item else {
                continue;
            };
            match decl {
                ModuleDecl::ExportDecl(export) => {
                    for ident in declared_idents(&export.decl) {
                        table
                            .named
                            .insert(ident.sym.to_string(), ExportEntry::Declared { item, ident });
                    }
                }
                ModuleDecl::ExportNamed(export) if !export.type_only => {
                    let source = export.src.as_deref().and_then(|src| src.value.as_str());
                    for spec in &export.specifiers {
                        table.add_specifier(item, spec, source, export.src.is_some());
                    }
                }
                ModuleDecl::ExportDefaultDecl(_) | ModuleDecl::ExportDefaultExpr(_) => {
                    table
                        .named
                        .insert("default".to_string(), ExportEntry::Default { item });
                }
                ModuleDecl::ExportAll(export) if !export.type_only => {
                    if let Some(source) = export.src.value.as_str() {
                        table.stars.push(StarExport { item, source });
                    }
                }
                _ => {}
            }
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&ExportEntry<'a>> {
        self.named.get(name)
    }

    fn add_specifier(
        &mut self,
        item: &'a ModuleItem,
        spec: &'a ExportSpecifier,
        source: Option<&'a str>,
        has_source: bool,
    ) {
        match spec {
            ExportSpecifier::Named(named) => {
                if named.is_type_only {
                    return;
                }
                let exported = named.exported.as_ref().unwrap_or(&named.orig);
                let Some(name) = export_name(exported) else {
                    return;
                };
                let entry = match (source, &named.orig) {
                    (Some(source), orig) => ExportEntry::Reexport {
                        item,
                        spec,
                        source,
                        imported: export_name(orig),
                    },
                    (None, ModuleExportName::Ident(orig)) if !has_source => {
                        ExportEntry::Local { item, spec, orig }
                    }
                    _ => return,
                };
                self.named.insert(name.to_string(), entry);
            }
            ExportSpecifier::Namespace(ns) => {
                if let (Some(source), Some(name)) = (source, export_name(&ns.name)) {
                    self.named.insert(
                        name.to_string(),
                        ExportEntry::Reexport {
                            item,
                            spec,
                            source,
                            imported: None,
                        },
                    );
                }
            }
            ExportSpecifier::Default(default) => {
                if let Some(source) = source {
                    self.named.insert(
                        default.exported.sym.to_string(),
                        ExportEntry::Reexport {
                            item,
                            spec,
                            source,
                            imported: Some("default"),
                        },
                    );
                }
            }
        }
    }
}

/// Name text of an export/import alias.
pub fn export_name(name: &ModuleExportName) -> Option<&str> {
    match name {
        ModuleExportName::Ident(ident) => Some(ident.sym.as_str()),
        ModuleExportName::Str(s) => s.value.as_str(),
    }
}

/// Identifiers a declaration binds at module level.
pub fn declared_idents(decl: &Decl) -> Vec<&Ident> {
    match decl {
        Decl::Class(c) => vec![&c.ident],
        Decl::Fn(f) => vec![&f.ident],
        Decl::Var(var) => var.decls.iter().flat_map(|d| binding_idents(&d.name)).collect(),
        Decl::TsEnum(e) => vec![&e.id],
        _ => vec![],
    }
}
