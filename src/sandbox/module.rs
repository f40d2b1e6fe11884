//! Module instantiation, execution and live export bindings.

use std::rc::Rc;

use swc_ecma_ast::*;

use super::env::{Scope, Slot};
use super::error::EvalError;
use super::interp::{Code, EvalResult, Interpreter, collect_var_names};
use super::value::{Object, ObjectClass, Value};
use crate::core::build::Link;
use crate::core::index::{ExportEntry, ExportTable, export_name};
use crate::core::parsers::binding_idents;

/// Local name that holds an anonymous default export.
const DEFAULT_LOCAL: &str = "*default*";

/// A module whose top level threw. Its remaining statements did not run.
#[derive(Debug, Clone)]
pub struct ModuleFailure {
    pub path: String,
    pub error: EvalError,
}

pub struct ModuleRuntime<'b> {
    pub scope: Rc<Scope>,
    pub exports: ExportTable<'b>,
}

/// Where an exported name finally lives.
enum Resolved {
    Binding { module: usize, local: String },
    Namespace(usize),
    External(String),
    Missing,
}

fn default_local(item: &ModuleItem) -> String {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(ExportDefaultDecl {
            decl: DefaultDecl::Fn(FnExpr { ident: Some(ident), .. }),
            ..
        })) => ident.sym.to_string(),
        _ => DEFAULT_LOCAL.to_string(),
    }
}

impl<'b> Interpreter<'b> {
    /// Create every module's scope, bind imports and hoist declarations.
    pub fn instantiate(&mut self) -> EvalResult<()> {
        let bundle = self.bundle;
        for bundled in &bundle.modules {
            let scope = Scope::child(&self.globals);
            let module = &bundled.file.module;

            for item in &module.body {
                match item {
                    ModuleItem::ModuleDecl(ModuleDecl::Import(import)) if !import.type_only => {
                        let source = import.src.value.as_str().unwrap_or_default();
                        let link = bundled.link(source);
                        for spec in &import.specifiers {
                            let (local, slot) = match spec {
                                ImportSpecifier::Named(named) if named.is_type_only => continue,
                                ImportSpecifier::Named(named) => {
                                    let imported = named
                                        .imported
                                        .as_ref()
                                        .and_then(export_name)
                                        .unwrap_or(named.local.sym.as_str());
                                    (&named.local, import_slot(&link, imported))
                                }
                                ImportSpecifier::Default(default) => (&default.local, import_slot(&link, "default")),
                                ImportSpecifier::Namespace(namespace) => (
                                    &namespace.local,
                                    match &link {
                                        Link::Module(target) => Slot::Namespace(*target),
                                        Link::External(specifier) => Slot::External(specifier.clone()),
                                    },
                                ),
                            };
                            scope.declare(local.sym.as_str(), slot, false);
                        }
                    }
                    ModuleItem::Stmt(Stmt::Decl(decl))
                    | ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl { decl, .. })) => {
                        self.hoist_decl(decl, &scope);
                    }
                    ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => match &export.decl {
                        DefaultDecl::Fn(f) => {
                            let local = default_local(item);
                            let closure = self.closure(Code::Function(&f.function), &scope, &local);
                            scope.declare(&local, Slot::Value(closure), true);
                        }
                        DefaultDecl::Class(_) => scope.declare(DEFAULT_LOCAL, Slot::Uninit, false),
                        DefaultDecl::TsInterfaceDecl(_) => {}
                    },
                    ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(_)) => {
                        scope.declare(DEFAULT_LOCAL, Slot::Uninit, false);
                    }
                    _ => {}
                }
            }

            let mut vars = Vec::new();
            for item in &module.body {
                match item {
                    ModuleItem::Stmt(stmt) => collect_var_names(stmt, &mut vars),
                    ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
                        decl: Decl::Var(var), ..
                    })) if var.kind == VarDeclKind::Var => {
                        for declarator in &var.decls {
                            vars.extend(binding_idents(&declarator.name).iter().map(|i| i.sym.to_string()));
                        }
                    }
                    _ => {}
                }
            }
            for name in vars {
                if !scope.has_own(&name) {
                    scope.declare(&name, Slot::Value(Value::Undefined), true);
                }
            }

            self.modules.push(ModuleRuntime {
                scope,
                exports: ExportTable::build(module),
            });
        }
        Ok(())
    }

    /// Run every module body in dependency order.
    ///
    /// A module whose top level throws stops there and is recorded; later
    /// modules still run. Only an uncatchable error ends the whole run.
    pub fn execute(&mut self) -> EvalResult<Vec<ModuleFailure>> {
        let bundle = self.bundle;
        let mut failures = Vec::new();
        for &index in &bundle.order {
            match self.execute_module(index) {
                Ok(()) => {}
                Err(error) if error.is_catchable() => {
                    let path = bundle.modules[index].path.clone();
                    tracing::debug!(module = %path, %error, "module evaluation failed");
                    failures.push(ModuleFailure { path, error });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(failures)
    }

    fn execute_module(&mut self, index: usize) -> EvalResult<()> {
        let bundle = self.bundle;
        let scope = self.modules[index].scope.clone();
        for item in &bundle.modules[index].file.module.body {
            match item {
                ModuleItem::Stmt(stmt) => {
                    self.exec_stmt(stmt, &scope)?;
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => self.exec_decl(&export.decl, &scope)?,
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(export)) => {
                    let value = self.eval(&export.expr, &scope)?;
                    scope.initialize(DEFAULT_LOCAL, value);
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(ExportDefaultDecl {
                    decl: DefaultDecl::Class(_),
                    ..
                })) => return Err(EvalError::unsupported("classes")),
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve_export(&self, module: usize, name: &str, seen: &mut Vec<(usize, String)>) -> Resolved {
        if seen.iter().any(|(m, n)| *m == module && n == name) {
            return Resolved::Missing;
        }
        seen.push((module, name.to_string()));

        let bundled = &self.bundle.modules[module];
        let exports = &self.modules[module].exports;
        match exports.named.get(name) {
            Some(ExportEntry::Declared { ident, .. }) => Resolved::Binding {
                module,
                local: ident.sym.to_string(),
            },
            Some(ExportEntry::Local { orig, .. }) => Resolved::Binding {
                module,
                local: orig.sym.to_string(),
            },
            Some(ExportEntry::Default { item }) => Resolved::Binding {
                module,
                local: default_local(item),
            },
            Some(ExportEntry::Reexport { source, imported, .. }) => match (bundled.link(source), imported) {
                (Link::External(specifier), _) => Resolved::External(specifier),
                (Link::Module(target), Some(imported)) => self.resolve_export(target, imported, seen),
                (Link::Module(target), None) => Resolved::Namespace(target),
            },
            None if name == "default" => Resolved::Missing,
            None => {
                let mut external = None;
                for star in &exports.stars {
                    match bundled.link(star.source) {
                        Link::Module(target) => match self.resolve_export(target, name, seen) {
                            Resolved::Missing => {}
                            found => return found,
                        },
                        Link::External(specifier) => external = external.or(Some(specifier)),
                    }
                }
                external.map_or(Resolved::Missing, Resolved::External)
            }
        }
    }

    /// Current value of export `name` of `module`.
    pub(super) fn read_export(&mut self, module: usize, name: &str) -> EvalResult {
        let resolved = self.resolve_export(module, name, &mut Vec::new());
        match resolved {
            Resolved::Binding { module, local } => {
                let binding = self.modules[module].scope.lookup(&local);
                let Some(binding) = binding else {
                    return Err(EvalError::Reference(format!("`{local}` is not defined")));
                };
                self.enter()?;
                let value = self.read_slot(&local, binding.slot);
                self.leave();
                value
            }
            Resolved::Namespace(target) => Ok(self.namespace_object(target)),
            Resolved::External(specifier) => Err(EvalError::Reference(format!(
                "`{name}` is re-exported from `{specifier}`, which is not part of the bundle"
            ))),
            Resolved::Missing => Err(EvalError::Reference(format!(
                "module `{}` has no export named `{name}`",
                self.bundle.modules[module].path
            ))),
        }
    }

    fn export_names(&self, module: usize, seen: &mut Vec<usize>, out: &mut Vec<String>) {
        if seen.contains(&module) {
            return;
        }
        seen.push(module);
        let exports = &self.modules[module].exports;
        for name in exports.named.keys() {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        for star in &exports.stars {
            if let Link::Module(target) = self.bundle.modules[module].link(star.source) {
                let mut names = Vec::new();
                self.export_names(target, seen, &mut names);
                for name in names {
                    if name != "default" && !out.contains(&name) {
                        out.push(name);
                    }
                }
            }
        }
    }

    /// A snapshot of `module`'s exports. Names that cannot be read yet are
    /// left undefined.
    pub(super) fn namespace_object(&mut self, module: usize) -> Value {
        let mut names = Vec::new();
        self.export_names(module, &mut Vec::new(), &mut names);
        names.sort();
        let mut object = Object::new(ObjectClass::Namespace);
        for name in names {
            let value = self.read_export(module, &name).unwrap_or_default();
            object.set(&name, value);
        }
        Value::object(object)
    }
}

fn import_slot(link: &Link, name: &str) -> Slot {
    match link {
        Link::Module(module) => Slot::Import {
            module: *module,
            name: name.to_string(),
        },
        Link::External(specifier) => Slot::External(specifier.clone()),
    }
}
