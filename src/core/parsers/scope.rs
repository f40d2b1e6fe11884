//! Lexical scope resolution.
//!
//! Runs two passes of the same visitor over a module. The first pass creates
//! scopes and records which names each scope declares; the second pass walks
//! the identical scope structure again and binds every identifier reference to
//! the innermost scope that declares its name. Scope ids are assigned in push
//! order, so both passes agree on them without sharing any node identity.

use std::collections::{HashMap, HashSet};

use swc_common::BytePos;
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitWith};

/// Opaque lexical scope identifier. Only equality and hashing are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const MODULE: ScopeId = ScopeId(0);
}

/// Identifier start position -> scope that declares the identifier's name.
///
/// Identifiers that resolve to nothing (globals, property keys) are absent.
pub type ScopeTable = HashMap<BytePos, ScopeId>;

/// Resolve scopes for every identifier of `module`.
pub fn resolve_scopes(module: &Module) -> ScopeTable {
    let mut resolver = ScopeResolver::new(Mode::Declare);
    module.visit_with(&mut resolver);

    let scopes = std::mem::take(&mut resolver.scopes);
    let table = std::mem::take(&mut resolver.table);
    let mut resolver = ScopeResolver {
        mode: Mode::Resolve,
        scopes,
        stack: Vec::new(),
        next: 0,
        table,
    };
    module.visit_with(&mut resolver);
    resolver.table
}

/// Names bound by a pattern, in source order.
pub fn binding_names(pat: &Pat) -> Vec<String> {
    binding_idents(pat)
        .into_iter()
        .map(|ident| ident.sym.to_string())
        .collect()
}

/// Identifiers bound by a pattern, in source order.
pub fn binding_idents(pat: &Pat) -> Vec<&Ident> {
    match pat {
        Pat::Ident(ident) => vec![&ident.id],
        Pat::Object(obj) => obj
            .props
            .iter()
            .flat_map(|prop| match prop {
                ObjectPatProp::KeyValue(kv) => binding_idents(&kv.value),
                ObjectPatProp::Assign(assign) => vec![&assign.key.id],
                ObjectPatProp::Rest(rest) => binding_idents(&rest.arg),
            })
            .collect(),
        Pat::Array(arr) => arr.elems.iter().flatten().flat_map(binding_idents).collect(),
        Pat::Assign(assign) => binding_idents(&assign.left),
        Pat::Rest(rest) => binding_idents(&rest.arg),
        _ => vec![],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Declare,
    Resolve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Function,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    /// `var`: hoisted to the nearest function or module scope.
    Var,
    /// `let`, `const`, `class`, function declarations, params, catch params.
    Lexical,
}

struct Scope {
    kind: ScopeKind,
    names: HashSet<String>,
}

struct ScopeResolver {
    mode: Mode,
    scopes: Vec<Scope>,
    stack: Vec<ScopeId>,
    next: u32,
    table: ScopeTable,
}

impl ScopeResolver {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            scopes: Vec::new(),
            stack: Vec::new(),
            next: 0,
            table: ScopeTable::new(),
        }
    }

    fn enter(&mut self, kind: ScopeKind) {
        let id = ScopeId(self.next);
        self.next += 1;
        if self.mode == Mode::Declare {
            self.scopes.push(Scope {
                kind,
                names: HashSet::new(),
            });
        }
        self.stack.push(id);
    }

    fn exit(&mut self) {
        self.stack.pop();
    }

    fn scoped(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self)) {
        self.enter(kind);
        f(self);
        self.exit();
    }

    fn declare(&mut self, ident: &Ident, binding: Binding) {
        if self.mode != Mode::Declare {
            return;
        }
        let target = match binding {
            Binding::Lexical => self.stack.last().copied(),
            Binding::Var => self
                .stack
                .iter()
                .rev()
                .find(|id| {
                    matches!(
                        self.scopes[id.0 as usize].kind,
                        ScopeKind::Function | ScopeKind::Module
                    )
                })
                .copied(),
        };
        let Some(target) = target else {
            return;
        };
        self.scopes[target.0 as usize]
            .names
            .insert(ident.sym.to_string());
        self.table.insert(ident.span.lo, target);
    }

    fn lookup(&self, name: &str) -> Option<ScopeId> {
        self.stack
            .iter()
            .rev()
            .find(|id| {
                self.scopes
                    .get(id.0 as usize)
                    .is_some_and(|scope| scope.names.contains(name))
            })
            .copied()
    }

    /// Declare the identifiers a pattern binds and visit the expressions it
    /// evaluates (defaults and computed keys).
    fn bind_pat(&mut self, pat: &Pat, binding: Binding) {
        match pat {
            Pat::Ident(ident) => self.declare(&ident.id, binding),
            Pat::Array(arr) => {
                for elem in arr.elems.iter().flatten() {
                    self.bind_pat(elem, binding);
                }
            }
            Pat::Rest(rest) => self.bind_pat(&rest.arg, binding),
            Pat::Object(obj) => {
                for prop in &obj.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => {
                            kv.key.visit_with(self);
                            self.bind_pat(&kv.value, binding);
                        }
                        ObjectPatProp::Assign(assign) => {
                            self.declare(&assign.key.id, binding);
                            assign.value.visit_with(self);
                        }
                        ObjectPatProp::Rest(rest) => self.bind_pat(&rest.arg, binding),
                    }
                }
            }
            Pat::Assign(assign) => {
                self.bind_pat(&assign.left, binding);
                assign.right.visit_with(self);
            }
            Pat::Expr(expr) => expr.visit_with(self),
            Pat::Invalid(_) => {}
        }
    }

    fn visit_function_parts(&mut self, params: &[Param], body: Option<&BlockStmt>) {
        self.scoped(ScopeKind::Function, |this| {
            for param in params {
                this.bind_pat(&param.pat, Binding::Lexical);
            }
            if let Some(body) = body {
                body.stmts.visit_with(this);
            }
        });
    }
}

impl Visit for ScopeResolver {
    fn visit_module(&mut self, module: &Module) {
        self.scoped(ScopeKind::Module, |this| module.body.visit_with(this));
    }

    fn visit_ident(&mut self, ident: &Ident) {
        if self.mode == Mode::Resolve
            && !self.table.contains_key(&ident.span.lo)
            && let Some(scope) = self.lookup(ident.sym.as_str())
        {
            self.table.insert(ident.span.lo, scope);
        }
    }

    fn visit_import_decl(&mut self, import: &ImportDecl) {
        if import.type_only {
            return;
        }
        for spec in &import.specifiers {
            let local = match spec {
                ImportSpecifier::Named(named) => &named.local,
                ImportSpecifier::Default(default) => &default.local,
                ImportSpecifier::Namespace(ns) => &ns.local,
            };
            self.declare(local, Binding::Lexical);
        }
    }

    fn visit_named_export(&mut self, export: &NamedExport) {
        if export.src.is_some() || export.type_only {
            return;
        }
        for spec in &export.specifiers {
            if let ExportSpecifier::Named(named) = spec
                && let ModuleExportName::Ident(orig) = &named.orig
            {
                self.visit_ident(orig);
            }
        }
    }

    fn visit_export_all(&mut self, _: &ExportAll) {}

    fn visit_export_default_decl(&mut self, export: &ExportDefaultDecl) {
        match &export.decl {
            DefaultDecl::Fn(f) => {
                if let Some(ident) = &f.ident {
                    self.declare(ident, Binding::Lexical);
                }
                f.function.visit_with(self);
            }
            DefaultDecl::Class(c) => {
                if let Some(ident) = &c.ident {
                    self.declare(ident, Binding::Lexical);
                }
                c.class.visit_with(self);
            }
            DefaultDecl::TsInterfaceDecl(_) => {}
        }
    }

    fn visit_var_decl(&mut self, var: &VarDecl) {
        let binding = match var.kind {
            VarDeclKind::Var => Binding::Var,
            _ => Binding::Lexical,
        };
        for decl in &var.decls {
            self.bind_pat(&decl.name, binding);
            decl.init.visit_with(self);
        }
    }

    fn visit_fn_decl(&mut self, f: &FnDecl) {
        self.declare(&f.ident, Binding::Lexical);
        f.function.visit_with(self);
    }

    fn visit_class_decl(&mut self, c: &ClassDecl) {
        self.declare(&c.ident, Binding::Lexical);
        c.class.visit_with(self);
    }

    fn visit_fn_expr(&mut self, f: &FnExpr) {
        match &f.ident {
            Some(ident) => self.scoped(ScopeKind::Block, |this| {
                this.declare(ident, Binding::Lexical);
                f.function.visit_with(this);
            }),
            None => f.function.visit_with(self),
        }
    }

    fn visit_class_expr(&mut self, c: &ClassExpr) {
        match &c.ident {
            Some(ident) => self.scoped(ScopeKind::Block, |this| {
                this.declare(ident, Binding::Lexical);
                c.class.visit_with(this);
            }),
            None => c.class.visit_with(self),
        }
    }

    fn visit_function(&mut self, f: &Function) {
        self.visit_function_parts(&f.params, f.body.as_ref());
    }

    fn visit_arrow_expr(&mut self, arrow: &ArrowExpr) {
        self.scoped(ScopeKind::Function, |this| {
            for param in &arrow.params {
                this.bind_pat(param, Binding::Lexical);
            }
            match &*arrow.body {
                BlockStmtOrExpr::BlockStmt(block) => block.stmts.visit_with(this),
                BlockStmtOrExpr::Expr(expr) => expr.visit_with(this),
            }
        });
    }

    fn visit_constructor(&mut self, ctor: &Constructor) {
        ctor.key.visit_with(self);
        self.scoped(ScopeKind::Function, |this| {
            for param in &ctor.params {
                match param {
                    ParamOrTsParamProp::Param(param) => this.bind_pat(&param.pat, Binding::Lexical),
                    ParamOrTsParamProp::TsParamProp(prop) => match &prop.param {
                        TsParamPropParam::Ident(ident) => this.declare(&ident.id, Binding::Lexical),
                        TsParamPropParam::Assign(assign) => this.bind_pat(&assign.left, Binding::Lexical),
                    },
                }
            }
            if let Some(body) = &ctor.body {
                body.stmts.visit_with(this);
            }
        });
    }

    fn visit_getter_prop(&mut self, getter: &GetterProp) {
        getter.key.visit_with(self);
        self.visit_function_parts(&[], getter.body.as_ref());
    }

    fn visit_setter_prop(&mut self, setter: &SetterProp) {
        setter.key.visit_with(self);
        self.scoped(ScopeKind::Function, |this| {
            this.bind_pat(&setter.param, Binding::Lexical);
            if let Some(body) = &setter.body {
                body.stmts.visit_with(this);
            }
        });
    }

    fn visit_block_stmt(&mut self, block: &BlockStmt) {
        self.scoped(ScopeKind::Block, |this| block.stmts.visit_with(this));
    }

    fn visit_for_stmt(&mut self, stmt: &ForStmt) {
        self.scoped(ScopeKind::Block, |this| {
            stmt.init.visit_with(this);
            stmt.test.visit_with(this);
            stmt.update.visit_with(this);
            stmt.body.visit_with(this);
        });
    }

    fn visit_for_in_stmt(&mut self, stmt: &ForInStmt) {
        self.scoped(ScopeKind::Block, |this| {
            stmt.left.visit_with(this);
            stmt.right.visit_with(this);
            stmt.body.visit_with(this);
        });
    }

    fn visit_for_of_stmt(&mut self, stmt: &ForOfStmt) {
        self.scoped(ScopeKind::Block, |this| {
            stmt.left.visit_with(this);
            stmt.right.visit_with(this);
            stmt.body.visit_with(this);
        });
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause) {
        self.scoped(ScopeKind::Block, |this| {
            if let Some(param) = &clause.param {
                this.bind_pat(param, Binding::Lexical);
            }
            clause.body.stmts.visit_with(this);
        });
    }

    fn visit_switch_stmt(&mut self, stmt: &SwitchStmt) {
        stmt.discriminant.visit_with(self);
        self.scoped(ScopeKind::Block, |this| stmt.cases.visit_with(this));
    }

    fn visit_labeled_stmt(&mut self, stmt: &LabeledStmt) {
        stmt.body.visit_with(self);
    }

    fn visit_break_stmt(&mut self, _: &BreakStmt) {}

    fn visit_continue_stmt(&mut self, _: &ContinueStmt) {}

    fn visit_ts_enum_decl(&mut self, decl: &TsEnumDecl) {
        self.declare(&decl.id, Binding::Lexical);
        for member in &decl.members {
            member.init.visit_with(self);
        }
    }

    // Type-level syntax never references runtime bindings.
    fn visit_ts_type(&mut self, _: &TsType) {}
    fn visit_ts_type_ann(&mut self, _: &TsTypeAnn) {}
    fn visit_ts_type_param_decl(&mut self, _: &TsTypeParamDecl) {}
    fn visit_ts_type_param_instantiation(&mut self, _: &TsTypeParamInstantiation) {}
    fn visit_ts_interface_decl(&mut self, _: &TsInterfaceDecl) {}
    fn visit_ts_type_alias_decl(&mut self, _: &TsTypeAliasDecl) {}
    fn visit_ts_module_decl(&mut self, _: &TsModuleDecl) {}
    fn visit_ts_expr_with_type_args(&mut self, _: &TsExprWithTypeArgs) {}
    fn visit_ts_import_equals_decl(&mut self, _: &TsImportEqualsDecl) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parsers::parse_standalone;

    struct Occurrences<'n> {
        name: &'n str,
        found: Vec<BytePos>,
    }

    impl Visit for Occurrences<'_> {
        fn visit_ident(&mut self, ident: &Ident) {
            if ident.sym.as_str() == self.name {
                self.found.push(ident.span.lo);
            }
        }
    }

    /// Scope ids of every `Ident` occurrence of `name`, in source order.
    fn scopes_of(code: &str, name: &str) -> Vec<Option<ScopeId>> {
        let parsed = parse_standalone(code, "/test.ts").unwrap();
        let mut occurrences = Occurrences {
            name,
            found: Vec::new(),
        };
        parsed.module.visit_with(&mut occurrences);
        occurrences.found.sort();
        occurrences
            .found
            .into_iter()
            .map(|pos| parsed.scopes.get(&pos).copied())
            .collect()
    }

    #[test]
    fn test_shadowed_names_get_distinct_scopes() {
        let code = "const color = 1; function f(color) { return color; } color;";
        let ids = scopes_of(code, "color");
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], Some(ScopeId::MODULE));
        assert!(ids[1].is_some());
        assert_ne!(ids[1], ids[0]);
        assert_eq!(ids[2], ids[1]);
        assert_eq!(ids[3], Some(ScopeId::MODULE));
    }

    #[test]
    fn test_var_hoists_to_function_scope() {
        let code = "function f() { { var x = 1; } return x; }";
        let ids = scopes_of(code, "x");
        assert_eq!(ids.len(), 2);
        assert!(ids[0].is_some());
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn test_let_is_block_scoped() {
        let code = "let y = 0; { let y = 1; y; } y;";
        let ids = scopes_of(code, "y");
        assert_eq!(ids[0], Some(ScopeId::MODULE));
        assert_ne!(ids[1], ids[0]);
        assert_eq!(ids[2], ids[1]);
        assert_eq!(ids[3], Some(ScopeId::MODULE));
    }

    #[test]
    fn test_globals_and_property_keys_are_unscoped() {
        let code = "const a = { window: 1 }; a.window; window;";
        let ids = scopes_of(code, "window");
        assert_eq!(ids, vec![None]);
    }

    #[test]
    fn test_imports_bind_module_scope() {
        let code = r#"import { css as styleFn } from "lib"; styleFn({});"#;
        let ids = scopes_of(code, "styleFn");
        assert_eq!(ids, vec![Some(ScopeId::MODULE), Some(ScopeId::MODULE)]);
        assert_eq!(scopes_of(code, "css"), vec![None]);
    }

    #[test]
    fn test_type_references_are_ignored() {
        let code = "type Color = string; const c: Color = 'red';";
        assert_eq!(scopes_of(code, "Color"), vec![None, None]);
    }

    #[test]
    fn test_binding_names_follow_pattern_order() {
        let parsed = parse_standalone("const { a, b: [c, , d = 1], ...rest } = obj;", "/t.ts").unwrap();
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = &parsed.module.body[0] else {
            panic!("expected var decl");
        };
        assert_eq!(binding_names(&var.decls[0].name), vec!["a", "c", "d", "rest"]);
    }
}
