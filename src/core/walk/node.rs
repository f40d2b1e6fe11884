//! Closed set of syntax node kinds the traversal engine knows about.

use swc_common::{Span, Spanned};
use swc_ecma_ast::*;

/// A borrowed syntax node.
///
/// Wraps the swc type for each kind the engine distinguishes. Identifiers come in
/// two flavours: [`Node::Ident`] is a read or write of an existing binding,
/// [`Node::BindingIdent`] is the site that declares one.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Module(&'a Module),
    ModuleItem(&'a ModuleItem),
    ImportDecl(&'a ImportDecl),
    ImportSpecifier(&'a ImportSpecifier),
    ExportDecl(&'a ExportDecl),
    NamedExport(&'a NamedExport),
    /// `local` is false for specifiers of `export { .. } from "..."`.
    ExportSpecifier { spec: &'a ExportSpecifier, local: bool },
    ExportDefaultDecl(&'a ExportDefaultDecl),
    ExportDefaultExpr(&'a ExportDefaultExpr),
    ExportAll(&'a ExportAll),
    Stmt(&'a Stmt),
    BlockStmt(&'a BlockStmt),
    SwitchCase(&'a SwitchCase),
    CatchClause(&'a CatchClause),
    ForHead(&'a ForHead),
    Decl(&'a Decl),
    VarDecl(&'a VarDecl),
    VarDeclarator(&'a VarDeclarator),
    Function(&'a Function),
    Param(&'a Param),
    Class(&'a Class),
    ClassMember(&'a ClassMember),
    Pat(&'a Pat),
    ObjectPatProp(&'a ObjectPatProp),
    AssignTarget(&'a AssignTarget),
    Expr(&'a Expr),
    Call(&'a CallExpr),
    Member(&'a MemberExpr),
    OptChain(&'a OptChainExpr),
    Arrow(&'a ArrowExpr),
    Prop(&'a Prop),
    PropName(&'a PropName),
    Ident(&'a Ident),
    BindingIdent(&'a Ident),
    JSXElement(&'a JSXElement),
    JSXFragment(&'a JSXFragment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Module,
    ModuleItem,
    ImportDecl,
    ImportSpecifier,
    ExportDecl,
    NamedExport,
    ExportSpecifier,
    ExportDefaultDecl,
    ExportDefaultExpr,
    ExportAll,
    Stmt,
    BlockStmt,
    SwitchCase,
    CatchClause,
    ForHead,
    Decl,
    VarDecl,
    VarDeclarator,
    Function,
    Param,
    Class,
    ClassMember,
    Pat,
    ObjectPatProp,
    AssignTarget,
    Expr,
    Call,
    Member,
    OptChain,
    Arrow,
    Prop,
    PropName,
    Ident,
    BindingIdent,
    JSXElement,
    JSXFragment,
}

/// Identity of a node within one file: its kind plus its source range.
///
/// Wrapper nodes (a `ModuleItem` around a `Stmt` around a `Decl`) share a span
/// but never a kind, so the pair is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub kind: NodeKind,
    pub lo: u32,
    pub hi: u32,
}

impl<'a> Node<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Module(_) => NodeKind::Module,
            Node::ModuleItem(_) => NodeKind::ModuleItem,
            Node::ImportDecl(_) => NodeKind::ImportDecl,
            Node::ImportSpecifier(_) => NodeKind::ImportSpecifier,
            Node::ExportDecl(_) => NodeKind::ExportDecl,
            Node::NamedExport(_) => NodeKind::NamedExport,
            Node::ExportSpecifier { .. } => NodeKind::ExportSpecifier,
            Node::ExportDefaultDecl(_) => NodeKind::ExportDefaultDecl,
            Node::ExportDefaultExpr(_) => NodeKind::ExportDefaultExpr,
            Node::ExportAll(_) => NodeKind::ExportAll,
            Node::Stmt(_) => NodeKind::Stmt,
            Node::BlockStmt(_) => NodeKind::BlockStmt,
            Node::SwitchCase(_) => NodeKind::SwitchCase,
            Node::CatchClause(_) => NodeKind::CatchClause,
            Node::ForHead(_) => NodeKind::ForHead,
            Node::Decl(_) => NodeKind::Decl,
            Node::VarDecl(_) => NodeKind::VarDecl,
            Node::VarDeclarator(_) => NodeKind::VarDeclarator,
            Node::Function(_) => NodeKind::Function,
            Node::Param(_) => NodeKind::Param,
            Node::Class(_) => NodeKind::Class,
            Node::ClassMember(_) => NodeKind::ClassMember,
            Node::Pat(_) => NodeKind::Pat,
            Node::ObjectPatProp(_) => NodeKind::ObjectPatProp,
            Node::AssignTarget(_) => NodeKind::AssignTarget,
            Node::Expr(_) => NodeKind::Expr,
            Node::Call(_) => NodeKind::Call,
            Node::Member(_) => NodeKind::Member,
            Node::OptChain(_) => NodeKind::OptChain,
            Node::Arrow(_) => NodeKind::Arrow,
            Node::Prop(_) => NodeKind::Prop,
            Node::PropName(_) => NodeKind::PropName,
            Node::Ident(_) => NodeKind::Ident,
            Node::BindingIdent(_) => NodeKind::BindingIdent,
            Node::JSXElement(_) => NodeKind::JSXElement,
            Node::JSXFragment(_) => NodeKind::JSXFragment,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Module(n) => n.span,
            Node::ModuleItem(n) => n.span(),
            Node::ImportDecl(n) => n.span,
            Node::ImportSpecifier(n) => n.span(),
            Node::ExportDecl(n) => n.span,
            Node::NamedExport(n) => n.span,
            Node::ExportSpecifier { spec, .. } => spec.span(),
            Node::ExportDefaultDecl(n) => n.span,
            Node::ExportDefaultExpr(n) => n.span,
            Node::ExportAll(n) => n.span,
            Node::Stmt(n) => n.span(),
            Node::BlockStmt(n) => n.span,
            Node::SwitchCase(n) => n.span,
            Node::CatchClause(n) => n.span,
            Node::ForHead(n) => n.span(),
            Node::Decl(n) => n.span(),
            Node::VarDecl(n) => n.span,
            Node::VarDeclarator(n) => n.span,
            Node::Function(n) => n.span,
            Node::Param(n) => n.span,
            Node::Class(n) => n.span,
            Node::ClassMember(n) => n.span(),
            Node::Pat(n) => n.span(),
            Node::ObjectPatProp(n) => n.span(),
            Node::AssignTarget(n) => n.span(),
            Node::Expr(n) => n.span(),
            Node::Call(n) => n.span,
            Node::Member(n) => n.span,
            Node::OptChain(n) => n.span,
            Node::Arrow(n) => n.span,
            Node::Prop(n) => n.span(),
            Node::PropName(n) => n.span(),
            Node::Ident(n) | Node::BindingIdent(n) => n.span,
            Node::JSXElement(n) => n.span,
            Node::JSXFragment(n) => n.span,
        }
    }

    pub fn id(&self) -> NodeId {
        let span = self.span();
        NodeId {
            kind: self.kind(),
            lo: span.lo.0,
            hi: span.hi.0,
        }
    }

    /// Direct children in source order. This is the default traversal rule.
    ///
    /// Type-level syntax, labels, and non-computed property names are not
    /// children: they never bind or read runtime values.
    pub fn children(&self) -> Vec<Node<'a>> {
        let mut out = Vec::new();
        match *self {
            Node::Module(module) => out.extend(module.body.iter().map(Node::ModuleItem)),
            Node::ModuleItem(item) => match item {
                ModuleItem::Stmt(stmt) => out.push(Node::Stmt(stmt)),
                ModuleItem::ModuleDecl(decl) => match decl {
                    ModuleDecl::Import(import) => out.push(Node::ImportDecl(import)),
                    ModuleDecl::ExportDecl(export) => out.push(Node::ExportDecl(export)),
                    ModuleDecl::ExportNamed(export) => out.push(Node::NamedExport(export)),
                    ModuleDecl::ExportDefaultDecl(export) => out.push(Node::ExportDefaultDecl(export)),
                    ModuleDecl::ExportDefaultExpr(export) => out.push(Node::ExportDefaultExpr(export)),
                    ModuleDecl::ExportAll(export) => out.push(Node::ExportAll(export)),
                    ModuleDecl::TsImportEquals(_)
                    | ModuleDecl::TsExportAssignment(_)
                    | ModuleDecl::TsNamespaceExport(_) => {}
                },
            },
            Node::ImportDecl(import) => {
                if !import.type_only {
                    out.extend(import.specifiers.iter().map(Node::ImportSpecifier));
                }
            }
            Node::ImportSpecifier(spec) => out.push(Node::BindingIdent(import_local(spec))),
            Node::ExportDecl(export) => out.push(Node::Decl(&export.decl)),
            Node::NamedExport(export) => {
                let local = export.src.is_none();
                out.extend(
                    export
                        .specifiers
                        .iter()
                        .map(|spec| Node::ExportSpecifier { spec, local }),
                );
            }
            Node::ExportSpecifier { spec, local } => {
                if local
                    && let ExportSpecifier::Named(named) = spec
                    && let ModuleExportName::Ident(orig) = &named.orig
                {
                    out.push(Node::Ident(orig));
                }
            }
            Node::ExportDefaultDecl(export) => match &export.decl {
                DefaultDecl::Fn(f) => {
                    out.extend(f.ident.as_ref().map(Node::BindingIdent));
                    out.push(Node::Function(&f.function));
                }
                DefaultDecl::Class(c) => {
                    out.extend(c.ident.as_ref().map(Node::BindingIdent));
                    out.push(Node::Class(&c.class));
                }
                DefaultDecl::TsInterfaceDecl(_) => {}
            },
            Node::ExportDefaultExpr(export) => out.push(Node::Expr(&export.expr)),
            Node::ExportAll(_) => {}
            Node::Stmt(stmt) => stmt_children(stmt, &mut out),
            Node::BlockStmt(block) => out.extend(block.stmts.iter().map(Node::Stmt)),
            Node::SwitchCase(case) => {
                out.extend(case.test.as_deref().map(Node::Expr));
                out.extend(case.cons.iter().map(Node::Stmt));
            }
            Node::CatchClause(clause) => {
                out.extend(clause.param.as_ref().map(Node::Pat));
                out.push(Node::BlockStmt(&clause.body));
            }
            Node::ForHead(head) => match head {
                ForHead::VarDecl(var) => out.push(Node::VarDecl(var)),
                ForHead::Pat(pat) => out.push(Node::Pat(pat)),
                ForHead::UsingDecl(_) => {}
            },
            Node::Decl(decl) => match decl {
                Decl::Class(c) => {
                    out.push(Node::BindingIdent(&c.ident));
                    out.push(Node::Class(&c.class));
                }
                Decl::Fn(f) => {
                    out.push(Node::BindingIdent(&f.ident));
                    out.push(Node::Function(&f.function));
                }
                Decl::Var(var) => out.push(Node::VarDecl(var)),
                Decl::TsEnum(decl) => {
                    out.push(Node::BindingIdent(&decl.id));
                    out.extend(decl.members.iter().filter_map(|m| m.init.as_deref()).map(Node::Expr));
                }
                Decl::Using(_) | Decl::TsInterface(_) | Decl::TsTypeAlias(_) | Decl::TsModule(_) => {}
            },
            Node::VarDecl(var) => out.extend(var.decls.iter().map(Node::VarDeclarator)),
            Node::VarDeclarator(decl) => {
                out.push(Node::Pat(&decl.name));
                out.extend(decl.init.as_deref().map(Node::Expr));
            }
            Node::Function(function) => {
                out.extend(function.params.iter().map(Node::Param));
                out.extend(function.body.as_ref().map(Node::BlockStmt));
            }
            Node::Param(param) => out.push(Node::Pat(&param.pat)),
            Node::Class(class) => {
                out.extend(class.super_class.as_deref().map(Node::Expr));
                out.extend(class.body.iter().map(Node::ClassMember));
            }
            Node::ClassMember(member) => class_member_children(member, &mut out),
            Node::Pat(pat) => match pat {
                Pat::Ident(binding) => out.push(Node::BindingIdent(&binding.id)),
                Pat::Array(arr) => out.extend(arr.elems.iter().flatten().map(Node::Pat)),
                Pat::Rest(rest) => out.push(Node::Pat(&rest.arg)),
                Pat::Object(obj) => out.extend(obj.props.iter().map(Node::ObjectPatProp)),
                Pat::Assign(assign) => {
                    out.push(Node::Pat(&assign.left));
                    out.push(Node::Expr(&assign.right));
                }
                Pat::Expr(expr) => out.push(Node::Expr(expr)),
                Pat::Invalid(_) => {}
            },
            Node::ObjectPatProp(prop) => match prop {
                ObjectPatProp::KeyValue(kv) => {
                    out.push(Node::PropName(&kv.key));
                    out.push(Node::Pat(&kv.value));
                }
                ObjectPatProp::Assign(assign) => {
                    out.push(Node::BindingIdent(&assign.key.id));
                    out.extend(assign.value.as_deref().map(Node::Expr));
                }
                ObjectPatProp::Rest(rest) => out.push(Node::Pat(&rest.arg)),
            },
            Node::AssignTarget(target) => match target {
                AssignTarget::Simple(simple) => match simple {
                    SimpleAssignTarget::Ident(binding) => out.push(Node::Ident(&binding.id)),
                    SimpleAssignTarget::Member(member) => out.push(Node::Member(member)),
                    SimpleAssignTarget::Paren(paren) => out.push(Node::Expr(&paren.expr)),
                    SimpleAssignTarget::OptChain(chain) => out.push(Node::OptChain(chain)),
                    SimpleAssignTarget::TsAs(e) => out.push(Node::Expr(&e.expr)),
                    SimpleAssignTarget::TsSatisfies(e) => out.push(Node::Expr(&e.expr)),
                    SimpleAssignTarget::TsNonNull(e) => out.push(Node::Expr(&e.expr)),
                    SimpleAssignTarget::TsTypeAssertion(e) => out.push(Node::Expr(&e.expr)),
                    SimpleAssignTarget::TsInstantiation(e) => out.push(Node::Expr(&e.expr)),
                    SimpleAssignTarget::SuperProp(_) | SimpleAssignTarget::Invalid(_) => {}
                },
                AssignTarget::Pat(pat) => match pat {
                    AssignTargetPat::Array(arr) => out.extend(arr.elems.iter().flatten().map(Node::Pat)),
                    AssignTargetPat::Object(obj) => out.extend(obj.props.iter().map(Node::ObjectPatProp)),
                    AssignTargetPat::Invalid(_) => {}
                },
            },
            Node::Expr(expr) => expr_children(expr, &mut out),
            Node::Call(call) => {
                if let Callee::Expr(callee) = &call.callee {
                    out.push(Node::Expr(callee));
                }
                out.extend(call.args.iter().map(|arg| Node::Expr(&arg.expr)));
            }
            Node::Member(member) => {
                out.push(Node::Expr(&member.obj));
                if let MemberProp::Computed(computed) = &member.prop {
                    out.push(Node::Expr(&computed.expr));
                }
            }
            Node::OptChain(chain) => match &*chain.base {
                OptChainBase::Member(member) => out.push(Node::Member(member)),
                OptChainBase::Call(call) => {
                    out.push(Node::Expr(&call.callee));
                    out.extend(call.args.iter().map(|arg| Node::Expr(&arg.expr)));
                }
            },
            Node::Arrow(arrow) => {
                out.extend(arrow.params.iter().map(Node::Pat));
                match &*arrow.body {
                    BlockStmtOrExpr::BlockStmt(block) => out.push(Node::BlockStmt(block)),
                    BlockStmtOrExpr::Expr(expr) => out.push(Node::Expr(expr)),
                }
            }
            Node::Prop(prop) => match prop {
                Prop::Shorthand(ident) => out.push(Node::Ident(ident)),
                Prop::KeyValue(kv) => {
                    out.push(Node::PropName(&kv.key));
                    out.push(Node::Expr(&kv.value));
                }
                Prop::Assign(assign) => out.push(Node::Expr(&assign.value)),
                Prop::Getter(getter) => {
                    out.push(Node::PropName(&getter.key));
                    out.extend(getter.body.as_ref().map(Node::BlockStmt));
                }
                Prop::Setter(setter) => {
                    out.push(Node::PropName(&setter.key));
                    out.push(Node::Pat(&setter.param));
                    out.extend(setter.body.as_ref().map(Node::BlockStmt));
                }
                Prop::Method(method) => {
                    out.push(Node::PropName(&method.key));
                    out.push(Node::Function(&method.function));
                }
            },
            Node::PropName(name) => {
                if let PropName::Computed(computed) = name {
                    out.push(Node::Expr(&computed.expr));
                }
            }
            Node::Ident(_) | Node::BindingIdent(_) => {}
            Node::JSXElement(element) => {
                if let Some(ident) = jsx_name_root(&element.opening.name) {
                    out.push(Node::Ident(ident));
                }
                for attr in &element.opening.attrs {
                    match attr {
                        JSXAttrOrSpread::JSXAttr(attr) => match &attr.value {
                            Some(JSXAttrValue::JSXExprContainer(container)) => {
                                if let JSXExpr::Expr(expr) = &container.expr {
                                    out.push(Node::Expr(expr));
                                }
                            }
                            Some(JSXAttrValue::JSXElement(element)) => out.push(Node::JSXElement(element)),
                            Some(JSXAttrValue::JSXFragment(fragment)) => out.push(Node::JSXFragment(fragment)),
                            Some(JSXAttrValue::Str(_)) | None => {}
                        },
                        JSXAttrOrSpread::SpreadElement(spread) => out.push(Node::Expr(&spread.expr)),
                    }
                }
                jsx_children(&element.children, &mut out);
            }
            Node::JSXFragment(fragment) => jsx_children(&fragment.children, &mut out),
        }
        out
    }
}

/// The local binding an import specifier introduces.
pub fn import_local(spec: &ImportSpecifier) -> &Ident {
    match spec {
        ImportSpecifier::Named(named) => &named.local,
        ImportSpecifier::Default(default) => &default.local,
        ImportSpecifier::Namespace(ns) => &ns.local,
    }
}

fn stmt_children<'a>(stmt: &'a Stmt, out: &mut Vec<Node<'a>>) {
    match stmt {
        Stmt::Block(block) => out.push(Node::BlockStmt(block)),
        Stmt::Empty(_) | Stmt::Debugger(_) | Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::With(with) => {
            out.push(Node::Expr(&with.obj));
            out.push(Node::Stmt(&with.body));
        }
        Stmt::Return(ret) => out.extend(ret.arg.as_deref().map(Node::Expr)),
        Stmt::Labeled(labeled) => out.push(Node::Stmt(&labeled.body)),
        Stmt::If(if_stmt) => {
            out.push(Node::Expr(&if_stmt.test));
            out.push(Node::Stmt(&if_stmt.cons));
            out.extend(if_stmt.alt.as_deref().map(Node::Stmt));
        }
        Stmt::Switch(switch) => {
            out.push(Node::Expr(&switch.discriminant));
            out.extend(switch.cases.iter().map(Node::SwitchCase));
        }
        Stmt::Throw(throw) => out.push(Node::Expr(&throw.arg)),
        Stmt::Try(try_stmt) => {
            out.push(Node::BlockStmt(&try_stmt.block));
            out.extend(try_stmt.handler.as_ref().map(Node::CatchClause));
            out.extend(try_stmt.finalizer.as_ref().map(Node::BlockStmt));
        }
        Stmt::While(while_stmt) => {
            out.push(Node::Expr(&while_stmt.test));
            out.push(Node::Stmt(&while_stmt.body));
        }
        Stmt::DoWhile(do_while) => {
            out.push(Node::Stmt(&do_while.body));
            out.push(Node::Expr(&do_while.test));
        }
        Stmt::For(for_stmt) => {
            match &for_stmt.init {
                Some(VarDeclOrExpr::VarDecl(var)) => out.push(Node::VarDecl(var)),
                Some(VarDeclOrExpr::Expr(expr)) => out.push(Node::Expr(expr)),
                None => {}
            }
            out.extend(for_stmt.test.as_deref().map(Node::Expr));
            out.extend(for_stmt.update.as_deref().map(Node::Expr));
            out.push(Node::Stmt(&for_stmt.body));
        }
        Stmt::ForIn(for_in) => {
            out.push(Node::ForHead(&for_in.left));
            out.push(Node::Expr(&for_in.right));
            out.push(Node::Stmt(&for_in.body));
        }
        Stmt::ForOf(for_of) => {
            out.push(Node::ForHead(&for_of.left));
            out.push(Node::Expr(&for_of.right));
            out.push(Node::Stmt(&for_of.body));
        }
        Stmt::Decl(decl) => out.push(Node::Decl(decl)),
        Stmt::Expr(expr) => out.push(Node::Expr(&expr.expr)),
    }
}

fn class_member_children<'a>(member: &'a ClassMember, out: &mut Vec<Node<'a>>) {
    match member {
        ClassMember::Constructor(ctor) => {
            out.push(Node::PropName(&ctor.key));
            for param in &ctor.params {
                match param {
                    ParamOrTsParamProp::Param(param) => out.push(Node::Param(param)),
                    ParamOrTsParamProp::TsParamProp(prop) => match &prop.param {
                        TsParamPropParam::Ident(binding) => out.push(Node::BindingIdent(&binding.id)),
                        TsParamPropParam::Assign(assign) => {
                            out.push(Node::Pat(&assign.left));
                            out.push(Node::Expr(&assign.right));
                        }
                    },
                }
            }
            out.extend(ctor.body.as_ref().map(Node::BlockStmt));
        }
        ClassMember::Method(method) => {
            out.push(Node::PropName(&method.key));
            out.push(Node::Function(&method.function));
        }
        ClassMember::PrivateMethod(method) => out.push(Node::Function(&method.function)),
        ClassMember::ClassProp(prop) => {
            out.push(Node::PropName(&prop.key));
            out.extend(prop.value.as_deref().map(Node::Expr));
        }
        ClassMember::PrivateProp(prop) => out.extend(prop.value.as_deref().map(Node::Expr)),
        ClassMember::StaticBlock(block) => out.push(Node::BlockStmt(&block.body)),
        ClassMember::AutoAccessor(accessor) => out.extend(accessor.value.as_deref().map(Node::Expr)),
        ClassMember::TsIndexSignature(_) | ClassMember::Empty(_) => {}
    }
}

fn expr_children<'a>(expr: &'a Expr, out: &mut Vec<Node<'a>>) {
    match expr {
        Expr::Ident(ident) => out.push(Node::Ident(ident)),
        Expr::This(_)
        | Expr::Lit(_)
        | Expr::MetaProp(_)
        | Expr::PrivateName(_)
        | Expr::JSXEmpty(_)
        | Expr::JSXNamespacedName(_)
        | Expr::Invalid(_) => {}
        Expr::Array(arr) => out.extend(arr.elems.iter().flatten().map(|elem| Node::Expr(&elem.expr))),
        Expr::Object(obj) => {
            for prop in &obj.props {
                match prop {
                    PropOrSpread::Prop(prop) => out.push(Node::Prop(prop)),
                    PropOrSpread::Spread(spread) => out.push(Node::Expr(&spread.expr)),
                }
            }
        }
        Expr::Fn(f) => {
            out.extend(f.ident.as_ref().map(Node::BindingIdent));
            out.push(Node::Function(&f.function));
        }
        Expr::Class(c) => {
            out.extend(c.ident.as_ref().map(Node::BindingIdent));
            out.push(Node::Class(&c.class));
        }
        Expr::Unary(unary) => out.push(Node::Expr(&unary.arg)),
        Expr::Update(update) => out.push(Node::Expr(&update.arg)),
        Expr::Bin(bin) => {
            out.push(Node::Expr(&bin.left));
            out.push(Node::Expr(&bin.right));
        }
        Expr::Assign(assign) => {
            out.push(Node::AssignTarget(&assign.left));
            out.push(Node::Expr(&assign.right));
        }
        Expr::Member(member) => out.push(Node::Member(member)),
        Expr::SuperProp(sup) => {
            if let SuperProp::Computed(computed) = &sup.prop {
                out.push(Node::Expr(&computed.expr));
            }
        }
        Expr::Cond(cond) => {
            out.push(Node::Expr(&cond.test));
            out.push(Node::Expr(&cond.cons));
            out.push(Node::Expr(&cond.alt));
        }
        Expr::Call(call) => out.push(Node::Call(call)),
        Expr::New(new) => {
            out.push(Node::Expr(&new.callee));
            out.extend(new.args.iter().flatten().map(|arg| Node::Expr(&arg.expr)));
        }
        Expr::Seq(seq) => out.extend(seq.exprs.iter().map(|e| Node::Expr(e))),
        Expr::Tpl(tpl) => out.extend(tpl.exprs.iter().map(|e| Node::Expr(e))),
        Expr::TaggedTpl(tagged) => {
            out.push(Node::Expr(&tagged.tag));
            out.extend(tagged.tpl.exprs.iter().map(|e| Node::Expr(e)));
        }
        Expr::Arrow(arrow) => out.push(Node::Arrow(arrow)),
        Expr::Yield(y) => out.extend(y.arg.as_deref().map(Node::Expr)),
        Expr::Await(a) => out.push(Node::Expr(&a.arg)),
        Expr::Paren(paren) => out.push(Node::Expr(&paren.expr)),
        Expr::JSXMember(member) => out.extend(jsx_object_root(&member.obj).map(Node::Ident)),
        Expr::JSXElement(element) => out.push(Node::JSXElement(element)),
        Expr::JSXFragment(fragment) => out.push(Node::JSXFragment(fragment)),
        Expr::TsTypeAssertion(e) => out.push(Node::Expr(&e.expr)),
        Expr::TsConstAssertion(e) => out.push(Node::Expr(&e.expr)),
        Expr::TsNonNull(e) => out.push(Node::Expr(&e.expr)),
        Expr::TsAs(e) => out.push(Node::Expr(&e.expr)),
        Expr::TsInstantiation(e) => out.push(Node::Expr(&e.expr)),
        Expr::TsSatisfies(e) => out.push(Node::Expr(&e.expr)),
        Expr::OptChain(chain) => out.push(Node::OptChain(chain)),
    }
}

fn jsx_children<'a>(children: &'a [JSXElementChild], out: &mut Vec<Node<'a>>) {
    for child in children {
        match child {
            JSXElementChild::JSXExprContainer(container) => {
                if let JSXExpr::Expr(expr) = &container.expr {
                    out.push(Node::Expr(expr));
                }
            }
            JSXElementChild::JSXSpreadChild(spread) => out.push(Node::Expr(&spread.expr)),
            JSXElementChild::JSXElement(element) => out.push(Node::JSXElement(element)),
            JSXElementChild::JSXFragment(fragment) => out.push(Node::JSXFragment(fragment)),
            JSXElementChild::JSXText(_) => {}
        }
    }
}

fn jsx_name_root(name: &JSXElementName) -> Option<&Ident> {
    match name {
        JSXElementName::Ident(ident) => Some(ident),
        JSXElementName::JSXMemberExpr(member) => jsx_object_root(&member.obj),
        JSXElementName::JSXNamespacedName(_) => None,
    }
}

fn jsx_object_root(obj: &JSXObject) -> Option<&Ident> {
    match obj {
        JSXObject::Ident(ident) => Some(ident),
        JSXObject::JSXMemberExpr(member) => jsx_object_root(&member.obj),
    }
}
