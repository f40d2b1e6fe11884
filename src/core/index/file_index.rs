use std::collections::{HashMap, HashSet};

use swc_ecma_ast::*;

use super::exports::ExportTable;
use super::refs::{ReferenceMap, ScopedReference};
use crate::core::derived::DerivedExtractorBinding;
use crate::core::parsers::ParsedFile;
use crate::core::walk::{Descend, Node, NodeId, NodeKind, Overrides, Walker, collect_nodes, import_local};
use crate::extractors::{ExtractorId, ExtractorRegistry};

/// What an import specifier pulls from its source module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imported {
    Named(String),
    Default,
    Namespace,
}

#[derive(Debug, Clone)]
pub struct ImportBinding<'a> {
    pub decl: &'a ImportDecl,
    pub spec: &'a ImportSpecifier,
    pub local: &'a Ident,
    pub source: &'a str,
    pub imported: Imported,
}

/// What a recognized style call invokes.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget<'a> {
    /// A style-library import, called directly.
    Intrinsic(ExtractorId),
    /// A local binding to a derived extractor; `local` is the callee.
    Derived { local: &'a Ident, extractor: ExtractorId },
}

#[derive(Debug, Clone)]
pub struct StyleCall<'a> {
    pub call: &'a CallExpr,
    pub target: CallTarget<'a>,
    /// The style-bearing arguments. Never empty.
    pub args: &'a [ExprOrSpread],
}

impl StyleCall<'_> {
    pub fn extractor(&self) -> &ExtractorId {
        match &self.target {
            CallTarget::Intrinsic(id) => id,
            CallTarget::Derived { extractor, .. } => extractor,
        }
    }
}

/// Which construct declares a used binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    ImportSpecifier,
    /// `const name = ...`
    VarDeclarator,
    /// A leaf of a destructuring pattern.
    DestructuringLeaf,
    /// Function, class, enum, or anything nested below the top level.
    Other,
}

#[derive(Debug, Clone, Copy)]
pub struct UsedBinding<'a> {
    pub ident: &'a Ident,
    pub item: &'a ModuleItem,
    pub kind: BindingKind,
    pub declarator: Option<&'a VarDeclarator>,
}

/// Per-file analysis state.
///
/// Built once by [`FileIndex::build`]. Afterwards only `used`,
/// `used_bindings`, `derived`, and `style_calls` change, and only by growing.
pub struct FileIndex<'a> {
    pub file: &'a ParsedFile,
    pub parents: HashMap<NodeId, Node<'a>>,
    /// Local bindings of style-library imports.
    pub intrinsics: ReferenceMap<ExtractorId>,
    pub imports: Vec<ImportBinding<'a>>,
    pub exports: ExportTable<'a>,
    pub style_calls: Vec<StyleCall<'a>>,
    /// Declaration site of every scoped binding.
    pub declarations: ReferenceMap<&'a Ident>,
    /// Identifier occurrences that read or write an existing binding.
    pub uses: HashMap<NodeId, &'a Ident>,
    pub used: HashSet<NodeId>,
    /// Keyed by the declaring identifier's `BindingIdent` node.
    pub used_bindings: HashMap<NodeId, UsedBinding<'a>>,
    pub derived: ReferenceMap<DerivedExtractorBinding<'a>>,
}

impl<'a> FileIndex<'a> {
    pub fn build(file: &'a ParsedFile, registry: &ExtractorRegistry) -> Self {
        let root = Node::Module(&file.module);

        let overrides = Overrides::new()
            .catch_all(record_parent)
            .on(NodeKind::ImportDecl, tag_import);
        let mut walker = Walker::new(
            ImportPass {
                file,
                registry,
                parents: HashMap::new(),
                intrinsics: ReferenceMap::new(),
                imports: Vec::new(),
            },
            overrides,
        );
        walker.walk(root, None);
        let ImportPass {
            parents,
            intrinsics,
            imports,
            ..
        } = walker.into_state();

        let derived = ReferenceMap::new();
        let style_calls = scan_style_calls(file, registry, &intrinsics, &derived);

        let overrides = Overrides::new()
            .on(NodeKind::AssignTarget, enter_write)
            .on(NodeKind::ForHead, enter_write)
            .on(NodeKind::Expr, enter_declare)
            .on(NodeKind::Ident, record_use)
            .on(NodeKind::BindingIdent, record_binding);
        let mut walker = Walker::new(
            RolePass {
                file,
                declarations: ReferenceMap::new(),
                uses: HashMap::new(),
            },
            overrides,
        );
        walker.walk(root, Role::Declare);
        let RolePass {
            declarations, uses, ..
        } = walker.into_state();

        tracing::trace!(
            file = %file.path,
            calls = style_calls.len(),
            declarations = declarations.len(),
            uses = uses.len(),
            "indexed file"
        );

        Self {
            file,
            parents,
            intrinsics,
            imports,
            exports: ExportTable::build(&file.module),
            style_calls,
            declarations,
            uses,
            used: HashSet::new(),
            used_bindings: HashMap::new(),
            derived,
        }
    }

    pub fn path(&self) -> &str {
        &self.file.path
    }

    /// Re-run call-site recognition, picking up derived bindings.
    pub fn rescan_calls(&mut self, registry: &ExtractorRegistry) {
        self.style_calls = scan_style_calls(self.file, registry, &self.intrinsics, &self.derived);
    }

    pub fn reference(&self, ident: &Ident) -> Option<ScopedReference> {
        ScopedReference::of(self.file, ident)
    }

    /// The identifier that declares the binding `ident` refers to.
    pub fn declaration_of(&self, ident: &Ident) -> Option<&'a Ident> {
        self.declarations.lookup(self.reference(ident).as_ref()).copied()
    }

    pub fn parent(&self, node: Node<'a>) -> Option<Node<'a>> {
        self.parents.get(&node.id()).copied()
    }

    /// `node` followed by each ancestor up to and including its top-level
    /// module item.
    pub fn path_to_item(&self, node: Node<'a>) -> Vec<Node<'a>> {
        let mut path = vec![node];
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            if matches!(parent, Node::Module(_)) {
                return path;
            }
            path.push(parent);
            current = parent;
        }
        // Reached the root without passing through Module: not inside an item.
        Vec::new()
    }

    pub fn top_level_item(&self, node: Node<'a>) -> Option<&'a ModuleItem> {
        match self.path_to_item(node).last() {
            Some(Node::ModuleItem(item)) => Some(item),
            _ => None,
        }
    }

    /// Describe how the declaring identifier `ident` is bound.
    pub fn classify(&self, ident: &'a Ident) -> Option<UsedBinding<'a>> {
        let path = self.path_to_item(Node::BindingIdent(ident));
        let Some(Node::ModuleItem(item)) = path.last().copied() else {
            return None;
        };

        let mut kind = BindingKind::Other;
        let mut declarator = None;
        for (i, node) in path.iter().enumerate() {
            match node {
                Node::ImportSpecifier(_) => {
                    kind = BindingKind::ImportSpecifier;
                    break;
                }
                Node::VarDeclarator(decl) => {
                    // Only bindings in the declarator's own pattern count.
                    let in_pattern = i > 0 && path[i - 1].id() == Node::Pat(&decl.name).id();
                    if in_pattern && is_top_level_var(&path[i + 1..]) {
                        kind = match &decl.name {
                            Pat::Ident(_) => BindingKind::VarDeclarator,
                            _ => BindingKind::DestructuringLeaf,
                        };
                        declarator = Some(*decl);
                    }
                    break;
                }
                Node::Function(_) | Node::Arrow(_) | Node::Class(_) | Node::BlockStmt(_) => break,
                _ => {}
            }
        }

        Some(UsedBinding {
            ident,
            item,
            kind,
            declarator,
        })
    }

    /// Identifiers read (or written) inside `root`, in source order.
    pub fn reads_in(&self, root: Node<'a>) -> Vec<&'a Ident> {
        collect_nodes(root)
            .into_iter()
            .filter_map(|node| self.uses.get(&node.id()).copied())
            .collect()
    }

    /// Mark every node below `root` as used. Returns false when `root` was
    /// already marked, in which case nothing changes.
    pub fn mark_subtree(&mut self, root: Node<'a>) -> bool {
        if self.used.contains(&root.id()) {
            return false;
        }
        self.used.extend(collect_nodes(root).iter().map(Node::id));
        true
    }

    /// Mark `node` and each ancestor up to its module item.
    pub fn mark_path(&mut self, node: Node<'a>) {
        let path = self.path_to_item(node);
        self.used.extend(path.iter().map(Node::id));
    }

    pub fn is_used(&self, node: Node<'a>) -> bool {
        self.used.contains(&node.id())
    }

    pub fn is_binding_used(&self, ident: &'a Ident) -> bool {
        self.used_bindings.contains_key(&Node::BindingIdent(ident).id())
    }

    /// Derived bindings declared by destructuring `declarator`.
    pub fn derived_in(&self, declarator: &VarDeclarator) -> Vec<&DerivedExtractorBinding<'a>> {
        let target = Node::VarDeclarator(declarator).id();
        let mut bindings: Vec<_> = self
            .derived
            .iter()
            .filter(|(_, binding)| binding.declarator().map(|d| Node::VarDeclarator(d).id()) == Some(target))
            .map(|(_, binding)| binding)
            .collect();
        bindings.sort_by_key(|binding| binding.local.span.lo);
        bindings
    }

    /// Style-bearing argument expressions of every recognized call.
    pub fn style_expressions(&self) -> Vec<&'a Expr> {
        self.style_calls
            .iter()
            .flat_map(|call| call.args.iter().map(|arg| &*arg.expr))
            .collect()
    }

    /// Style-bearing arguments grouped by extractor.
    pub fn calls_by_extractor(&self) -> std::collections::BTreeMap<ExtractorId, Vec<&'a Expr>> {
        let mut map: std::collections::BTreeMap<ExtractorId, Vec<&'a Expr>> = Default::default();
        for call in &self.style_calls {
            map.entry(call.extractor().clone())
                .or_default()
                .extend(call.args.iter().map(|arg| &*arg.expr));
        }
        map
    }
}

fn is_top_level_var(rest: &[Node<'_>]) -> bool {
    rest.iter().all(|node| {
        matches!(
            node,
            Node::VarDecl(_) | Node::Decl(_) | Node::Stmt(_) | Node::ExportDecl(_) | Node::ModuleItem(_)
        )
    })
}

/// Strip parentheses and TS-only wrappers.
pub fn unwrap_expr(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(p) => unwrap_expr(&p.expr),
        Expr::TsAs(e) => unwrap_expr(&e.expr),
        Expr::TsSatisfies(e) => unwrap_expr(&e.expr),
        Expr::TsNonNull(e) => unwrap_expr(&e.expr),
        Expr::TsConstAssertion(e) => unwrap_expr(&e.expr),
        Expr::TsTypeAssertion(e) => unwrap_expr(&e.expr),
        Expr::TsInstantiation(e) => unwrap_expr(&e.expr),
        _ => expr,
    }
}

/// The identifier a call invokes, for `f(...)` shaped calls.
pub fn callee_ident(call: &CallExpr) -> Option<&Ident> {
    match &call.callee {
        Callee::Expr(expr) => match unwrap_expr(expr) {
            Expr::Ident(ident) => Some(ident),
            _ => None,
        },
        _ => None,
    }
}

// ============================================================
// Pass 1: parents and style-library imports
// ============================================================

struct ImportPass<'a, 'r> {
    file: &'a ParsedFile,
    registry: &'r ExtractorRegistry,
    parents: HashMap<NodeId, Node<'a>>,
    intrinsics: ReferenceMap<ExtractorId>,
    imports: Vec<ImportBinding<'a>>,
}

fn record_parent<'a, 'r>(
    walker: &mut Walker<'a, ImportPass<'a, 'r>, Option<Node<'a>>>,
    node: Node<'a>,
    parent: Option<Node<'a>>,
    descend: Descend<'a>,
) {
    if let Some(parent) = parent {
        walker.state.parents.insert(node.id(), parent);
    }
    walker.descend(descend, Some(node));
}

fn tag_import<'a, 'r>(
    walker: &mut Walker<'a, ImportPass<'a, 'r>, Option<Node<'a>>>,
    node: Node<'a>,
    ctx: Option<Node<'a>>,
    descend: Descend<'a>,
) {
    if let Node::ImportDecl(decl) = node
        && !decl.type_only
        && let Some(source) = decl.src.value.as_str()
    {
        let state = &mut walker.state;
        let library = state.registry.is_library(source);
        for spec in &decl.specifiers {
            let imported = match spec {
                ImportSpecifier::Named(named) => {
                    if named.is_type_only {
                        continue;
                    }
                    let name = match &named.imported {
                        Some(ModuleExportName::Ident(ident)) => ident.sym.as_str(),
                        Some(ModuleExportName::Str(s)) => s.value.as_str().unwrap_or_default(),
                        None => named.local.sym.as_str(),
                    };
                    if name == "default" {
                        Imported::Default
                    } else {
                        Imported::Named(name.to_string())
                    }
                }
                ImportSpecifier::Default(_) => Imported::Default,
                ImportSpecifier::Namespace(_) => Imported::Namespace,
            };
            let local = import_local(spec);

            if library {
                let symbol = match &imported {
                    Imported::Named(name) => Some(name.as_str()),
                    Imported::Default => Some("default"),
                    Imported::Namespace => None,
                };
                if let Some(extractor) = symbol.and_then(|s| state.registry.lookup(source, s))
                    && let Some(reference) = ScopedReference::of(state.file, local)
                {
                    state.intrinsics.insert(&reference, extractor.id().clone());
                }
            }

            state.imports.push(ImportBinding {
                decl,
                spec,
                local,
                source,
                imported,
            });
        }
    }
    walker.descend(descend, ctx);
}

// ============================================================
// Pass 2: style call sites
// ============================================================

struct CallPass<'a, 'r> {
    file: &'a ParsedFile,
    registry: &'r ExtractorRegistry,
    intrinsics: &'r ReferenceMap<ExtractorId>,
    derived: &'r ReferenceMap<DerivedExtractorBinding<'a>>,
    calls: Vec<StyleCall<'a>>,
}

fn scan_style_calls<'a>(
    file: &'a ParsedFile,
    registry: &ExtractorRegistry,
    intrinsics: &ReferenceMap<ExtractorId>,
    derived: &ReferenceMap<DerivedExtractorBinding<'a>>,
) -> Vec<StyleCall<'a>> {
    let mut walker = Walker::new(
        CallPass {
            file,
            registry,
            intrinsics,
            derived,
            calls: Vec::new(),
        },
        Overrides::new().on(NodeKind::Call, find_style_call),
    );
    walker.walk(Node::Module(&file.module), ());
    walker.into_state().calls
}

fn find_style_call<'a, 'r>(walker: &mut Walker<'a, CallPass<'a, 'r>, ()>, node: Node<'a>, ctx: (), descend: Descend<'a>) {
    if let Node::Call(call) = node
        && let Some(callee) = callee_ident(call)
    {
        let state = &mut walker.state;
        let reference = ScopedReference::of(state.file, callee);
        let target = if let Some(id) = state.intrinsics.lookup(reference.as_ref()) {
            Some(CallTarget::Intrinsic(id.clone()))
        } else {
            state
                .derived
                .lookup(reference.as_ref())
                .map(|binding| CallTarget::Derived {
                    local: callee,
                    extractor: binding.extractor.clone(),
                })
        };

        if let Some(target) = target {
            let id = match &target {
                CallTarget::Intrinsic(id) => id,
                CallTarget::Derived { extractor, .. } => extractor,
            };
            if let Some(extractor) = state.registry.find(id) {
                let args = extractor.style_args(&call.args);
                if !args.is_empty() {
                    state.calls.push(StyleCall { call, target, args });
                }
            }
        }
    }
    walker.descend(descend, ctx);
}

// ============================================================
// Pass 3: declarations and uses
// ============================================================

/// Whether a `BindingIdent` below this point declares or assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Declare,
    Write,
}

struct RolePass<'a> {
    file: &'a ParsedFile,
    declarations: ReferenceMap<&'a Ident>,
    uses: HashMap<NodeId, &'a Ident>,
}

fn enter_write<'a>(walker: &mut Walker<'a, RolePass<'a>, Role>, node: Node<'a>, ctx: Role, descend: Descend<'a>) {
    let role = match node {
        Node::AssignTarget(_) | Node::ForHead(ForHead::Pat(_)) => Role::Write,
        _ => ctx,
    };
    walker.descend(descend, role);
}

fn enter_declare<'a>(walker: &mut Walker<'a, RolePass<'a>, Role>, _: Node<'a>, _: Role, descend: Descend<'a>) {
    walker.descend(descend, Role::Declare);
}

fn record_use<'a>(walker: &mut Walker<'a, RolePass<'a>, Role>, node: Node<'a>, _: Role, _: Descend<'a>) {
    if let Node::Ident(ident) = node {
        walker.state.uses.insert(node.id(), ident);
    }
}

fn record_binding<'a>(walker: &mut Walker<'a, RolePass<'a>, Role>, node: Node<'a>, role: Role, _: Descend<'a>) {
    let Node::BindingIdent(ident) = node else {
        return;
    };
    match role {
        Role::Write => {
            walker.state.uses.insert(node.id(), ident);
        }
        Role::Declare => {
            if let Some(reference) = ScopedReference::of(walker.state.file, ident) {
                walker.state.declarations.insert(&reference, ident);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::parsers::parse_standalone;

    fn registry() -> ExtractorRegistry {
        ExtractorRegistry::from_config(&Config::default())
    }

    #[test]
    fn test_intrinsic_calls_and_style_args() {
        let parsed = parse_standalone(
            r#"
            import { css, styled as s } from "@styleslice/core";
            const a = css({ color: "red" }, { margin: 0 });
            const B = s("div", { padding: 1 });
            const C = s("span");
            css;
            "#,
            "/a.tsx",
        )
        .unwrap();
        let index = FileIndex::build(&parsed, &registry());

        assert_eq!(index.intrinsics.len(), 2);
        assert_eq!(index.style_calls.len(), 2);
        assert_eq!(index.style_calls[0].args.len(), 2);
        assert_eq!(index.style_calls[1].args.len(), 1);
        assert_eq!(index.style_calls[1].extractor().to_string(), "@styleslice/core:styled");
        assert_eq!(index.style_expressions().len(), 3);
        assert_eq!(index.calls_by_extractor().len(), 2);
    }

    #[test]
    fn test_shadowed_intrinsic_is_not_a_style_call() {
        let parsed = parse_standalone(
            r#"
            import { css } from "@styleslice/core";
            function f(css) { return css({ color: "red" }); }
            "#,
            "/a.ts",
        )
        .unwrap();
        let index = FileIndex::build(&parsed, &registry());
        assert!(index.style_calls.is_empty());
    }

    #[test]
    fn test_non_library_imports_are_not_intrinsics() {
        let parsed = parse_standalone(
            r#"import { css } from "./local"; css({ a: 1 });"#,
            "/a.ts",
        )
        .unwrap();
        let index = FileIndex::build(&parsed, &registry());
        assert!(index.intrinsics.is_empty());
        assert!(index.style_calls.is_empty());
        assert_eq!(index.imports.len(), 1);
        assert_eq!(index.imports[0].imported, Imported::Named("css".to_string()));
    }

    #[test]
    fn test_declarations_and_uses_are_separated() {
        let parsed = parse_standalone(
            r#"
            const { a, b: [c] } = obj;
            let d;
            d = a + c;
            [d] = [1];
            "#,
            "/a.ts",
        )
        .unwrap();
        let index = FileIndex::build(&parsed, &registry());

        let mut declared: Vec<String> = index.declarations.iter().map(|(r, _)| r.name).collect();
        declared.sort();
        assert_eq!(declared, vec!["a", "c", "d"]);

        let mut used: Vec<String> = index.uses.values().map(|i| i.sym.to_string()).collect();
        used.sort();
        assert_eq!(used, vec!["a", "c", "d", "d", "obj"]);
    }

    #[test]
    fn test_parents_and_classification() {
        let parsed = parse_standalone(
            r#"
            import { x } from "./x";
            export const { a, b: [c] } = obj, plain = 1;
            function f(p) { return p; }
            "#,
            "/a.ts",
        )
        .unwrap();
        let index = FileIndex::build(&parsed, &registry());

        let binding = |name: &str| {
            let (_, ident) = index
                .declarations
                .iter()
                .find(|(r, _)| r.name == name)
                .unwrap();
            index.classify(ident).unwrap()
        };

        assert_eq!(binding("x").kind, BindingKind::ImportSpecifier);
        assert_eq!(binding("a").kind, BindingKind::DestructuringLeaf);
        assert_eq!(binding("c").kind, BindingKind::DestructuringLeaf);
        assert_eq!(binding("plain").kind, BindingKind::VarDeclarator);
        assert!(binding("plain").declarator.is_some());
        assert_eq!(binding("f").kind, BindingKind::Other);
        assert_eq!(binding("p").kind, BindingKind::Other);
        assert!(std::ptr::eq(binding("p").item, &parsed.module.body[2]));
    }

    #[test]
    fn test_mark_subtree_is_idempotent() {
        let parsed = parse_standalone("const a = { b: c };", "/a.ts").unwrap();
        let mut index = FileIndex::build(&parsed, &registry());
        let item = Node::ModuleItem(&parsed.module.body[0]);

        assert!(index.mark_subtree(item));
        let first = index.used.clone();
        assert!(!index.mark_subtree(item));
        assert_eq!(index.used, first);
    }
}
