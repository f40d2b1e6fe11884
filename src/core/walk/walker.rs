use std::collections::HashMap;

use super::node::{Node, NodeKind};

/// An override: receives the walker (for its state), the node, the context
/// for this node, and the `descend` token. Not calling [`Walker::descend`]
/// stops traversal of the node's subtree.
pub type Handler<'a, S, C> = fn(&mut Walker<'a, S, C>, Node<'a>, C, Descend<'a>);

/// Token handed to an override; pass it back to [`Walker::descend`] to run the
/// next stage for the same node.
#[derive(Debug, Clone, Copy)]
pub struct Descend<'a> {
    node: Node<'a>,
    stage: Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Catch-all has run; next is the kind-specific override or the default.
    Kind,
    /// Kind override has run; next is the default rule (walk children).
    Children,
}

/// Partial table of per-kind overrides plus an optional catch-all.
pub struct Overrides<'a, S, C> {
    catch_all: Option<Handler<'a, S, C>>,
    by_kind: HashMap<NodeKind, Handler<'a, S, C>>,
}

impl<'a, S, C> Default for Overrides<'a, S, C> {
    fn default() -> Self {
        Self {
            catch_all: None,
            by_kind: HashMap::new(),
        }
    }
}

impl<'a, S, C> Overrides<'a, S, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catch_all(mut self, handler: Handler<'a, S, C>) -> Self {
        self.catch_all = Some(handler);
        self
    }

    pub fn on(mut self, kind: NodeKind, handler: Handler<'a, S, C>) -> Self {
        self.by_kind.insert(kind, handler);
        self
    }
}

/// Overridable depth-first walker.
///
/// Mutable bookkeeping lives in `state`; the per-node context `C` flows down by
/// value, so sibling subtrees never observe each other's context.
pub struct Walker<'a, S, C> {
    pub state: S,
    overrides: Overrides<'a, S, C>,
}

impl<'a, S, C: Clone> Walker<'a, S, C> {
    pub fn new(state: S, overrides: Overrides<'a, S, C>) -> Self {
        Self { state, overrides }
    }

    /// Visit `node`. The catch-all fires first; the kind override (or the
    /// default rule) only runs if the catch-all descends.
    pub fn walk(&mut self, node: Node<'a>, ctx: C) {
        match self.overrides.catch_all {
            Some(handler) => handler(
                self,
                node,
                ctx,
                Descend {
                    node,
                    stage: Stage::Kind,
                },
            ),
            None => self.run_kind(node, ctx),
        }
    }

    /// Continue with the next stage for the node `descend` was issued for.
    pub fn descend(&mut self, descend: Descend<'a>, ctx: C) {
        match descend.stage {
            Stage::Kind => self.run_kind(descend.node, ctx),
            Stage::Children => self.walk_children(descend.node, ctx),
        }
    }

    pub fn into_state(self) -> S {
        self.state
    }

    fn run_kind(&mut self, node: Node<'a>, ctx: C) {
        match self.overrides.by_kind.get(&node.kind()).copied() {
            Some(handler) => handler(
                self,
                node,
                ctx,
                Descend {
                    node,
                    stage: Stage::Children,
                },
            ),
            None => self.walk_children(node, ctx),
        }
    }

    fn walk_children(&mut self, node: Node<'a>, ctx: C) {
        for child in node.children() {
            self.walk(child, ctx.clone());
        }
    }
}

/// Walk `root` with no overrides, collecting every node in pre-order.
pub fn collect_nodes(root: Node<'_>) -> Vec<Node<'_>> {
    fn record<'a>(walker: &mut Walker<'a, Vec<Node<'a>>, ()>, node: Node<'a>, ctx: (), descend: Descend<'a>) {
        walker.state.push(node);
        walker.descend(descend, ctx);
    }

    let mut walker = Walker::new(Vec::new(), Overrides::new().catch_all(record));
    walker.walk(root, ());
    walker.into_state()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parsers::parse_standalone;

    fn idents<'a>(nodes: &[Node<'a>]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(|node| match node {
                Node::Ident(ident) => Some(format!("use:{}", ident.sym)),
                Node::BindingIdent(ident) => Some(format!("decl:{}", ident.sym)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_default_rule_visits_every_identifier() {
        let parsed = parse_standalone("const a = b + c; function f(x) { return x; }", "/t.ts").unwrap();
        let nodes = collect_nodes(Node::Module(&parsed.module));
        assert_eq!(
            idents(&nodes),
            vec!["decl:a", "use:b", "use:c", "decl:f", "decl:x", "use:x"]
        );
    }

    #[test]
    fn test_kind_override_without_descend_prunes_subtree() {
        fn skip_functions<'a>(_: &mut Walker<'a, Vec<Node<'a>>, ()>, _: Node<'a>, _: (), _: Descend<'a>) {}
        fn record<'a>(walker: &mut Walker<'a, Vec<Node<'a>>, ()>, node: Node<'a>, ctx: (), d: Descend<'a>) {
            walker.state.push(node);
            walker.descend(d, ctx);
        }

        let parsed = parse_standalone("const a = b; function f(x) { return y; }", "/t.ts").unwrap();
        let overrides = Overrides::new()
            .catch_all(record)
            .on(NodeKind::Function, skip_functions);
        let mut walker = Walker::new(Vec::new(), overrides);
        walker.walk(Node::Module(&parsed.module), ());
        let nodes = walker.into_state();

        assert_eq!(idents(&nodes), vec!["decl:a", "use:b", "decl:f"]);
        assert!(nodes.iter().any(|n| n.kind() == NodeKind::Function));
    }

    #[test]
    fn test_catch_all_without_descend_blocks_kind_override() {
        fn gate<'a>(walker: &mut Walker<'a, Vec<String>, ()>, node: Node<'a>, ctx: (), d: Descend<'a>) {
            if node.kind() != NodeKind::Call {
                walker.descend(d, ctx);
            }
        }
        fn on_ident<'a>(walker: &mut Walker<'a, Vec<String>, ()>, node: Node<'a>, _: (), _: Descend<'a>) {
            if let Node::Ident(ident) = node {
                walker.state.push(ident.sym.to_string());
            }
        }

        let parsed = parse_standalone("a; f(b);", "/t.ts").unwrap();
        let overrides = Overrides::new().catch_all(gate).on(NodeKind::Ident, on_ident);
        let mut walker = Walker::new(Vec::new(), overrides);
        walker.walk(Node::Module(&parsed.module), ());
        assert_eq!(walker.into_state(), vec!["a"]);
    }

    #[test]
    fn test_context_flows_down_not_across() {
        fn depth<'a>(walker: &mut Walker<'a, Vec<(String, usize)>, usize>, node: Node<'a>, ctx: usize, d: Descend<'a>) {
            if let Node::Ident(ident) = node {
                walker.state.push((ident.sym.to_string(), ctx));
            }
            walker.descend(d, ctx + 1);
        }

        let parsed = parse_standalone("f(a); b;", "/t.ts").unwrap();
        let mut walker = Walker::new(Vec::new(), Overrides::new().catch_all(depth));
        walker.walk(Node::Module(&parsed.module), 0);
        let seen = walker.into_state();
        // Module > ModuleItem > Stmt > Expr > Call > Expr > Ident
        assert_eq!(seen[0], ("f".to_string(), 6));
        assert_eq!(seen[1], ("a".to_string(), 6));
        // Module > ModuleItem > Stmt > Expr > Ident
        assert_eq!(seen[2], ("b".to_string(), 4));
    }

    #[test]
    fn test_node_ids_distinguish_wrappers() {
        let parsed = parse_standalone("const a = 1;", "/t.ts").unwrap();
        let nodes = collect_nodes(Node::Module(&parsed.module));
        let ids: std::collections::HashSet<_> = nodes.iter().map(Node::id).collect();
        assert_eq!(ids.len(), nodes.len());
    }
}
