//! Tree traversal engine.
//!
//! [`Node`] is a closed sum over the syntax node kinds the analysis cares
//! about, with a default traversal rule ([`Node::children`]). A [`Walker`]
//! runs that rule under a table of [`Overrides`]: one optional catch-all that
//! intercepts every node, then optional per-kind handlers. Handlers decide
//! whether and with which context to continue by calling [`Walker::descend`].

mod node;
mod walker;

pub use node::{Node, NodeId, NodeKind, import_local};
pub use walker::{Descend, Handler, Overrides, Walker, collect_nodes};
