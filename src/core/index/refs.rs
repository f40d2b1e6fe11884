use std::collections::HashMap;

use swc_ecma_ast::Ident;

use crate::core::parsers::{ParsedFile, ScopeId};

/// A name disambiguated by the lexical scope that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedReference {
    pub name: String,
    pub scope: ScopeId,
}

impl ScopedReference {
    pub fn new(name: impl Into<String>, scope: ScopeId) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }

    /// Reference for an identifier occurrence. `None` when the parser assigned
    /// no scope, e.g. a global or an unbound name.
    pub fn of(file: &ParsedFile, ident: &Ident) -> Option<Self> {
        file.scopes
            .get(&ident.span.lo)
            .map(|scope| Self::new(ident.sym.as_str(), *scope))
    }
}

/// Map keyed first by name, then by scope.
#[derive(Debug, Clone)]
pub struct ReferenceMap<V> {
    inner: HashMap<String, HashMap<ScopeId, V>>,
}

impl<V> Default for ReferenceMap<V> {
    fn default() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }
}

impl<V> ReferenceMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: &ScopedReference, value: V) -> Option<V> {
        self.inner
            .entry(reference.name.clone())
            .or_default()
            .insert(reference.scope, value)
    }

    pub fn get(&self, reference: &ScopedReference) -> Option<&V> {
        self.inner.get(&reference.name)?.get(&reference.scope)
    }

    pub fn contains(&self, reference: &ScopedReference) -> bool {
        self.get(reference).is_some()
    }

    /// Lookup by an optional reference; unscoped references never resolve.
    pub fn lookup(&self, reference: Option<&ScopedReference>) -> Option<&V> {
        reference.and_then(|r| self.get(r))
    }

    pub fn len(&self) -> usize {
        self.inner.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopedReference, &V)> {
        self.inner.iter().flat_map(|(name, by_scope)| {
            by_scope
                .iter()
                .map(move |(scope, value)| (ScopedReference::new(name.clone(), *scope), value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_different_scopes_do_not_collide() {
        let mut map = ReferenceMap::new();
        map.insert(&ScopedReference::new("color", ScopeId(0)), "outer");
        map.insert(&ScopedReference::new("color", ScopeId(3)), "inner");

        assert_eq!(map.get(&ScopedReference::new("color", ScopeId(0))), Some(&"outer"));
        assert_eq!(map.get(&ScopedReference::new("color", ScopeId(3))), Some(&"inner"));
        assert_eq!(map.get(&ScopedReference::new("color", ScopeId(1))), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_unscoped_lookup_never_resolves() {
        let mut map = ReferenceMap::new();
        map.insert(&ScopedReference::new("a", ScopeId(0)), 1);
        assert_eq!(map.lookup(None), None);
    }
}
