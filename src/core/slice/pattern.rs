//! Destructuring pattern pruning.

use swc_common::Spanned;
use swc_ecma_ast::*;

use crate::core::index::FileIndex;
use crate::core::parsers::ParsedFile;
use crate::core::walk::Node;

/// What survives of a binding pattern.
#[derive(Debug, Clone)]
pub enum SlicePat<'a> {
    /// Keep the original text.
    Whole(&'a Pat),
    Object(Vec<SliceProp<'a>>),
    /// `None` entries are holes.
    Array(Vec<Option<SlicePat<'a>>>),
    Assign { left: Box<SlicePat<'a>>, right: &'a Expr },
    Rest(Box<SlicePat<'a>>),
}

#[derive(Debug, Clone)]
pub enum SliceProp<'a> {
    Whole(&'a ObjectPatProp),
    KeyValue { key: &'a PropName, value: SlicePat<'a> },
}

/// Prune `pat` to the leaves the index marked used. `None` when no leaf is.
pub fn prune_pattern<'a>(index: &FileIndex<'a>, pat: &'a Pat) -> Option<SlicePat<'a>> {
    let used = |ident: &'a Ident| index.is_used(Node::BindingIdent(ident));

    match pat {
        Pat::Ident(binding) => used(&binding.id).then_some(SlicePat::Whole(pat)),
        Pat::Assign(assign) => match prune_pattern(index, &assign.left)? {
            SlicePat::Whole(_) => Some(SlicePat::Whole(pat)),
            left => Some(SlicePat::Assign {
                left: Box::new(left),
                right: &assign.right,
            }),
        },
        Pat::Rest(rest) => match prune_pattern(index, &rest.arg)? {
            SlicePat::Whole(_) => Some(SlicePat::Whole(pat)),
            arg => Some(SlicePat::Rest(Box::new(arg))),
        },
        Pat::Object(object) => {
            let mut kept = Vec::new();
            let mut intact = true;
            for prop in &object.props {
                let slice = match prop {
                    ObjectPatProp::KeyValue(kv) => match prune_pattern(index, &kv.value) {
                        Some(SlicePat::Whole(_)) => Some(SliceProp::Whole(prop)),
                        Some(value) => Some(SliceProp::KeyValue { key: &kv.key, value }),
                        None => None,
                    },
                    ObjectPatProp::Assign(assign) => used(&assign.key.id).then_some(SliceProp::Whole(prop)),
                    ObjectPatProp::Rest(rest) => prune_pattern(index, &rest.arg).map(|_| SliceProp::Whole(prop)),
                };
                match slice {
                    Some(SliceProp::Whole(_)) => {}
                    _ => intact = false,
                }
                kept.extend(slice);
            }
            if kept.is_empty() {
                None
            } else if intact {
                Some(SlicePat::Whole(pat))
            } else {
                Some(SlicePat::Object(kept))
            }
        }
        Pat::Array(array) => {
            let elems: Vec<Option<SlicePat<'a>>> = array
                .elems
                .iter()
                .map(|elem| elem.as_ref().and_then(|elem| prune_pattern(index, elem)))
                .collect();
            let last = elems.iter().rposition(Option::is_some)?;
            let intact = last + 1 == array.elems.len()
                && elems
                    .iter()
                    .zip(&array.elems)
                    .all(|(kept, original)| match (kept, original) {
                        (Some(SlicePat::Whole(_)), Some(_)) | (None, None) => true,
                        _ => false,
                    });
            if intact {
                return Some(SlicePat::Whole(pat));
            }
            let mut elems = elems;
            elems.truncate(last + 1);
            Some(SlicePat::Array(elems))
        }
        Pat::Expr(_) | Pat::Invalid(_) => None,
    }
}

impl SlicePat<'_> {
    pub fn render(&self, file: &ParsedFile) -> String {
        match self {
            SlicePat::Whole(pat) => file.snippet(pat.span()),
            SlicePat::Object(props) => {
                let props: Vec<String> = props
                    .iter()
                    .map(|prop| match prop {
                        SliceProp::Whole(prop) => file.snippet(prop.span()),
                        SliceProp::KeyValue { key, value } => {
                            format!("{}: {}", file.snippet(key.span()), value.render(file))
                        }
                    })
                    .collect();
                format!("{{ {} }}", props.join(", "))
            }
            SlicePat::Array(elems) => {
                let elems: Vec<String> = elems
                    .iter()
                    .map(|elem| elem.as_ref().map(|pat| pat.render(file)).unwrap_or_default())
                    .collect();
                format!("[{}]", elems.join(", "))
            }
            SlicePat::Assign { left, right } => {
                format!("{} = {}", left.render(file), file.snippet(right.span()))
            }
            SlicePat::Rest(arg) => format!("...{}", arg.render(file)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::fixtures::registry;
    use crate::core::parsers::parse_standalone;

    /// Prune the first declarator of `code`, treating `used` as the used leaves.
    fn prune(code: &str, used: &[&str]) -> Option<String> {
        let parsed = parse_standalone(code, "/p.ts").unwrap();
        let mut index = FileIndex::build(&parsed, &registry());
        let declarations: Vec<_> = index
            .declarations
            .iter()
            .filter(|(reference, _)| used.contains(&reference.name.as_str()))
            .map(|(_, ident)| *ident)
            .collect();
        for ident in declarations {
            index.mark_path(Node::BindingIdent(ident));
        }
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = &parsed.module.body[0] else {
            panic!("expected a variable declaration");
        };
        prune_pattern(&index, &var.decls[0].name).map(|pat| pat.render(&parsed))
    }

    #[test]
    fn test_object_keeps_used_properties_in_order() {
        assert_eq!(
            prune("const { a, b: renamed, c, ...rest } = obj;", &["renamed", "rest"]).as_deref(),
            Some("{ b: renamed, ...rest }")
        );
        assert_eq!(
            prune("const { a, b } = obj;", &["a", "b"]).as_deref(),
            Some("{ a, b }")
        );
        assert_eq!(prune("const { a, b } = obj;", &[]), None);
    }

    #[test]
    fn test_nested_patterns_and_defaults() {
        assert_eq!(
            prune("const { a: { x, y } = {}, b } = obj;", &["y"]).as_deref(),
            Some("{ a: { y } = {} }")
        );
        assert_eq!(
            prune("const { a = 1, b = 2 } = obj;", &["b"]).as_deref(),
            Some("{ b = 2 }")
        );
    }

    #[test]
    fn test_array_keeps_positions_with_holes() {
        assert_eq!(prune("const [a, b, c, d] = arr;", &["c"]).as_deref(), Some("[, , c]"));
        assert_eq!(prune("const [a, , c] = arr;", &["a"]).as_deref(), Some("[a]"));
        assert_eq!(prune("const [a, [b, c]] = arr;", &["c"]).as_deref(), Some("[, [, c]]"));
        assert_eq!(prune("const [a, b] = arr;", &["a", "b"]).as_deref(), Some("[a, b]"));
        assert_eq!(prune("const [a, b] = arr;", &[]), None);
    }
}
