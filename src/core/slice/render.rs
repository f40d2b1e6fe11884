//! Source text for sliced modules.
//!
//! Retained syntax is copied from the original file by span; only the parts
//! that change (pruned lists, stand-ins, the trailer) are synthesized.

use swc_common::Spanned;
use swc_ecma_ast::*;

use super::{Registration, SliceItem, SlicedModule};
use crate::core::parsers::ParsedFile;

/// `__styleslice_register(id, file, ...args)`
pub const REGISTER_GLOBAL: &str = "__styleslice_register";
/// Object of extractor callbacks keyed by extractor id.
pub const EXTRACTORS_GLOBAL: &str = "__styleslice_extractors";
/// `__styleslice_report(file, error)`
pub const REPORT_GLOBAL: &str = "__styleslice_report";
/// `__styleslice_intrinsic(id)`, an inert stand-in for a style-library import.
pub const INTRINSIC_GLOBAL: &str = "__styleslice_intrinsic";

/// A JavaScript string literal for `text`.
pub fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// Call arguments copied verbatim, spreads included.
pub fn render_args(file: &ParsedFile, args: &[ExprOrSpread]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let expr = file.snippet(arg.expr.span());
            match arg.spread {
                Some(_) => format!("...{expr}"),
                None => expr,
            }
        })
        .collect()
}

fn var_kind(kind: VarDeclKind) -> &'static str {
    match kind {
        VarDeclKind::Var => "var",
        VarDeclKind::Let => "let",
        VarDeclKind::Const => "const",
    }
}

impl SlicedModule<'_> {
    /// Render the module as source, one item per line, trailer last.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            out.push_str(&self.render_item(item));
            out.push('\n');
        }
        let path = quote(self.path());
        for registration in &self.registrations {
            let call = match registration {
                Registration::Intrinsic { extractor, args } => {
                    let mut parts = vec![quote(&extractor.to_string()), path.clone()];
                    parts.extend(render_args(self.file, args));
                    format!("{REGISTER_GLOBAL}({})", parts.join(", "))
                }
                Registration::Derived { local, args } => {
                    let mut parts = vec![path.clone()];
                    parts.extend(render_args(self.file, args));
                    format!("{}({})", local.sym, parts.join(", "))
                }
            };
            out.push_str(&format!(
                "try {{ {call}; }} catch (err) {{ {REPORT_GLOBAL}({path}, err); }}\n"
            ));
        }
        out
    }

    fn render_item(&self, item: &SliceItem<'_>) -> String {
        let file = self.file;
        match item {
            SliceItem::Whole(item) => file.snippet(item.span()),
            SliceItem::Import { decl, specifiers } => {
                let mut default = None;
                let mut namespace = None;
                let mut named = Vec::new();
                for spec in specifiers {
                    match spec {
                        ImportSpecifier::Default(d) => default = Some(d.local.sym.to_string()),
                        ImportSpecifier::Namespace(_) => namespace = Some(file.snippet(spec.span())),
                        ImportSpecifier::Named(_) => named.push(file.snippet(spec.span())),
                    }
                }
                let mut clauses: Vec<String> = default.into_iter().chain(namespace).collect();
                if !named.is_empty() {
                    clauses.push(format!("{{ {} }}", named.join(", ")));
                }
                let source = decl.src.value.as_str().unwrap_or_default();
                format!("import {} from {};", clauses.join(", "), quote(source))
            }
            SliceItem::Var {
                decl,
                exported,
                declarators,
            } => {
                let declarators: Vec<String> = declarators
                    .iter()
                    .map(|d| {
                        let pattern = d.pattern.render(file);
                        match &d.declarator.init {
                            Some(init) => format!("{pattern} = {}", file.snippet(init.span())),
                            None => pattern,
                        }
                    })
                    .collect();
                format!(
                    "{}{} {};",
                    if *exported { "export " } else { "" },
                    var_kind(decl.kind),
                    declarators.join(", ")
                )
            }
            SliceItem::Export { export, specifiers } => {
                let specifiers: Vec<String> = specifiers.iter().map(|spec| file.snippet(spec.span())).collect();
                let from = export
                    .src
                    .as_deref()
                    .and_then(|src| src.value.as_str())
                    .map(|src| format!(" from {}", quote(src)))
                    .unwrap_or_default();
                format!("export {{ {} }}{from};", specifiers.join(", "))
            }
            SliceItem::Intrinsic { local, id } => {
                format!("const {} = {INTRINSIC_GLOBAL}({});", local.sym, quote(id))
            }
            SliceItem::Derived {
                local,
                exported,
                factory,
                via,
                name,
                call,
            } => {
                let callee = match via {
                    Some(via) => via.sym.to_string(),
                    None => format!("{EXTRACTORS_GLOBAL}[{}]", quote(&factory.to_string())),
                };
                format!(
                    "{}const {} = {callee}({})[{}];",
                    if *exported { "export " } else { "" },
                    local.sym,
                    render_args(file, &call.args).join(", "),
                    quote(name)
                )
            }
        }
    }
}
