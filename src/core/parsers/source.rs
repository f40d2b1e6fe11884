use std::sync::Arc;

use anyhow::{Result, anyhow};
use swc_common::{FileName, Globals, SourceMap, SourceMapper, Span};
use swc_ecma_ast::Module;
use swc_ecma_parser::{Parser, StringInput, Syntax, TsSyntax};

use super::scope::{ScopeTable, resolve_scopes};

/// An immutable parsed source file.
///
/// Every identifier occurrence that binds to a declaration carries a scope id in
/// `scopes`, so two spellings of the same name in different lexical scopes never
/// collide. Read-only for the rest of the pipeline.
pub struct ParsedFile {
    pub path: String,
    pub module: Module,
    pub source_map: Arc<SourceMap>,
    pub scopes: ScopeTable,
}

impl ParsedFile {
    /// Source text covered by `span`, or an empty string when the span does not
    /// belong to this file.
    pub fn snippet(&self, span: Span) -> String {
        self.source_map.span_to_snippet(span).unwrap_or_default()
    }
}

impl std::fmt::Debug for ParsedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedFile")
            .field("path", &self.path)
            .field("items", &self.module.body.len())
            .field("scoped_idents", &self.scopes.len())
            .finish()
    }
}

/// Parse TS/TSX source into a [`ParsedFile`] and resolve its lexical scopes.
///
/// Accepts a shared SourceMap so files can be parsed on parallel threads; each
/// call runs under its own swc `GLOBALS`.
pub fn parse_source(code: String, file_path: &str, source_map: Arc<SourceMap>) -> Result<ParsedFile> {
    use swc_common::GLOBALS;

    GLOBALS.set(&Globals::new(), || {
        let source_file = source_map.new_source_file(FileName::Real(file_path.into()).into(), code);

        let syntax = Syntax::Typescript(TsSyntax {
            tsx: true,
            ..Default::default()
        });

        let mut parser = Parser::new(syntax, StringInput::from(&*source_file), None);

        let module = parser
            .parse_module()
            .map_err(|e| anyhow!("Failed to parse {}: {:?}", file_path, e))?;

        let scopes = resolve_scopes(&module);

        Ok(ParsedFile {
            path: file_path.to_string(),
            module,
            source_map,
            scopes,
        })
    })
}

/// Parse a source string with a fresh SourceMap. Convenient for tests and
/// for one-off files loaded by the bundler.
pub fn parse_standalone(code: &str, file_path: &str) -> Result<ParsedFile> {
    parse_source(code.to_string(), file_path, Arc::new(SourceMap::default()))
}
