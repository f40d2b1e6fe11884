//! Shared helpers for analysis tests.

use crate::config::Config;
use crate::core::parsers::{ParsedFile, parse_standalone};
use crate::core::resolve::MemoryImportResolver;
use crate::extractors::ExtractorRegistry;

pub fn registry() -> ExtractorRegistry {
    ExtractorRegistry::from_config(&Config::default())
}

/// Parse `(path, code)` pairs and a resolver that knows exactly those paths.
pub fn parse_project(files: &[(&str, &str)]) -> (Vec<ParsedFile>, MemoryImportResolver) {
    let parsed = files
        .iter()
        .map(|(path, code)| parse_standalone(code, path).unwrap())
        .collect();
    let resolver = MemoryImportResolver::new(files.iter().map(|(path, _)| path.to_string()));
    (parsed, resolver)
}
