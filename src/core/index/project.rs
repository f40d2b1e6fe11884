use std::collections::HashMap;

use rayon::prelude::*;

use super::file_index::FileIndex;
use crate::core::parsers::ParsedFile;
use crate::core::resolve::ImportResolver;
use crate::extractors::ExtractorRegistry;

/// Every file's index, addressable by position or path.
pub struct ProjectIndex<'a> {
    pub files: Vec<FileIndex<'a>>,
    by_path: HashMap<String, usize>,
}

impl<'a> ProjectIndex<'a> {
    /// Index all files in parallel. Every index is complete before this
    /// returns, so cross-file lookups never observe a partial index.
    pub fn build(files: &'a [ParsedFile], registry: &ExtractorRegistry) -> Self {
        let files: Vec<FileIndex<'a>> = files
            .par_iter()
            .map(|file| FileIndex::build(file, registry))
            .collect();
        let by_path = files
            .iter()
            .enumerate()
            .map(|(i, index)| (index.path().to_string(), i))
            .collect();
        Self { files, by_path }
    }

    pub fn position(&self, path: &str) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    pub fn get(&self, path: &str) -> Option<&FileIndex<'a>> {
        self.position(path).map(|i| &self.files[i])
    }

    /// Index of the project file `specifier` refers to from file `from`.
    pub fn resolve_import(&self, from: usize, specifier: &str, resolver: &dyn ImportResolver) -> Option<usize> {
        let path = resolver.resolve(self.files[from].path(), specifier)?;
        self.position(&path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
