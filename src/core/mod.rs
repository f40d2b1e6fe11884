//! Core extraction engine.
//!
//! ## Module Structure
//!
//! - `parsers`: swc parsing and lexical scope resolution
//! - `walk`: closed-kind tree traversal with per-kind overrides
//! - `index`: per-file and project-wide scope-aware indexes
//! - `resolve`: import specifier resolution
//! - `derived`: derived extractor bindings across files
//! - `usage`: transitive usage propagation
//! - `slice`: minimal module generation
//! - `build`: bundling, sandboxed evaluation and generator sessions
//! - `file_scanner`: project file discovery

pub mod build;
pub mod derived;
pub mod file_scanner;
pub mod index;
pub mod parsers;
pub mod resolve;
pub mod slice;
pub mod usage;
pub mod walk;

#[cfg(test)]
pub(crate) mod fixtures;

pub use build::{BuildOutput, BuildStats, Extraction, SourceFile};
