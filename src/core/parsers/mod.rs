//! Source parsing and lexical scope resolution.
//!
//! - `source`: TS/TSX parsing via swc into an immutable [`ParsedFile`]
//! - `scope`: identifier -> declaring scope resolution

pub mod scope;
pub mod source;

pub use scope::{ScopeId, ScopeTable, binding_idents, binding_names, resolve_scopes};
pub use source::{ParsedFile, parse_source, parse_standalone};
