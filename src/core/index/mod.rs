//! Scope-aware project index.
//!
//! Each file is indexed independently by three walker passes: parents plus
//! style-library imports, style call sites, then declaration and use sites.
//! The [`ProjectIndex`] holds every file's [`FileIndex`] so later stages can
//! hop across import edges.

mod exports;
mod file_index;
mod project;
mod refs;

pub use exports::{ExportEntry, ExportTable, StarExport, declared_idents, export_name};
pub use file_index::{
    BindingKind, CallTarget, FileIndex, ImportBinding, Imported, StyleCall, UsedBinding, callee_ident, unwrap_expr,
};
pub use project::ProjectIndex;
pub use refs::{ReferenceMap, ScopedReference};
