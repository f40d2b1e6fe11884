//! styleslice - static style extraction for TypeScript/JSX projects
//!
//! Finds calls to configured style functions, reduces every file to the code
//! those calls depend on, evaluates the result in a sandbox and hands the
//! evaluated style objects to per-extractor generators.
//!
//! ## Module Structure
//!
//! - `cli`: Command-line interface (`extract`, `init`)
//! - `config`: Configuration file loading and validation
//! - `core`: Analysis, slicing and build orchestration
//! - `sandbox`: Evaluator for bundled style code
//! - `extractors`: Extractor registry and output generators
//! - `diagnostics`: Per-call diagnostics and sinks
//! - `error`: Structural errors

pub mod cli;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod extractors;
pub mod sandbox;
