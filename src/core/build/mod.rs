//! Build orchestration.
//!
//! One build runs the whole pipeline over a fixed set of sources:
//!
//! 1. Parse every file in parallel, each with its own `SourceMap`.
//! 2. Index the project, resolve derived extractors, propagate usage.
//! 3. Slice each file and render it with its registration trailer.
//! 4. Bundle the slices behind a synthetic entry module.
//! 5. Evaluate the bundle with the extractor callbacks as globals.
//! 6. Drain the generator sessions.
//!
//! Steps 1 and 4 are structural errors, as is running out of evaluation
//! steps. A module whose top level throws loses only its own remaining code
//! and is reported against its file; everything else degrades into
//! diagnostics the same way.

mod bundle;
mod callbacks;

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use swc_common::SourceMap;
use tracing::{debug, info};

pub use bundle::{Bundle, BundledModule, Bundler, Link, MemoryBundler};
pub use callbacks::Callbacks;

use crate::config::Config;
use crate::core::derived::resolve_derived;
use crate::core::index::ProjectIndex;
use crate::core::parsers::{ParsedFile, parse_source};
use crate::core::resolve::ImportResolver;
use crate::core::slice::{quote, slice_project};
use crate::core::usage::propagate_usage;
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, dispatch};
use crate::error::{ExtractError, Result};
use crate::extractors::{ExtractorId, ExtractorRegistry, GeneratorOutput};
use crate::sandbox::{DEFAULT_MAX_DEPTH, EvalError, Evaluator, ModuleFailure};

/// Path of the synthetic module that imports every slice.
pub const ENTRY_PATH: &str = "/__styleslice_entry__.js";

/// One input file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub code: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub files: usize,
    /// Files that contributed a slice.
    pub slices: usize,
    pub style_calls: usize,
    pub steps: u64,
}

#[derive(Debug, Default)]
pub struct BuildOutput {
    pub outputs: BTreeMap<ExtractorId, GeneratorOutput>,
    /// The evaluated bundle as source, for inspection.
    pub bundle_source: String,
    pub stats: BuildStats,
}

/// Runs builds for one configuration.
pub struct Extraction<'r> {
    registry: ExtractorRegistry,
    resolver: &'r dyn ImportResolver,
    bundler: Box<dyn Bundler + 'r>,
    evaluator: Evaluator,
    class_prefix: String,
}

impl<'r> Extraction<'r> {
    pub fn new(config: &Config, resolver: &'r dyn ImportResolver) -> Self {
        Self {
            registry: ExtractorRegistry::from_config(config),
            resolver,
            bundler: Box::new(MemoryBundler),
            evaluator: Evaluator::new(config.max_steps)
                .with_max_depth(config.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)),
            class_prefix: config.class_prefix.clone(),
        }
    }

    pub fn with_bundler(mut self, bundler: impl Bundler + 'r) -> Self {
        self.bundler = Box::new(bundler);
        self
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Run one build. Diagnostics go to `sink` as they are produced.
    pub fn run(&self, sources: &[SourceFile], sink: &mut Option<DiagnosticSink<'_>>) -> Result<BuildOutput> {
        let files = parse_all(sources)?;
        let mut project = ProjectIndex::build(&files, &self.registry);
        resolve_derived(&mut project, &self.registry, self.resolver);
        let usage = propagate_usage(&mut project, &self.registry, self.resolver);
        let style_calls = project.files.iter().map(|index| index.style_calls.len()).sum();
        debug!(
            files = files.len(),
            style_calls,
            seeds = usage.seeds,
            bindings = usage.bindings,
            "analysis finished"
        );

        let (slices, diagnostics) = slice_project(&project, &self.registry);
        dispatch(sink, diagnostics);

        // Every project file is known to the bundler; files without a slice
        // are empty modules rather than being read back from disk.
        let mut modules: BTreeMap<String, Option<String>> =
            files.iter().map(|file| (file.path.clone(), None)).collect();
        let mut entry = String::new();
        for slice in &slices {
            modules.insert(slice.path().to_string(), Some(slice.render()));
            entry.push_str(&format!("import {};\n", quote(slice.path())));
        }
        modules.insert(ENTRY_PATH.to_string(), Some(entry));

        let bundle = self.bundler.bundle(ENTRY_PATH, &modules)?;
        let callbacks = Callbacks::new(&self.registry, &self.class_prefix);
        let summary = self
            .evaluator
            .run(&bundle, callbacks.globals())
            .map_err(sandbox_error)?;

        let (outputs, diagnostics) = callbacks.drain();
        dispatch(sink, diagnostics);
        dispatch(sink, summary.failures.into_iter().map(module_failure));
        let stats = BuildStats {
            files: files.len(),
            slices: slices.len(),
            style_calls,
            steps: summary.steps,
        };
        info!(
            files = stats.files,
            slices = stats.slices,
            outputs = outputs.len(),
            "extraction finished"
        );
        Ok(BuildOutput {
            outputs,
            bundle_source: bundle.render(),
            stats,
        })
    }
}

fn sandbox_error(error: EvalError) -> ExtractError {
    ExtractError::Sandbox(error.to_string())
}

fn module_failure(failure: ModuleFailure) -> Diagnostic {
    Diagnostic::warning(
        DiagnosticCode::ExtractionFailed,
        format!("failed to evaluate module: {}", failure.error),
    )
    .in_file(failure.path)
}

/// Parse every source in parallel. The first failure, in input order, wins.
fn parse_all(sources: &[SourceFile]) -> Result<Vec<ParsedFile>> {
    sources
        .par_iter()
        .map(|source| {
            let source_map = Arc::new(SourceMap::default());
            parse_source(source.code.clone(), &source.path, source_map).map_err(|e| ExtractError::Parse {
                path: source.path.clone(),
                message: e.to_string(),
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}
