use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::super::args::ExtractCommand;
use super::super::exit_status::ExitStatus;
use super::super::report::{ExtractSummary, print_error_to, print_success_to, report_to};
use crate::config::{OutputFormat, load_config};
use crate::core::build::{BuildOutput, Extraction, SourceFile};
use crate::core::file_scanner::{ScanOptions, scan_files};
use crate::core::resolve::{MemoryImportResolver, normalize};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::ExtractError;
use crate::extractors::{Extractor, ExtractorRegistry, OutputKey};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const STYLESHEET_FILE: &str = "styles.css";

pub fn extract(cmd: ExtractCommand) -> Result<ExitStatus> {
    let verbose = cmd.common.verbose;

    // Priority: CLI --source-root arg > current directory
    let source_root = cmd.common.source_root.unwrap_or_else(|| PathBuf::from("."));
    let root = fs::canonicalize(&source_root)
        .with_context(|| format!("Invalid source root: {}", source_root.display()))?;

    let config_result = match load_config(&root) {
        Ok(result) => result,
        Err(err) => {
            print_error_to(&ExtractError::Config(format!("{err:#}")), &mut io::stderr().lock());
            return Ok(ExitStatus::Error);
        }
    };
    if verbose && !config_result.from_file {
        eprintln!("Note: No .styleslicerc.json found, using default configuration");
    }
    let mut config = config_result.config;
    if let Some(out_dir) = cmd.out_dir {
        config.out_dir = out_dir.to_string_lossy().into_owned();
    }

    let scan_root = normalize(&root.join(&config.source_root));
    let out_dir = normalize(&root.join(&config.out_dir));
    let scan = scan_files(
        &scan_root,
        &ScanOptions {
            exclude_dir: Some(out_dir.clone()),
            ..ScanOptions::from_config(&config)
        },
    );
    if scan.skipped_count > 0 {
        eprintln!(
            "Warning: {} path(s) skipped due to access errors{}",
            scan.skipped_count,
            if verbose { "" } else { " (use -v for details)" }
        );
    }

    let sources = match read_sources(scan.files.iter()) {
        Ok(sources) => sources,
        Err(err) => {
            print_error_to(&err, &mut io::stderr().lock());
            return Ok(ExitStatus::Error);
        }
    };
    let resolver = MemoryImportResolver::new(scan.files.iter().cloned());
    let extraction = Extraction::new(&config, &resolver);

    let diagnostics = RefCell::new(Vec::<Diagnostic>::new());
    let result = {
        let mut sink: Option<DiagnosticSink<'_>> = Some(Box::new(|d| diagnostics.borrow_mut().push(d)));
        extraction.run(&sources, &mut sink)
    };
    let diagnostics = diagnostics.into_inner();

    let output = match result {
        Ok(output) => output,
        Err(err) => {
            report_to(&diagnostics, &mut io::stdout().lock());
            print_error_to(&err, &mut io::stderr().lock());
            return Ok(ExitStatus::Error);
        }
    };

    if cmd.emit_slices {
        println!("{}", output.bundle_source);
    }

    write_outputs(&out_dir, &root, &output, extraction.registry())?;

    report_to(&diagnostics, &mut io::stdout().lock());
    let summary = ExtractSummary {
        files: output.stats.files,
        style_calls: output.stats.style_calls,
        outputs: output.outputs.len(),
    };
    print_success_to(&summary, &config.out_dir, &mut io::stdout().lock());

    Ok(ExitStatus::from_diagnostics(&diagnostics))
}

fn read_sources<'p>(paths: impl Iterator<Item = &'p String>) -> Result<Vec<SourceFile>, ExtractError> {
    paths
        .map(|path| {
            fs::read_to_string(path)
                .map(|code| SourceFile::new(path.clone(), code))
                .map_err(|source| ExtractError::Io {
                    path: path.clone(),
                    source,
                })
        })
        .collect()
}

/// Output keys as written to disk: file keys relative to the project root.
fn display_key(key: &OutputKey, root: &Path) -> String {
    match key {
        OutputKey::Global => key.to_string(),
        OutputKey::File(path) => Path::new(path)
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.clone()),
    }
}

/// `extractor id -> output key -> content`.
pub fn manifest(output: &BuildOutput, root: &Path) -> Value {
    let mut manifest = Map::new();
    for (id, generated) in &output.outputs {
        let entries: Map<String, Value> = generated
            .iter()
            .map(|(key, content)| (display_key(key, root), Value::String(content.clone())))
            .collect();
        manifest.insert(id.to_string(), Value::Object(entries));
    }
    Value::Object(manifest)
}

/// Every css output, grouped by extractor, each block headed by its origin.
pub fn stylesheet(output: &BuildOutput, root: &Path, registry: &ExtractorRegistry) -> String {
    let mut blocks: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (id, generated) in &output.outputs {
        let is_css = matches!(
            registry.find(id),
            Some(Extractor::Plain(plain)) if plain.output == OutputFormat::Css
        );
        if !is_css {
            continue;
        }
        for (key, css) in generated {
            blocks
                .entry(id.to_string())
                .or_default()
                .push(format!("/* {} */\n{}\n", display_key(key, root), css));
        }
    }
    blocks.into_values().flatten().collect::<Vec<_>>().join("\n")
}

fn write_outputs(out_dir: &Path, root: &Path, output: &BuildOutput, registry: &ExtractorRegistry) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    let manifest_path = out_dir.join(MANIFEST_FILE);
    let manifest = serde_json::to_string_pretty(&manifest(output, root)).context("Failed to serialize manifest")?;
    fs::write(&manifest_path, manifest + "\n")
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    let css_path = out_dir.join(STYLESHEET_FILE);
    fs::write(&css_path, stylesheet(output, root, registry))
        .with_context(|| format!("Failed to write {}", css_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::extractors::ExtractorId;

    fn output() -> BuildOutput {
        let mut output = BuildOutput::default();
        output.outputs.insert(
            ExtractorId::new("@styleslice/core", "css"),
            BTreeMap::from([
                (OutputKey::File("/p/src/b.ts".to_string()), ".ss-css-0 {\n  color: red;\n}".to_string()),
                (OutputKey::File("/p/src/a.ts".to_string()), ".ss-css-0 {\n  margin: 0;\n}".to_string()),
            ]),
        );
        output.outputs.insert(
            ExtractorId::new("tokens", "raw"),
            BTreeMap::from([(OutputKey::Global, "[]".to_string())]),
        );
        output
    }

    fn registry() -> ExtractorRegistry {
        let config: Config = serde_json::from_value(json!({
            "extractors": [
                { "importPath": "@styleslice/core", "symbol": "css", "kind": "css" },
                { "importPath": "tokens", "symbol": "raw", "kind": "css", "output": "raw" }
            ]
        }))
        .unwrap();
        ExtractorRegistry::from_config(&config)
    }

    #[test]
    fn test_manifest_uses_relative_file_keys() {
        assert_eq!(
            manifest(&output(), Path::new("/p")),
            json!({
                "@styleslice/core:css": {
                    "src/a.ts": ".ss-css-0 {\n  margin: 0;\n}",
                    "src/b.ts": ".ss-css-0 {\n  color: red;\n}"
                },
                "tokens:raw": { "global": "[]" }
            })
        );
    }

    #[test]
    fn test_stylesheet_only_contains_css_outputs() {
        assert_eq!(
            stylesheet(&output(), Path::new("/p"), &registry()),
            "/* src/a.ts */\n.ss-css-0 {\n  margin: 0;\n}\n\n/* src/b.ts */\n.ss-css-0 {\n  color: red;\n}\n"
        );
    }
}
