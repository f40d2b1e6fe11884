//! Report formatting and printing.
//!
//! Diagnostics are printed cargo-style; kept out of the core so the engine can
//! be used as a library.

use std::io::Write;

use colored::Colorize;

use crate::diagnostics::{Diagnostic, Severity};
use crate::error::ExtractError;

/// Success mark for consistent output formatting.
pub const SUCCESS_MARK: &str = "\u{2713}"; // ✓

/// Failure mark for consistent output formatting.
pub const FAILURE_MARK: &str = "\u{2718}"; // ✘

/// What a finished extraction produced, for the summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub style_calls: usize,
    pub outputs: usize,
}

/// Print diagnostics, sorted by file, followed by a problem count.
pub fn report_to<W: Write>(diagnostics: &[Diagnostic], writer: &mut W) {
    if diagnostics.is_empty() {
        return;
    }

    let mut sorted = diagnostics.to_vec();
    sorted.sort_by(|a, b| (&a.file, a.severity, a.code).cmp(&(&b.file, b.severity, b.code)));

    for diagnostic in &sorted {
        print_diagnostic(diagnostic, writer);
    }

    let errors = sorted.iter().filter(|d| d.severity == Severity::Error).count();
    let warnings = sorted.len() - errors;
    let _ = writeln!(
        writer,
        "{} {} problems ({} {}, {} {})",
        FAILURE_MARK.red(),
        sorted.len(),
        errors,
        if errors == 1 { "error" } else { "errors" }.red(),
        warnings,
        if warnings == 1 { "warning" } else { "warnings" }.yellow()
    );
}

fn print_diagnostic<W: Write>(diagnostic: &Diagnostic, writer: &mut W) {
    let severity = match diagnostic.severity {
        Severity::Error => "error".bold().red(),
        Severity::Warning => "warning".bold().yellow(),
    };
    let _ = writeln!(
        writer,
        "{}: {}  {}",
        severity,
        diagnostic.message,
        diagnostic.code.to_string().dimmed().cyan()
    );
    if let Some(file) = &diagnostic.file {
        let _ = writeln!(writer, "  {} {}", "-->".blue(), file);
    }
    let _ = writeln!(writer);
}

pub fn print_success_to<W: Write>(summary: &ExtractSummary, out_dir: &str, writer: &mut W) {
    let _ = writeln!(
        writer,
        "{} {}",
        SUCCESS_MARK.green(),
        format!(
            "Extracted {} style {} from {} {} into {} ({} {})",
            summary.style_calls,
            if summary.style_calls == 1 { "call" } else { "calls" },
            summary.files,
            if summary.files == 1 { "file" } else { "files" },
            out_dir,
            summary.outputs,
            if summary.outputs == 1 { "output" } else { "outputs" },
        )
        .green()
    );
}

/// Print a structural error with its stable code.
pub fn print_error_to<W: Write>(error: &ExtractError, writer: &mut W) {
    let _ = writeln!(
        writer,
        "{}: {}  {}",
        "error".bold().red(),
        error,
        error.code().dimmed().cyan()
    );
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diagnostics::DiagnosticCode;

    fn render(f: impl FnOnce(&mut Vec<u8>)) -> String {
        colored::control::set_override(false);
        let mut out = Vec::new();
        f(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_diagnostics_are_sorted_by_file() {
        let diagnostics = vec![
            Diagnostic::warning(DiagnosticCode::ExtractionFailed, "failed to evaluate style call: boom").in_file("/b.ts"),
            Diagnostic::warning(DiagnosticCode::InvalidStyleArgument, "`css` expects a plain object").in_file("/a.ts"),
        ];
        let output = render(|out| report_to(&diagnostics, out));
        assert_eq!(
            output,
            "warning: `css` expects a plain object  invalid-style-argument\n  --> /a.ts\n\n\
             warning: failed to evaluate style call: boom  extraction-failed\n  --> /b.ts\n\n\
             \u{2718} 2 problems (0 errors, 2 warnings)\n"
        );
    }

    #[test]
    fn test_nothing_printed_without_diagnostics() {
        assert_eq!(render(|out| report_to(&[], out)), "");
    }

    #[test]
    fn test_success_and_error_lines() {
        let summary = ExtractSummary {
            files: 1,
            style_calls: 2,
            outputs: 1,
        };
        assert_eq!(
            render(|out| print_success_to(&summary, ".styleslice", out)),
            "\u{2713} Extracted 2 style calls from 1 file into .styleslice (1 output)\n"
        );
        let error = ExtractError::Sandbox("uncaught Error: top".to_string());
        assert_eq!(
            render(|out| print_error_to(&error, out)),
            "error: sandbox evaluation failed: uncaught Error: top  sandbox-error\n"
        );
    }
}
