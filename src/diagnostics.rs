//! Per-call diagnostics.
//!
//! Problems confined to one style call (a malformed argument, a generator that
//! rejects a value) are recovered locally and surface here instead of aborting
//! the build. Diagnostics go to an optional caller-supplied sink.

// ============================================================
// Severity and Code
// ============================================================

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Stable identifier for each kind of diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticCode {
    /// A style argument evaluated to something other than a plain object.
    InvalidStyleArgument,
    /// Evaluating a call's arguments threw.
    ExtractionFailed,
    /// A generator could not serialize a value.
    GeneratorFailed,
    /// A used binding shared a destructuring with a derived extractor and was dropped.
    DerivedSiblingDropped,
    /// An extractor callback failed for reasons other than the above.
    CallbackFailed,
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticCode::InvalidStyleArgument => write!(f, "invalid-style-argument"),
            DiagnosticCode::ExtractionFailed => write!(f, "extraction-failed"),
            DiagnosticCode::GeneratorFailed => write!(f, "generator-failed"),
            DiagnosticCode::DerivedSiblingDropped => write!(f, "derived-sibling-dropped"),
            DiagnosticCode::CallbackFailed => write!(f, "callback-failed"),
        }
    }
}

// ============================================================
// Diagnostic
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub severity: Severity,
    pub file: Option<String>,
}

impl Diagnostic {
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Warning,
            file: None,
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warning(code, message)
        }
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}: {} [{}]", file, self.message, self.code),
            None => write!(f, "{} [{}]", self.message, self.code),
        }
    }
}

// ============================================================
// Sink
// ============================================================

/// Receives diagnostics as they are raised. Absent sinks drop diagnostics.
pub type DiagnosticSink<'s> = Box<dyn FnMut(Diagnostic) + 's>;

/// Deliver `diagnostics` to `sink`, or log and drop them when there is none.
pub fn dispatch(sink: &mut Option<DiagnosticSink<'_>>, diagnostics: impl IntoIterator<Item = Diagnostic>) {
    for diagnostic in diagnostics {
        match sink {
            Some(sink) => sink(diagnostic),
            None => tracing::warn!(code = %diagnostic.code, "dropping diagnostic: {}", diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(DiagnosticCode::InvalidStyleArgument.to_string(), "invalid-style-argument");
        assert_eq!(DiagnosticCode::ExtractionFailed.to_string(), "extraction-failed");
        assert_eq!(DiagnosticCode::GeneratorFailed.to_string(), "generator-failed");
        assert_eq!(DiagnosticCode::DerivedSiblingDropped.to_string(), "derived-sibling-dropped");
        assert_eq!(DiagnosticCode::CallbackFailed.to_string(), "callback-failed");
    }

    #[test]
    fn test_display_includes_file() {
        let diagnostic = Diagnostic::warning(DiagnosticCode::ExtractionFailed, "boom").in_file("/a.ts");
        assert_eq!(diagnostic.to_string(), "/a.ts: boom [extraction-failed]");
        assert_eq!(diagnostic.severity, Severity::Warning);
    }

    #[test]
    fn test_dispatch_without_sink_drops() {
        let mut sink = None;
        dispatch(&mut sink, [Diagnostic::warning(DiagnosticCode::CallbackFailed, "x")]);
    }

    #[test]
    fn test_dispatch_with_sink_delivers() {
        let mut received = Vec::new();
        {
            let mut sink: Option<DiagnosticSink<'_>> = Some(Box::new(|d| received.push(d)));
            dispatch(&mut sink, [Diagnostic::error(DiagnosticCode::GeneratorFailed, "bad")]);
        }
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].severity, Severity::Error);
    }
}
