use std::process::ExitCode;

use crate::diagnostics::Diagnostic;

/// Process exit status.
///
/// - `Success` (0): extraction finished without diagnostics
/// - `Failure` (1): extraction finished but reported diagnostics
/// - `Error` (2): a structural error stopped the build
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
    Error,
}

impl ExitStatus {
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        if diagnostics.is_empty() {
            ExitStatus::Success
        } else {
            ExitStatus::Failure
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => ExitCode::from(0),
            ExitStatus::Failure => ExitCode::from(1),
            ExitStatus::Error => ExitCode::from(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCode;

    #[test]
    fn exit_code_values() {
        assert_eq!(ExitCode::from(ExitStatus::Success), ExitCode::from(0));
        assert_eq!(ExitCode::from(ExitStatus::Failure), ExitCode::from(1));
        assert_eq!(ExitCode::from(ExitStatus::Error), ExitCode::from(2));
    }

    #[test]
    fn any_diagnostic_fails_the_run() {
        assert_eq!(ExitStatus::from_diagnostics(&[]), ExitStatus::Success);
        let warning = Diagnostic::warning(DiagnosticCode::ExtractionFailed, "boom");
        assert_eq!(ExitStatus::from_diagnostics(&[warning]), ExitStatus::Failure);
    }
}
