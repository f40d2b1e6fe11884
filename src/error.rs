//! Structural errors: failures that make the whole build meaningless.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("failed to bundle {path}: {message}")]
    Bundle { path: String, message: String },

    #[error("sandbox evaluation failed: {0}")]
    Sandbox(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ExtractError::Parse { .. } => "parse-error",
            ExtractError::Bundle { .. } => "bundle-error",
            ExtractError::Sandbox(_) => "sandbox-error",
            ExtractError::Config(_) => "config-error",
            ExtractError::Io { .. } => "io-error",
        }
    }
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_messages() {
        let err = ExtractError::Parse {
            path: "/a.ts".to_string(),
            message: "Unexpected token".to_string(),
        };
        assert_eq!(err.code(), "parse-error");
        assert_eq!(err.to_string(), "failed to parse /a.ts: Unexpected token");
        assert_eq!(ExtractError::Sandbox("x".into()).code(), "sandbox-error");
    }
}
