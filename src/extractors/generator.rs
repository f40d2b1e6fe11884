use std::collections::BTreeMap;
use std::fmt;

use enum_dispatch::enum_dispatch;
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use super::{CssGenerator, RawGenerator};

/// Where a piece of generated output belongs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputKey {
    Global,
    File(String),
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKey::Global => write!(f, "global"),
            OutputKey::File(path) => write!(f, "{}", path),
        }
    }
}

impl Serialize for OutputKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub type GeneratorOutput = BTreeMap<OutputKey, String>;

#[derive(Debug, Error, PartialEq)]
pub enum GenerateError {
    #[error("style value must be a plain object, got {0}")]
    NotAnObject(&'static str),
    #[error("cannot render `{property}`: unsupported {found} value")]
    UnsupportedValue { property: String, found: &'static str },
}

/// A per-build accumulation session for one extractor.
#[enum_dispatch]
pub trait Generator {
    /// Accept one evaluated style value from `file`. A failed value leaves the
    /// session unchanged.
    fn ingest(&mut self, file: &str, value: &Value) -> Result<(), GenerateError>;

    /// Serialize everything accumulated so far.
    fn finish(&mut self) -> GeneratorOutput;
}

#[enum_dispatch(Generator)]
#[derive(Debug)]
pub enum GeneratorSession {
    Css(CssGenerator),
    Raw(RawGenerator),
}

/// JSON type name, for error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
