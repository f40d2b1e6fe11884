use std::fmt;

use super::value::{Object, ObjectClass, Value};

/// Abrupt completion of an evaluation.
#[derive(Clone)]
pub enum EvalError {
    /// A value thrown by `throw`, or an error object raised by the runtime.
    Throw(Value),
    Reference(String),
    Type(String),
    Range(String),
    /// Syntax the evaluator does not implement.
    Unsupported(String),
    /// The step budget ran out. Never catchable by `try`.
    StepLimit(u64),
}

impl EvalError {
    pub fn unsupported(what: impl fmt::Display) -> Self {
        EvalError::Unsupported(format!("{what} is not supported"))
    }

    /// Whether a `try` statement may observe this error.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, EvalError::StepLimit(_))
    }

    /// The value a `catch` clause binds.
    pub fn into_value(self) -> Value {
        match self {
            EvalError::Throw(value) => value,
            EvalError::Reference(message) => error_object("ReferenceError", &message),
            EvalError::Type(message) => error_object("TypeError", &message),
            EvalError::Range(message) => error_object("RangeError", &message),
            EvalError::Unsupported(message) => error_object("SyntaxError", &message),
            EvalError::StepLimit(limit) => error_object("RangeError", &format!("step limit of {limit} exceeded")),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Throw(value) => write!(f, "uncaught {}", value.to_js_string()),
            EvalError::Reference(message) => write!(f, "ReferenceError: {message}"),
            EvalError::Type(message) => write!(f, "TypeError: {message}"),
            EvalError::Range(message) => write!(f, "RangeError: {message}"),
            EvalError::Unsupported(message) => write!(f, "SyntaxError: {message}"),
            EvalError::StepLimit(limit) => write!(f, "step limit of {limit} exceeded"),
        }
    }
}

impl fmt::Debug for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// `new <name>(message)`
pub fn error_object(name: &str, message: &str) -> Value {
    let mut object = Object::new(ObjectClass::Error);
    object.set("name", Value::string(name));
    object.set("message", Value::string(message));
    Value::object(object)
}
