//! Runtime values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value as Json;

use super::env::Scope;
use super::error::EvalError;

pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value, EvalError>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<Function>),
}

/// What kind of object this is, beyond its properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Plain,
    Error,
    /// A module namespace or builtin library object.
    Namespace,
}

/// Properties in insertion order.
#[derive(Clone)]
pub struct Object {
    pub class: ObjectClass,
    props: Vec<(Rc<str>, Value)>,
}

impl Object {
    pub fn new(class: ObjectClass) -> Self {
        Self {
            class,
            props: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        match self.props.iter_mut().find(|(k, _)| &**k == key) {
            Some((_, slot)) => *slot = value,
            None => self.props.push((Rc::from(key), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.props.len();
        self.props.retain(|(k, _)| &**k != key);
        before != self.props.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys in property order: integer-like keys ascending, then the rest in
    /// insertion order.
    pub fn keys(&self) -> Vec<Rc<str>> {
        let mut indices: Vec<(u32, Rc<str>)> = Vec::new();
        let mut names = Vec::new();
        for (key, _) in &self.props {
            match array_index(key) {
                Some(i) => indices.push((i, key.clone())),
                None => names.push(key.clone()),
            }
        }
        indices.sort_by_key(|(i, _)| *i);
        indices.into_iter().map(|(_, k)| k).chain(names).collect()
    }

    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(&key).cloned().map(|value| (key, value)))
            .collect()
    }
}

fn array_index(key: &str) -> Option<u32> {
    if key == "0" || (!key.starts_with('0') && !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())) {
        key.parse().ok()
    } else {
        None
    }
}

/// A callable value.
pub enum Function {
    Closure(Closure),
    Native(Native),
    /// A method with its receiver bound, e.g. `Object.keys`.
    Bound { target: Rc<Function>, this: Value },
}

/// A function defined in interpreted code.
pub struct Closure {
    /// Index into the interpreter's code table.
    pub code: usize,
    pub env: Rc<Scope>,
    pub name: Rc<str>,
}

pub struct Native {
    pub name: Rc<str>,
    pub call: NativeFn,
    /// Callable with `new`.
    pub constructor: bool,
}

impl Function {
    pub fn native(name: &str, call: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static) -> Self {
        Function::Native(Native {
            name: Rc::from(name),
            call: Rc::new(call),
            constructor: false,
        })
    }

    pub fn name(&self) -> Rc<str> {
        match self {
            Function::Closure(closure) => closure.name.clone(),
            Function::Native(native) => native.name.clone(),
            Function::Bound { target, .. } => target.name(),
        }
    }
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Rc::from(text.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn plain_object(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut object = Object::new(ObjectClass::Plain);
        for (key, value) in entries {
            object.set(&key, value);
        }
        Value::object(object)
    }

    pub fn function(function: Function) -> Self {
        Value::Function(Rc::new(function))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) | Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// A short description for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(object) if object.borrow().class == ObjectClass::Error => "error",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Whether this is an object literal shaped value, the only thing style
    /// callbacks accept.
    pub fn is_plain_object(&self) -> bool {
        matches!(self, Value::Object(object) if object.borrow().class == ObjectClass::Plain)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(items) => {
                let items = items.borrow();
                match items.len() {
                    0 => 0.0,
                    1 => items[0].to_number(),
                    _ => f64::NAN,
                }
            }
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// `String(value)`.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(object) => {
                let object = object.borrow();
                if object.class == ObjectClass::Error {
                    let name = object.get("name").map(Value::to_js_string).unwrap_or_default();
                    let message = object.get("message").map(Value::to_js_string).unwrap_or_default();
                    if message.is_empty() {
                        name
                    } else {
                        format!("{name}: {message}")
                    }
                } else {
                    "[object Object]".to_string()
                }
            }
            Value::Function(function) => format!("function {}() {{ [code] }}", function.name()),
        }
    }

    /// Property key form of a value.
    pub fn to_key(&self) -> Rc<str> {
        match self {
            Value::String(s) => s.clone(),
            other => Rc::from(other.to_js_string()),
        }
    }

    /// JSON form for generators. Functions and `undefined` are dropped from
    /// objects and become `null` inside arrays, as `JSON.stringify` does.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Json::String(s.to_string()),
            Value::Array(items) => Json::Array(items.borrow().iter().map(Value::to_json).collect()),
            Value::Object(object) => {
                let mut map = serde_json::Map::new();
                for (key, value) in object.borrow().entries() {
                    if matches!(value, Value::Undefined | Value::Function(_)) {
                        continue;
                    }
                    map.insert(key.to_string(), value.to_json());
                }
                Json::Object(map)
            }
        }
    }

    /// Strict equality (`===`).
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose equality (`==`).
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Function(function) => write!(f, "[function {}]", function.name()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

fn number_to_json(n: f64) -> Json {
    if !n.is_finite() {
        return Json::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        // -0 serializes as 0.
        return Json::from(n as i64);
    }
    serde_json::Number::from_f64(n).map(Json::Number).unwrap_or(Json::Null)
}

fn string_to_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    match text {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if text.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) => {
            text.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

/// Number to string the way JavaScript prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return n.to_string();
    }
    // Exponent form: Rust prints `1e21`/`1.5e-7`, JavaScript wants `1e+21`.
    let text = format!("{n:e}");
    match text.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => text,
    }
}
