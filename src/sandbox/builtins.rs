//! The global library available to evaluated code.

use std::rc::Rc;

use super::env::{Scope, Slot};
use super::error::{EvalError, error_object};
use super::ops;
use super::value::{Function, Native, Object, ObjectClass, Value};

type NativeResult = Result<Value, EvalError>;

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn native(name: &str, call: impl Fn(&[Value]) -> NativeResult + 'static) -> Value {
    Value::function(Function::native(name, call))
}

fn constructor(name: &str, call: impl Fn(&[Value]) -> NativeResult + 'static) -> Value {
    Value::function(Function::Native(Native {
        name: Rc::from(name),
        call: Rc::new(call),
        constructor: true,
    }))
}

fn library(members: Vec<(&str, Value)>) -> Value {
    let mut object = Object::new(ObjectClass::Namespace);
    for (name, value) in members {
        object.set(name, value);
    }
    Value::object(object)
}

fn math(name: &'static str, f: fn(f64) -> f64) -> (&'static str, Value) {
    (name, native(name, move |args| Ok(Value::Number(f(arg(args, 0).to_number())))))
}

/// Declare the builtin globals in `scope`.
pub fn install(scope: &Rc<Scope>) {
    let globals = [
        ("undefined", Value::Undefined),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("Math", math_library()),
        ("Object", object_library()),
        ("JSON", library(vec![("stringify", native("stringify", stringify))])),
        ("Array", array_library()),
        ("String", native("String", |args| Ok(Value::string(args.first().map(Value::to_js_string).unwrap_or_default())))),
        ("Number", native("Number", |args| Ok(Value::Number(args.first().map_or(0.0, Value::to_number))))),
        ("Boolean", native("Boolean", |args| Ok(Value::Bool(arg(args, 0).truthy())))),
        ("parseInt", native("parseInt", parse_int)),
        ("parseFloat", native("parseFloat", |args| Ok(Value::Number(parse_float(&arg(args, 0).to_js_string()))))),
        ("isNaN", native("isNaN", |args| Ok(Value::Bool(arg(args, 0).to_number().is_nan())))),
        ("isFinite", native("isFinite", |args| Ok(Value::Bool(arg(args, 0).to_number().is_finite())))),
        ("Error", error_constructor("Error")),
        ("TypeError", error_constructor("TypeError")),
        ("RangeError", error_constructor("RangeError")),
        ("console", console()),
    ];
    for (name, value) in globals {
        scope.declare(name, Slot::Value(value), false);
    }
}

fn math_library() -> Value {
    library(vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        math("abs", f64::abs),
        math("floor", f64::floor),
        math("ceil", f64::ceil),
        // JavaScript rounds halves up, Rust away from zero.
        math("round", |n| (n + 0.5).floor()),
        math("sqrt", f64::sqrt),
        math("trunc", f64::trunc),
        math("sign", |n| if n.is_nan() || n == 0.0 { n } else { n.signum() }),
        ("pow", native("pow", |args| Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number()))))),
        ("min", native("min", |args| Ok(Value::Number(fold_numbers(args, f64::INFINITY, f64::min))))),
        ("max", native("max", |args| Ok(Value::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max))))),
    ])
}

fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = f(acc, n);
    }
    acc
}

fn object_library() -> Value {
    library(vec![
        (
            "keys",
            native("keys", |args| {
                let keys = ops::own_keys(&arg(args, 0)).into_iter().map(Value::String).collect();
                Ok(Value::array(keys))
            }),
        ),
        (
            "values",
            native("values", |args| {
                let values = ops::own_entries(&arg(args, 0)).into_iter().map(|(_, v)| v).collect();
                Ok(Value::array(values))
            }),
        ),
        (
            "entries",
            native("entries", |args| {
                let entries = ops::own_entries(&arg(args, 0))
                    .into_iter()
                    .map(|(k, v)| Value::array(vec![Value::String(k), v]))
                    .collect();
                Ok(Value::array(entries))
            }),
        ),
        (
            "assign",
            native("assign", |args| {
                let target = arg(args, 0);
                if target.is_nullish() {
                    return Err(EvalError::Type("cannot convert undefined or null to object".to_string()));
                }
                for source in args.iter().skip(1) {
                    for (key, value) in ops::own_entries(source) {
                        ops::set_property(&target, &key, value)?;
                    }
                }
                Ok(target)
            }),
        ),
        ("freeze", native("freeze", |args| Ok(arg(args, 0)))),
        (
            "fromEntries",
            native("fromEntries", |args| {
                let mut object = Object::new(ObjectClass::Plain);
                for entry in ops::iterate(&arg(args, 0))? {
                    let key = ops::get_property(&entry, "0")?.to_key();
                    object.set(&key, ops::get_property(&entry, "1")?);
                }
                Ok(Value::object(object))
            }),
        ),
    ])
}

fn array_library() -> Value {
    library(vec![
        ("isArray", native("isArray", |args| Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_)))))),
        (
            "from",
            native("from", |args| {
                if args.len() > 1 {
                    return Err(EvalError::unsupported("Array.from with a map function"));
                }
                let source = arg(args, 0);
                match &source {
                    Value::Array(_) | Value::String(_) => Ok(Value::array(ops::iterate(&source)?)),
                    Value::Object(_) => {
                        let len = ops::get_property(&source, "length")?.to_number();
                        let len = if len.is_finite() && len > 0.0 { ops::check_array_length(len as usize)? } else { 0 };
                        let items = (0..len)
                            .map(|i| ops::get_property(&source, &i.to_string()))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Value::array(items))
                    }
                    _ => Ok(Value::array(Vec::new())),
                }
            }),
        ),
    ])
}

fn error_constructor(name: &'static str) -> Value {
    constructor(name, move |args| {
        let message = match arg(args, 0) {
            Value::Undefined => String::new(),
            message => message.to_js_string(),
        };
        Ok(error_object(name, &message))
    })
}

fn console() -> Value {
    let log = |name: &'static str| {
        (
            name,
            native(name, move |args| {
                let line: Vec<String> = args.iter().map(Value::to_js_string).collect();
                tracing::debug!(target: "styleslice::sandbox", method = name, "{}", line.join(" "));
                Ok(Value::Undefined)
            }),
        )
    };
    library(vec![log("log"), log("info"), log("warn"), log("error"), log("debug")])
}

fn stringify(args: &[Value]) -> NativeResult {
    let value = arg(args, 0);
    if matches!(value, Value::Undefined | Value::Function(_)) {
        return Ok(Value::Undefined);
    }
    let json = value.to_json();
    let text = if arg(args, 2).truthy() {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    text.map(Value::string)
        .map_err(|e| EvalError::Type(format!("cannot serialize value: {e}")))
}

fn parse_int(args: &[Value]) -> NativeResult {
    let text = arg(args, 0).to_js_string();
    let mut text = text.trim();
    let negative = text.starts_with('-');
    if let Some(rest) = text.strip_prefix('-').or_else(|| text.strip_prefix('+')) {
        text = rest;
    }
    let mut radix = match arg(args, 1) {
        Value::Undefined => 10,
        radix => radix.to_number() as u32,
    };
    if radix == 0 {
        radix = 10;
    }
    if (radix == 16 || arg(args, 1).is_nullish())
        && let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
    {
        text = rest;
        radix = 16;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let digits: String = text.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    let mut n = 0.0;
    for digit in digits.chars().filter_map(|c| c.to_digit(radix)) {
        n = n * f64::from(radix) + f64::from(digit);
    }
    Ok(Value::Number(if negative { -n } else { n }))
}

/// The longest numeric prefix of `text`, as `parseFloat` reads it.
fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    for prefix in ["Infinity", "+Infinity"] {
        if text.starts_with(prefix) {
            return f64::INFINITY;
        }
    }
    if text.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    let bytes = text.as_bytes();
    let mut end = 0;
    let mut best = None;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if !seen_exp && best.is_some() => {
                seen_exp = true;
                if matches!(bytes.get(end + 1), Some(b'+' | b'-')) {
                    end += 1;
                }
                end += 1;
                continue;
            }
            _ => break,
        }
        end += 1;
        if let Ok(n) = text[..end].parse::<f64>() {
            best = Some(n);
        }
    }
    best.unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        let scope = Scope::root();
        install(&scope);
        let Some(Slot::Value(Value::Function(function))) = scope.lookup(name).map(|b| b.slot) else {
            panic!("{name} is not a global function");
        };
        let Function::Native(native) = &*function else {
            panic!("{name} is not native");
        };
        (native.call)(args).unwrap()
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(call("parseInt", &[Value::string("12px")]).to_number(), 12.0);
        assert_eq!(call("parseInt", &[Value::string("-0x1f")]).to_number(), -31.0);
        assert!(call("parseInt", &[Value::string("px")]).to_number().is_nan());
        assert_eq!(call("parseFloat", &[Value::string("1.5rem")]).to_number(), 1.5);
        assert_eq!(call("parseFloat", &[Value::string(".5e2x")]).to_number(), 50.0);
        assert!(call("parseFloat", &[Value::string("e5")]).to_number().is_nan());
    }

    #[test]
    fn test_error_constructors() {
        let error = call("TypeError", &[Value::string("bad")]);
        assert_eq!(error.to_js_string(), "TypeError: bad");
        assert_eq!(error.describe(), "error");
    }

    #[test]
    fn test_rounding_matches_javascript() {
        let scope = Scope::root();
        install(&scope);
        let Some(Slot::Value(math)) = scope.lookup("Math").map(|b| b.slot) else {
            panic!("Math missing");
        };
        let Value::Function(round) = ops::get_property(&math, "round").unwrap() else {
            panic!("Math.round missing");
        };
        let Function::Native(round) = &*round else {
            panic!("Math.round is not native");
        };
        assert_eq!((round.call)(&[Value::Number(-2.5)]).unwrap().to_number(), -2.0);
        assert_eq!((round.call)(&[Value::Number(2.5)]).unwrap().to_number(), 3.0);
    }
}
