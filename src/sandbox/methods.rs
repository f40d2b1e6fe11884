//! Builtin methods of arrays, strings, numbers and functions.

use std::cmp::Ordering;
use std::rc::Rc;

use super::error::EvalError;
use super::interp::{EvalResult, Interpreter};
use super::ops;
use super::value::{Function, Value};

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

/// A relative index argument (`slice(-2)`) clamped to `0..=len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let len = len as f64;
    let index = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
    index as usize
}

fn callback(value: &Value, method: &str) -> EvalResult<Rc<Function>> {
    match value {
        Value::Function(function) => Ok(function.clone()),
        other => Err(EvalError::Type(format!("{} is not a function (in {method})", other.describe()))),
    }
}

impl Interpreter<'_> {
    /// Built-in methods cost steps in proportion to the receiver and result.
    pub(super) fn call_builtin_method(&mut self, this: &Value, name: &str, args: Vec<Value>) -> EvalResult {
        self.charge(ops::size_of(this))?;
        let result = self.builtin_method(this, name, args)?;
        self.charge(ops::size_of(&result))?;
        Ok(result)
    }

    fn builtin_method(&mut self, this: &Value, name: &str, args: Vec<Value>) -> EvalResult {
        match this {
            Value::Array(_) => self.array_method(this, name, args),
            Value::String(text) => string_method(text, name, &args),
            Value::Number(n) => match name {
                "toFixed" => {
                    let digits = arg(&args, 0).to_number();
                    let digits = if digits.is_nan() { 0.0 } else { digits };
                    if !(0.0..=100.0).contains(&digits) {
                        return Err(EvalError::Range("toFixed() digits out of range".to_string()));
                    }
                    Ok(Value::string(format!("{:.*}", digits as usize, n)))
                }
                _ => {
                    let radix = match arg(&args, 0) {
                        Value::Undefined => 10,
                        radix => radix.to_number() as u32,
                    };
                    Ok(Value::string(ops::number_to_radix(*n, radix)?))
                }
            },
            Value::Function(function) => match name {
                "call" => {
                    let mut args = args.into_iter();
                    let this = args.next().unwrap_or_default();
                    self.call_function(function, this, args.collect())
                }
                "apply" => {
                    let this = arg(&args, 0);
                    let list = match arg(&args, 1) {
                        Value::Undefined | Value::Null => Vec::new(),
                        list => ops::iterate(&list)?,
                    };
                    self.call_function(function, this, list)
                }
                _ => Ok(Value::function(Function::Bound {
                    target: function.clone(),
                    this: arg(&args, 0),
                })),
            },
            Value::Object(object) => match name {
                "hasOwnProperty" => Ok(Value::Bool(object.borrow().contains(&arg(&args, 0).to_key()))),
                _ => Ok(Value::string(this.to_js_string())),
            },
            other => Err(EvalError::Type(format!("{}.{name} is not a function", other.describe()))),
        }
    }

    fn array_method(&mut self, this: &Value, name: &str, args: Vec<Value>) -> EvalResult {
        let Value::Array(cell) = this else {
            return Err(EvalError::Type(format!("{name} called on a non-array")));
        };
        match name {
            "push" => {
                let mut items = cell.borrow_mut();
                ops::check_array_length(items.len() + args.len())?;
                items.extend(args);
                Ok(Value::Number(items.len() as f64))
            }
            "pop" => Ok(cell.borrow_mut().pop().unwrap_or_default()),
            "shift" => {
                let mut items = cell.borrow_mut();
                Ok(if items.is_empty() { Value::Undefined } else { items.remove(0) })
            }
            "unshift" => {
                let mut items = cell.borrow_mut();
                ops::check_array_length(items.len() + args.len())?;
                items.splice(0..0, args);
                Ok(Value::Number(items.len() as f64))
            }
            "reverse" => {
                cell.borrow_mut().reverse();
                Ok(this.clone())
            }
            "slice" => {
                let items = cell.borrow();
                let start = relative_index(&arg(&args, 0), items.len(), 0);
                let end = relative_index(&arg(&args, 1), items.len(), items.len());
                Ok(Value::array(items.get(start..end.max(start)).map(<[Value]>::to_vec).unwrap_or_default()))
            }
            "concat" => {
                let mut items = cell.borrow().clone();
                for value in args {
                    match value {
                        Value::Array(other) => {
                            let other = other.borrow();
                            ops::check_array_length(items.len() + other.len())?;
                            items.extend(other.iter().cloned());
                        }
                        value => items.push(value),
                    }
                }
                Ok(Value::array(items))
            }
            "join" => {
                let separator = match arg(&args, 0) {
                    Value::Undefined => ",".to_string(),
                    separator => separator.to_js_string(),
                };
                let parts: Vec<String> = cell
                    .borrow()
                    .iter()
                    .map(|item| if item.is_nullish() { String::new() } else { item.to_js_string() })
                    .collect();
                let total = parts.iter().map(String::len).sum::<usize>()
                    + separator.len().saturating_mul(parts.len().saturating_sub(1));
                ops::check_string_length(total)?;
                Ok(Value::string(parts.join(&separator)))
            }
            "toString" => Ok(Value::string(this.to_js_string())),
            "indexOf" => {
                let needle = arg(&args, 0);
                let position = cell.borrow().iter().position(|item| item.strict_equals(&needle));
                Ok(Value::Number(position.map_or(-1.0, |i| i as f64)))
            }
            "includes" => {
                let needle = arg(&args, 0);
                let found = cell.borrow().iter().any(|item| {
                    item.strict_equals(&needle)
                        || matches!((item, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
                });
                Ok(Value::Bool(found))
            }
            "flat" => {
                let depth = match arg(&args, 0) {
                    Value::Undefined => 1,
                    depth => depth.to_number().max(0.0) as usize,
                };
                let mut out = Vec::new();
                flatten(&cell.borrow(), depth, &mut out)?;
                Ok(Value::array(out))
            }
            "sort" => {
                let compare = match arg(&args, 0) {
                    Value::Undefined => None,
                    value => Some(callback(&value, "sort")?),
                };
                let mut items = cell.borrow().clone();
                self.sort(&mut items, compare.as_ref())?;
                *cell.borrow_mut() = items;
                Ok(this.clone())
            }
            _ => {
                let items = cell.borrow().clone();
                self.array_iteration(items, this, name, args)
            }
        }
    }

    /// Methods that call back into interpreted code. They run over a snapshot
    /// so callbacks may mutate the array.
    fn array_iteration(&mut self, items: Vec<Value>, this: &Value, name: &str, args: Vec<Value>) -> EvalResult {
        let f = callback(&arg(&args, 0), name)?;
        let call = |interp: &mut Self, item: &Value, i: usize| {
            interp.call_function(&f, Value::Undefined, vec![item.clone(), Value::Number(i as f64), this.clone()])
        };
        match name {
            "forEach" => {
                for (i, item) in items.iter().enumerate() {
                    call(self, item, i)?;
                }
                Ok(Value::Undefined)
            }
            "map" => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(call(self, item, i)?);
                }
                Ok(Value::array(out))
            }
            "flatMap" => {
                let mut out = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    match call(self, item, i)? {
                        Value::Array(inner) => {
                            let inner = inner.borrow();
                            ops::check_array_length(out.len() + inner.len())?;
                            out.extend(inner.iter().cloned());
                        }
                        value => out.push(value),
                    }
                }
                Ok(Value::array(out))
            }
            "filter" => {
                let mut out = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    if call(self, item, i)?.truthy() {
                        out.push(item.clone());
                    }
                }
                Ok(Value::array(out))
            }
            "find" | "findIndex" => {
                for (i, item) in items.iter().enumerate() {
                    if call(self, item, i)?.truthy() {
                        return Ok(if name == "find" { item.clone() } else { Value::Number(i as f64) });
                    }
                }
                Ok(if name == "find" { Value::Undefined } else { Value::Number(-1.0) })
            }
            "some" => {
                for (i, item) in items.iter().enumerate() {
                    if call(self, item, i)?.truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            "every" => {
                for (i, item) in items.iter().enumerate() {
                    if !call(self, item, i)?.truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "reduce" => {
                let mut entries = items.iter().enumerate();
                let mut acc = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match entries.next() {
                        Some((_, first)) => first.clone(),
                        None => {
                            return Err(EvalError::Type("reduce of empty array with no initial value".to_string()));
                        }
                    },
                };
                for (i, item) in entries {
                    acc = self.call_function(
                        &f,
                        Value::Undefined,
                        vec![acc, item.clone(), Value::Number(i as f64), this.clone()],
                    )?;
                }
                Ok(acc)
            }
            _ => Err(EvalError::Type(format!("array.{name} is not a function"))),
        }
    }

    /// Stable insertion sort; the comparator may throw.
    fn sort(&mut self, items: &mut [Value], compare: Option<&Rc<Function>>) -> EvalResult<()> {
        for i in 1..items.len() {
            let mut j = i;
            while j > 0 {
                self.step()?;
                let order = match compare {
                    Some(f) => {
                        let result =
                            self.call_function(f, Value::Undefined, vec![items[j - 1].clone(), items[j].clone()])?;
                        let n = result.to_number();
                        if n > 0.0 { Ordering::Greater } else { Ordering::Less }
                    }
                    None => default_order(&items[j - 1], &items[j]),
                };
                if order != Ordering::Greater {
                    break;
                }
                items.swap(j - 1, j);
                j -= 1;
            }
        }
        Ok(())
    }
}

/// Default sort order: `undefined` last, everything else by string form.
fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        _ => a.to_js_string().cmp(&b.to_js_string()),
    }
}

fn flatten(items: &[Value], depth: usize, out: &mut Vec<Value>) -> EvalResult<()> {
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => flatten(&inner.borrow(), depth - 1, out)?,
            item => {
                ops::check_array_length(out.len() + 1)?;
                out.push(item.clone());
            }
        }
    }
    Ok(())
}

fn string_method(text: &str, name: &str, args: &[Value]) -> EvalResult {
    let chars: Vec<char> = text.chars().collect();
    let string_arg = |i: usize| arg(args, i).to_js_string();
    Ok(match name {
        "toUpperCase" => Value::string(text.to_uppercase()),
        "toLowerCase" => Value::string(text.to_lowercase()),
        "trim" => Value::string(text.trim()),
        "trimStart" => Value::string(text.trim_start()),
        "trimEnd" => Value::string(text.trim_end()),
        "toString" => Value::string(text),
        "charAt" => {
            let i = arg(args, 0).to_number();
            let i = if i.is_nan() { 0.0 } else { i };
            let c = if i >= 0.0 { chars.get(i as usize) } else { None };
            Value::string(c.map(char::to_string).unwrap_or_default())
        }
        "concat" => {
            let mut out = text.to_string();
            for value in args {
                out.push_str(&value.to_js_string());
            }
            Value::string(out)
        }
        "startsWith" => Value::Bool(text.starts_with(&string_arg(0))),
        "endsWith" => Value::Bool(text.ends_with(&string_arg(0))),
        "includes" => Value::Bool(text.contains(&string_arg(0))),
        "indexOf" => {
            let needle = string_arg(0);
            let position = text
                .find(&needle)
                .map(|byte| text[..byte].chars().count() as f64)
                .unwrap_or(-1.0);
            Value::Number(position)
        }
        "slice" => {
            let start = relative_index(&arg(args, 0), chars.len(), 0);
            let end = relative_index(&arg(args, 1), chars.len(), chars.len());
            Value::string(chars.get(start..end.max(start)).unwrap_or_default().iter().collect::<String>())
        }
        "substring" => {
            let clamp = |value: Value, default: usize| match value {
                Value::Undefined => default,
                value => {
                    let n = value.to_number();
                    if n.is_nan() { 0 } else { n.clamp(0.0, chars.len() as f64) as usize }
                }
            };
            let a = clamp(arg(args, 0), 0);
            let b = clamp(arg(args, 1), chars.len());
            Value::string(chars[a.min(b)..a.max(b)].iter().collect::<String>())
        }
        "split" => match arg(args, 0) {
            Value::Undefined => Value::array(vec![Value::string(text)]),
            separator => {
                let separator = separator.to_js_string();
                let parts: Vec<Value> = if separator.is_empty() {
                    chars.iter().map(|c| Value::string(c.to_string())).collect()
                } else {
                    text.split(separator.as_str()).map(Value::string).collect()
                };
                Value::array(parts)
            }
        },
        "replace" => Value::string(text.replacen(&string_arg(0), &string_arg(1), 1)),
        "replaceAll" => Value::string(text.replace(&string_arg(0), &string_arg(1))),
        "repeat" => {
            let count = arg(args, 0).to_number();
            if !(0.0..1e6).contains(&count) {
                return Err(EvalError::Range("invalid count value".to_string()));
            }
            let total = text.len().checked_mul(count as usize).unwrap_or(usize::MAX);
            ops::check_string_length(total)?;
            Value::string(text.repeat(count as usize))
        }
        "padStart" | "padEnd" => {
            let target = arg(args, 0).to_number();
            let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
            let fill = match arg(args, 1) {
                Value::Undefined => " ".to_string(),
                fill => fill.to_js_string(),
            };
            if target <= chars.len() || fill.is_empty() {
                return Ok(Value::string(text));
            }
            ops::check_string_length(target)?;
            let padding: String = fill.chars().cycle().take(target - chars.len()).collect();
            if name == "padStart" {
                Value::string(format!("{padding}{text}"))
            } else {
                Value::string(format!("{text}{padding}"))
            }
        }
        _ => return Err(EvalError::Type(format!("string.{name} is not a function"))),
    })
}
