//! Operators and property access.

use std::cmp::Ordering;
use std::rc::Rc;

use swc_ecma_ast::{AssignOp, BinaryOp};

use super::error::EvalError;
use super::value::{ObjectClass, Value, format_number};

type EvalResult<T = Value> = Result<T, EvalError>;

/// Longest array the sandbox will build. Larger lengths raise a `RangeError`.
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Longest string, in bytes, the sandbox will build.
pub const MAX_STRING_LENGTH: usize = 1 << 24;

/// Largest valid array length in JavaScript.
const JS_MAX_ARRAY_LENGTH: f64 = 4_294_967_295.0;

/// A requested array length, validated and capped.
pub fn array_length(len: f64) -> EvalResult<usize> {
    if !(0.0..=JS_MAX_ARRAY_LENGTH).contains(&len) || len.fract() != 0.0 {
        return Err(EvalError::Range("invalid array length".to_string()));
    }
    check_array_length(len as usize)
}

pub fn check_array_length(len: usize) -> EvalResult<usize> {
    if len > MAX_ARRAY_LENGTH {
        return Err(EvalError::Range(format!(
            "array length {len} exceeds the limit of {MAX_ARRAY_LENGTH}"
        )));
    }
    Ok(len)
}

pub fn check_string_length(len: usize) -> EvalResult<usize> {
    if len > MAX_STRING_LENGTH {
        return Err(EvalError::Range("invalid string length".to_string()));
    }
    Ok(len)
}

/// Elements or bytes held directly by `value`, for step accounting.
pub fn size_of(value: &Value) -> u64 {
    match value {
        Value::Array(items) => items.borrow().len() as u64,
        Value::String(text) => text.len() as u64,
        _ => 0,
    }
}

const ARRAY_METHODS: &[&str] = &[
    "concat", "every", "filter", "find", "findIndex", "flat", "flatMap", "forEach", "includes", "indexOf",
    "join", "map", "pop", "push", "reduce", "reverse", "shift", "slice", "some", "sort", "unshift", "toString",
];

const STRING_METHODS: &[&str] = &[
    "charAt", "concat", "endsWith", "includes", "indexOf", "padEnd", "padStart", "repeat", "replace",
    "replaceAll", "slice", "split", "startsWith", "substring", "toLowerCase", "toString", "toUpperCase",
    "trim", "trimEnd", "trimStart",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];

const FUNCTION_METHODS: &[&str] = &["apply", "bind", "call"];

const OBJECT_METHODS: &[&str] = &["hasOwnProperty", "toString"];

/// Whether `object.key(...)` has a builtin implementation.
pub fn has_builtin_method(object: &Value, key: &str) -> bool {
    let methods = match object {
        Value::Array(_) => ARRAY_METHODS,
        Value::String(_) => STRING_METHODS,
        Value::Number(_) => NUMBER_METHODS,
        Value::Function(_) => FUNCTION_METHODS,
        Value::Object(_) => OBJECT_METHODS,
        _ => return false,
    };
    methods.contains(&key)
}

pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() as i64) as i32
}

fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}

/// Binary operator of a compound assignment such as `+=`.
pub fn compound_op(op: AssignOp) -> Option<BinaryOp> {
    Some(match op {
        AssignOp::AddAssign => BinaryOp::Add,
        AssignOp::SubAssign => BinaryOp::Sub,
        AssignOp::MulAssign => BinaryOp::Mul,
        AssignOp::DivAssign => BinaryOp::Div,
        AssignOp::ModAssign => BinaryOp::Mod,
        AssignOp::ExpAssign => BinaryOp::Exp,
        AssignOp::LShiftAssign => BinaryOp::LShift,
        AssignOp::RShiftAssign => BinaryOp::RShift,
        AssignOp::ZeroFillRShiftAssign => BinaryOp::ZeroFillRShift,
        AssignOp::BitOrAssign => BinaryOp::BitOr,
        AssignOp::BitXorAssign => BinaryOp::BitXor,
        AssignOp::BitAndAssign => BinaryOp::BitAnd,
        _ => return None,
    })
}

/// Evaluate a non-short-circuiting binary operator.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    let number = |f: fn(f64, f64) -> f64| Ok(Value::Number(f(left.to_number(), right.to_number())));
    let int = |f: fn(i32, i32) -> i32| {
        Ok(Value::Number(f64::from(f(to_int32(left.to_number()), to_int32(right.to_number())))))
    };
    match op {
        BinaryOp::Add => {
            let stringy = |v: &Value| !matches!(v, Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_));
            if stringy(left) || stringy(right) {
                let (left, right) = (left.to_js_string(), right.to_js_string());
                check_string_length(left.len() + right.len())?;
                Ok(Value::string(format!("{left}{right}")))
            } else {
                number(|a, b| a + b)
            }
        }
        BinaryOp::Sub => number(|a, b| a - b),
        BinaryOp::Mul => number(|a, b| a * b),
        BinaryOp::Div => number(|a, b| a / b),
        BinaryOp::Mod => number(|a, b| a % b),
        BinaryOp::Exp => number(f64::powf),
        BinaryOp::BitAnd => int(|a, b| a & b),
        BinaryOp::BitOr => int(|a, b| a | b),
        BinaryOp::BitXor => int(|a, b| a ^ b),
        BinaryOp::LShift => int(|a, b| a.wrapping_shl(b as u32 & 31)),
        BinaryOp::RShift => int(|a, b| a.wrapping_shr(b as u32 & 31)),
        BinaryOp::ZeroFillRShift => {
            let shift = to_uint32(right.to_number()) & 31;
            Ok(Value::Number(f64::from(to_uint32(left.to_number()) >> shift)))
        }
        BinaryOp::EqEqEq => Ok(Value::Bool(left.strict_equals(right))),
        BinaryOp::NotEqEq => Ok(Value::Bool(!left.strict_equals(right))),
        BinaryOp::EqEq => Ok(Value::Bool(left.loose_equals(right))),
        BinaryOp::NotEq => Ok(Value::Bool(!left.loose_equals(right))),
        BinaryOp::Lt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Less))),
        BinaryOp::Gt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Greater))),
        BinaryOp::LtEq => Ok(Value::Bool(matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal)))),
        BinaryOp::GtEq => Ok(Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        BinaryOp::In => match right {
            Value::Object(object) => Ok(Value::Bool(object.borrow().contains(&left.to_key()))),
            Value::Array(items) => {
                let key = left.to_key();
                let len = items.borrow().len();
                Ok(Value::Bool(&*key == "length" || index_of_key(&key).is_some_and(|i| i < len)))
            }
            other => Err(EvalError::Type(format!("cannot use `in` on {}", other.describe()))),
        },
        BinaryOp::InstanceOf => instance_of(left, right),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing => {
            Err(EvalError::unsupported("short-circuit operators outside expressions"))
        }
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    left.to_number().partial_cmp(&right.to_number())
}

fn instance_of(left: &Value, right: &Value) -> EvalResult {
    let Value::Function(constructor) = right else {
        return Err(EvalError::Type(format!(
            "right-hand side of `instanceof` is {}, not a function",
            right.describe()
        )));
    };
    let name = constructor.name();
    Ok(Value::Bool(match left {
        Value::Object(object) => {
            let object = object.borrow();
            match object.class {
                ObjectClass::Error => {
                    &*name == "Error" || object.get("name").is_some_and(|n| n.to_js_string() == *name)
                }
                _ => &*name == "Object",
            }
        }
        Value::Array(_) => matches!(&*name, "Array" | "Object"),
        Value::Function(_) => matches!(&*name, "Function" | "Object"),
        _ => false,
    }))
}

fn index_of_key(key: &str) -> Option<usize> {
    if key == "0" || (!key.starts_with('0') && !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())) {
        key.parse().ok()
    } else {
        None
    }
}

/// `object[key]`
pub fn get_property(object: &Value, key: &str) -> EvalResult {
    Ok(match object {
        Value::Undefined | Value::Null => {
            return Err(EvalError::Type(format!(
                "cannot read properties of {} (reading '{key}')",
                object.describe()
            )));
        }
        Value::Object(object) => object.borrow().get(key).cloned().unwrap_or_default(),
        Value::Array(items) => {
            let items = items.borrow();
            if key == "length" {
                Value::Number(items.len() as f64)
            } else {
                index_of_key(key)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default()
            }
        }
        Value::String(text) => {
            if key == "length" {
                Value::Number(text.encode_utf16().count() as f64)
            } else {
                index_of_key(key)
                    .and_then(|i| text.chars().nth(i))
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or_default()
            }
        }
        Value::Function(function) if key == "name" => Value::String(function.name()),
        Value::Bool(_) | Value::Number(_) | Value::Function(_) => Value::Undefined,
    })
}

/// `object[key] = value`
pub fn set_property(object: &Value, key: &str, value: Value) -> EvalResult<()> {
    match object {
        Value::Undefined | Value::Null => Err(EvalError::Type(format!(
            "cannot set properties of {} (setting '{key}')",
            object.describe()
        ))),
        Value::Object(object) => {
            let mut object = object.borrow_mut();
            if object.class == ObjectClass::Namespace {
                return Err(EvalError::Type(format!("cannot assign to read only property '{key}'")));
            }
            object.set(key, value);
            Ok(())
        }
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if key == "length" {
                let len = array_length(value.to_number())?;
                items.resize(len, Value::Undefined);
                return Ok(());
            }
            let Some(index) = index_of_key(key) else {
                return Err(EvalError::unsupported("named properties on arrays"));
            };
            if index >= items.len() {
                items.resize(check_array_length(index + 1)?, Value::Undefined);
            }
            items[index] = value;
            Ok(())
        }
        // Assignments to primitives are silently dropped.
        _ => Ok(()),
    }
}

/// `delete object[key]`
pub fn delete_property(object: &Value, key: &str) -> EvalResult<bool> {
    match object {
        Value::Undefined | Value::Null => Err(EvalError::Type(format!(
            "cannot convert {} to object",
            object.describe()
        ))),
        Value::Object(object) => {
            let mut object = object.borrow_mut();
            if object.class == ObjectClass::Namespace {
                return Err(EvalError::Type(format!("cannot delete property '{key}'")));
            }
            object.remove(key);
            Ok(true)
        }
        Value::Array(items) => {
            if let Some(i) = index_of_key(key)
                && let Some(slot) = items.borrow_mut().get_mut(i)
            {
                *slot = Value::Undefined;
            }
            Ok(true)
        }
        _ => Ok(true),
    }
}

/// Enumerable own properties, as `Object.entries` sees them.
pub fn own_entries(value: &Value) -> Vec<(Rc<str>, Value)> {
    match value {
        Value::Object(object) => object.borrow().entries(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, item)| (Rc::from(i.to_string()), item.clone()))
            .collect(),
        Value::String(text) => text
            .chars()
            .enumerate()
            .map(|(i, c)| (Rc::from(i.to_string()), Value::string(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn own_keys(value: &Value) -> Vec<Rc<str>> {
    match value {
        Value::Object(object) => object.borrow().keys(),
        other => own_entries(other).into_iter().map(|(key, _)| key).collect(),
    }
}

/// Items produced by iterating `value` with `for-of` or spread.
pub fn iterate(value: &Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.borrow().clone()),
        Value::String(text) => {
            check_array_length(text.chars().count())?;
            Ok(text.chars().map(|c| Value::string(c.to_string())).collect())
        }
        other => Err(EvalError::Type(format!("{} is not iterable", other.describe()))),
    }
}

/// `Number.prototype.toString` for the radix forms style code uses.
pub fn number_to_radix(n: f64, radix: u32) -> EvalResult<String> {
    if !(2..=36).contains(&radix) {
        return Err(EvalError::Range("radix must be between 2 and 36".to_string()));
    }
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
        return Ok(format_number(n));
    }
    let negative = n < 0.0;
    let mut rest = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        let digit = (rest % u64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        rest /= u64::from(radix);
        if rest == 0 {
            break;
        }
    }
    if negative {
        digits.push('-');
    }
    Ok(digits.into_iter().rev().collect())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_addition_concatenates_strings_and_objects() {
        let text = binary(BinaryOp::Add, &Value::string("gap-"), &num(4.0)).unwrap();
        assert_eq!(text.to_js_string(), "gap-4");
        let sum = binary(BinaryOp::Add, &num(1.0), &Value::Bool(true)).unwrap();
        assert_eq!(sum.to_number(), 2.0);
        let joined = binary(BinaryOp::Add, &Value::array(vec![num(1.0), num(2.0)]), &num(3.0)).unwrap();
        assert_eq!(joined.to_js_string(), "1,23");
    }

    #[test]
    fn test_comparisons_and_bitwise() {
        assert!(binary(BinaryOp::Lt, &Value::string("a"), &Value::string("b")).unwrap().truthy());
        assert!(!binary(BinaryOp::Lt, &num(f64::NAN), &num(1.0)).unwrap().truthy());
        assert_eq!(binary(BinaryOp::BitOr, &num(5.7), &num(0.0)).unwrap().to_number(), 5.0);
        assert_eq!(binary(BinaryOp::ZeroFillRShift, &num(-1.0), &num(28.0)).unwrap().to_number(), 15.0);
        assert_eq!(binary(BinaryOp::Mod, &num(-7.0), &num(3.0)).unwrap().to_number(), -1.0);
    }

    #[test]
    fn test_property_access() {
        let items = Value::array(vec![num(1.0)]);
        set_property(&items, "2", num(3.0)).unwrap();
        assert_eq!(get_property(&items, "length").unwrap().to_number(), 3.0);
        assert!(get_property(&items, "1").unwrap().is_nullish());
        assert_eq!(get_property(&Value::string("abc"), "1").unwrap().to_js_string(), "b");
        assert!(matches!(get_property(&Value::Null, "x"), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_lengths_are_capped() {
        let items = Value::array(Vec::new());
        assert!(matches!(set_property(&items, "length", num(5e9)), Err(EvalError::Range(_))));
        assert!(matches!(set_property(&items, "length", num(-1.0)), Err(EvalError::Range(_))));
        assert!(matches!(
            set_property(&items, "length", num((MAX_ARRAY_LENGTH + 1) as f64)),
            Err(EvalError::Range(_))
        ));
        assert!(matches!(
            set_property(&items, &MAX_ARRAY_LENGTH.to_string(), num(1.0)),
            Err(EvalError::Range(_))
        ));
        set_property(&items, "length", num(3.0)).unwrap();
        assert_eq!(size_of(&items), 3);

        let half = Value::string("x".repeat(MAX_STRING_LENGTH / 2 + 1));
        assert!(matches!(binary(BinaryOp::Add, &half, &half), Err(EvalError::Range(_))));
    }

    #[test]
    fn test_radix_strings() {
        assert_eq!(number_to_radix(255.0, 16).unwrap(), "ff");
        assert_eq!(number_to_radix(-5.0, 2).unwrap(), "-101");
        assert!(number_to_radix(1.0, 1).is_err());
    }
}
