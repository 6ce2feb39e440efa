//! Dynamic values manipulated by Sparklet scripts
//!
//! State, params, helper results and interpolation results are all [`Value`]s.
//! Conversions to and from `serde_json::Value` sit at the boundary with
//! definitions and persisted data.

use crate::parser::ast::FunctionDef;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// Object storage; insertion order is preserved like JS objects
pub type Object = IndexMap<String, Value>;

/// A runtime value
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
    Function(Callable),
}

/// Anything that can be invoked with `(...)`
#[derive(Debug, Clone)]
pub enum Callable {
    /// Arrow function or `function` literal, with its captured bindings
    Closure(Rc<Closure>),
    /// A global such as `Math.floor` or `parseInt`
    Builtin(&'static str),
    /// `helpers.<name>` inside an action
    Helper(String),
    /// `helpers.scheduleAction(name, params, delayMs)`
    ScheduleAction,
    /// `helpers.cancelAction(name)`
    CancelAction,
}

/// A function value. Bindings visible at creation are copied in.
#[derive(Debug)]
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub captured: Vec<(String, Value)>,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn object() -> Self {
        Value::Object(Object::new())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a dotted path (`form.name`) through nested objects
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// JS truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Result of the `typeof` operator
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
        }
    }

    /// Numeric coercion (`Number(value)`)
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => string_to_number(&single.to_js_string()),
                _ => f64::NAN,
            },
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// String coercion (`String(value)`)
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
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
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(_) => "function".to_string(),
        }
    }

    /// Text shown when a value is substituted into a string or rendered as
    /// text: nullish values vanish and structured values print as JSON.
    pub fn to_display_text(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Array(_) | Value::Object(_) => self.to_json().to_string(),
            other => other.to_js_string(),
        }
    }

    /// Convert from JSON
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON the way `JSON.stringify` does: `undefined` and
    /// functions are dropped from objects and become `null` inside arrays.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .filter(|(_, v)| !matches!(v, Value::Undefined | Value::Function(_)))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// `===`. Arrays and objects compare structurally since scripts work on
    /// copies and identity carries no meaning.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.strict_equals(other)))
            }
            (Value::Function(a), Value::Function(b)) => a.same_as(b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                let (a, b) = (self.to_number(), other.to_number());
                a == b
            }
            _ => self.strict_equals(other),
        }
    }

    /// SameValueZero, used by `includes`
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl Callable {
    fn same_as(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Closure(a), Callable::Closure(b)) => Rc::ptr_eq(a, b),
            (Callable::Builtin(a), Callable::Builtin(b)) => a == b,
            (Callable::Helper(a), Callable::Helper(b)) => a == b,
            (Callable::ScheduleAction, Callable::ScheduleAction)
            | (Callable::CancelAction, Callable::CancelAction) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
            other => write!(f, "{}", other.to_js_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Format a number the way JS prints it: `3`, `0.5`, `NaN`, `-Infinity`
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    // Reject forms Rust accepts but JS does not ("inf", "nan")
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::string("false").is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(Value::string(" 42 ").to_number(), 42.0);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert!(Value::string("12px").to_number().is_nan());
        assert!(Value::string("inf").to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert_eq!(Value::Array(vec![Value::Number(7.0)]).to_number(), 7.0);
    }

    #[test]
    fn test_json_conversion_keeps_integers() {
        let value = Value::from_json(&json!({"count": 3, "ratio": 0.5, "tags": ["a", null]}));
        assert_eq!(value.to_json(), json!({"count": 3, "ratio": 0.5, "tags": ["a", null]}));
    }

    #[test]
    fn test_json_drops_undefined_members() {
        let mut map = Object::new();
        map.insert("a".to_string(), Value::Undefined);
        map.insert("b".to_string(), Value::Number(1.0));
        let value = Value::Array(vec![Value::Object(map), Value::Undefined]);
        assert_eq!(value.to_json(), json!([{"b": 1}, null]));
    }

    #[test]
    fn test_equality() {
        assert!(Value::Number(1.0).loose_equals(&Value::string("1")));
        assert!(!Value::Number(1.0).strict_equals(&Value::string("1")));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(Value::from(json!(["X", ""])).strict_equals(&Value::from(json!(["X", ""]))));
    }

    #[test]
    fn test_display_text() {
        assert_eq!(Value::Undefined.to_display_text(), "");
        assert_eq!(Value::Number(2.0).to_display_text(), "2");
        assert_eq!(Value::from(json!({"a": 1})).to_display_text(), "{\"a\":1}");
        assert_eq!(Value::from(json!([1, null, 3])).to_js_string(), "1,,3");
    }

    #[test]
    fn test_get_path() {
        let value = Value::from(json!({"form": {"name": "Ada"}, "list": [10, 20]}));
        assert_eq!(value.get_path("form.name"), Some(&Value::string("Ada")));
        assert_eq!(value.get_path("list.1"), Some(&Value::Number(20.0)));
        assert_eq!(value.get_path("missing.name"), None);
    }
}
