//! Built-in globals and methods available to Sparklet scripts
//!
//! Globals (`Math`, `JSON`, `Object`, `Array`, ...) resolve lazily when an
//! identifier is not bound. Methods on arrays, strings and numbers are
//! dispatched by [`Interpreter::call_method`].

use crate::runtime::interpreter::{Interpreter, Limits};
use crate::runtime::value::{format_number, Callable, Object, Value};
use anyhow::{anyhow, Result};
use std::cmp::Ordering;

/// Every callable builtin, by its dotted path
const BUILTINS: &[&str] = &[
    "Math.floor",
    "Math.ceil",
    "Math.round",
    "Math.abs",
    "Math.min",
    "Math.max",
    "Math.pow",
    "Math.sqrt",
    "Math.random",
    "Math.trunc",
    "Math.sign",
    "Math.log",
    "Math.sin",
    "Math.cos",
    "JSON.stringify",
    "JSON.parse",
    "Object.keys",
    "Object.values",
    "Object.entries",
    "Object.assign",
    "Object.fromEntries",
    "Array",
    "Array.isArray",
    "Array.from",
    "Number",
    "Number.isInteger",
    "Number.isFinite",
    "Number.parseFloat",
    "Number.parseInt",
    "String",
    "Boolean",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "Date.now",
];

fn lookup(path: &str) -> Option<&'static str> {
    BUILTINS.iter().copied().find(|name| *name == path)
}

/// Object holding every builtin under `prefix.`
fn namespace(prefix: &str) -> Object {
    let mut map = Object::new();
    for &name in BUILTINS {
        if let Some(member) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('.'))
        {
            map.insert(member.to_string(), Value::Function(Callable::Builtin(name)));
        }
    }
    map
}

/// Resolve a global identifier
pub fn global(name: &str) -> Option<Value> {
    match name {
        "Math" => {
            let mut math = namespace("Math");
            math.insert("PI".to_string(), Value::Number(std::f64::consts::PI));
            math.insert("E".to_string(), Value::Number(std::f64::consts::E));
            Some(Value::Object(math))
        }
        "JSON" | "Object" | "Date" => Some(Value::Object(namespace(name))),
        "NaN" => Some(Value::Number(f64::NAN)),
        "Infinity" => Some(Value::Number(f64::INFINITY)),
        _ => lookup(name).map(|builtin| Value::Function(Callable::Builtin(builtin))),
    }
}

/// Static members of callable globals (`Array.isArray`, `Number.isInteger`)
pub fn static_member(callable: &Callable, name: &str) -> Value {
    match callable {
        Callable::Builtin(base) => lookup(&format!("{}.{}", base, name))
            .map(|builtin| Value::Function(Callable::Builtin(builtin)))
            .unwrap_or_default(),
        _ => Value::Undefined,
    }
}

/// Whether `receiver.name(...)` changes the receiver in place
pub fn is_mutating_method(receiver: &Value, name: &str) -> bool {
    matches!(receiver, Value::Array(_))
        && matches!(
            name,
            "push" | "pop" | "shift" | "unshift" | "splice" | "reverse" | "sort" | "fill"
        )
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn num(args: &[Value], index: usize) -> f64 {
    args.get(index).map(Value::to_number).unwrap_or(f64::NAN)
}

/// Resolve a possibly negative index argument against `len`
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    let n = match value {
        None | Some(Value::Undefined) => return default,
        Some(v) => v.to_number(),
    };
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn expect_function<'a>(args: &'a [Value], method: &str) -> Result<&'a Value> {
    match args.first() {
        Some(f @ Value::Function(_)) => Ok(f),
        other => Err(anyhow!(
            "{} is not a function (in {})",
            other.map(|v| v.type_of()).unwrap_or("undefined"),
            method
        )),
    }
}

fn wants_whole_array(callback: &Value) -> bool {
    matches!(callback, Value::Function(Callable::Closure(c)) if c.def.params.len() >= 3)
}

impl<'h> Interpreter<'h> {
    /// Call a global builtin by path
    pub(crate) fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let value = match name {
            "Math.floor" => Value::Number(num(&args, 0).floor()),
            "Math.ceil" => Value::Number(num(&args, 0).ceil()),
            "Math.round" => Value::Number((num(&args, 0) + 0.5).floor()),
            "Math.abs" => Value::Number(num(&args, 0).abs()),
            "Math.trunc" => Value::Number(num(&args, 0).trunc()),
            "Math.sqrt" => Value::Number(num(&args, 0).sqrt()),
            "Math.log" => Value::Number(num(&args, 0).ln()),
            "Math.sin" => Value::Number(num(&args, 0).sin()),
            "Math.cos" => Value::Number(num(&args, 0).cos()),
            "Math.pow" => Value::Number(num(&args, 0).powf(num(&args, 1))),
            "Math.sign" => {
                let n = num(&args, 0);
                Value::Number(if n == 0.0 || n.is_nan() { n } else { n.signum() })
            }
            "Math.min" | "Math.max" => {
                let is_min = name == "Math.min";
                let mut result = if is_min {
                    f64::INFINITY
                } else {
                    f64::NEG_INFINITY
                };
                for value in &args {
                    let n = value.to_number();
                    if n.is_nan() {
                        return Ok(Value::Number(f64::NAN));
                    }
                    result = if is_min { result.min(n) } else { result.max(n) };
                }
                Value::Number(result)
            }
            "Math.random" => Value::Number(self.host.random()),

            "JSON.stringify" => {
                let value = arg(&args, 0);
                if matches!(value, Value::Undefined | Value::Function(_)) {
                    return Ok(Value::Undefined);
                }
                let json = value.to_json();
                let pretty = match args.get(2) {
                    Some(Value::String(indent)) => !indent.is_empty(),
                    Some(indent) => indent.to_number() > 0.0,
                    None => false,
                };
                let text = if pretty {
                    serde_json::to_string_pretty(&json)?
                } else {
                    serde_json::to_string(&json)?
                };
                Value::String(text)
            }
            "JSON.parse" => {
                let text = arg(&args, 0).to_js_string();
                let json: serde_json::Value =
                    serde_json::from_str(&text).map_err(|e| anyhow!("JSON.parse: {}", e))?;
                Value::from_json(&json)
            }

            "Object.keys" | "Object.values" | "Object.entries" => {
                let entries = object_entries(&arg(&args, 0))?;
                Value::Array(
                    entries
                        .into_iter()
                        .map(|(key, value)| match name {
                            "Object.keys" => Value::String(key),
                            "Object.values" => value,
                            _ => Value::Array(vec![Value::String(key), value]),
                        })
                        .collect(),
                )
            }
            "Object.assign" => {
                let mut args = args.into_iter();
                let mut target = match args.next() {
                    Some(Value::Object(map)) => map,
                    Some(other) if other.is_nullish() => {
                        return Err(anyhow!("Cannot convert undefined or null to object"))
                    }
                    _ => Object::new(),
                };
                for source in args {
                    target.extend(object_entries(&source).unwrap_or_default());
                }
                Value::Object(target)
            }
            "Object.fromEntries" => {
                let mut map = Object::new();
                if let Value::Array(pairs) = arg(&args, 0) {
                    for pair in pairs {
                        if let Value::Array(kv) = pair {
                            let key = kv.first().map(Value::to_js_string).unwrap_or_default();
                            map.insert(key, kv.get(1).cloned().unwrap_or_default());
                        }
                    }
                }
                Value::Object(map)
            }

            "Array" => {
                let length = match args.as_slice() {
                    [Value::Number(n)] => Some(*n),
                    _ => None,
                };
                match length {
                    Some(n) => Value::Array(vec![Value::Undefined; self.limits().array_len(n)?]),
                    None => Value::Array(args),
                }
            }
            "Array.isArray" => Value::Bool(matches!(arg(&args, 0), Value::Array(_))),
            "Array.from" => {
                let items = match arg(&args, 0) {
                    Value::Array(items) => items,
                    Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                    Value::Object(map) => {
                        let len = map.get("length").map(Value::to_number).unwrap_or(0.0);
                        let len = if len.is_nan() || len <= 0.0 {
                            0
                        } else {
                            self.limits().array_len(len.floor().min(u32::MAX as f64))?
                        };
                        vec![Value::Undefined; len]
                    }
                    _ => Vec::new(),
                };
                match args.get(1) {
                    Some(f @ Value::Function(_)) => {
                        let mut mapped = Vec::with_capacity(items.len());
                        for (i, item) in items.iter().enumerate() {
                            mapped.push(self.call_value(f, vec![item.clone(), Value::Number(i as f64)])?);
                        }
                        Value::Array(mapped)
                    }
                    _ => Value::Array(items),
                }
            }

            "Number" => Value::Number(args.first().map(Value::to_number).unwrap_or(0.0)),
            "Number.isInteger" => Value::Bool(
                matches!(arg(&args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0),
            ),
            "Number.isFinite" => {
                Value::Bool(matches!(arg(&args, 0), Value::Number(n) if n.is_finite()))
            }
            "String" => Value::String(args.first().map(Value::to_js_string).unwrap_or_default()),
            "Boolean" => Value::Bool(arg(&args, 0).is_truthy()),
            "parseInt" | "Number.parseInt" => {
                let radix = match args.get(1) {
                    None | Some(Value::Undefined) => 0,
                    Some(v) => v.to_number() as u32,
                };
                Value::Number(parse_int(&arg(&args, 0).to_js_string(), radix))
            }
            "parseFloat" | "Number.parseFloat" => {
                Value::Number(parse_float(&arg(&args, 0).to_js_string()))
            }
            "isNaN" => Value::Bool(num(&args, 0).is_nan()),
            "isFinite" => Value::Bool(num(&args, 0).is_finite()),
            "Date.now" => Value::Number(self.host.now_ms().floor()),

            other => return Err(anyhow!("{} is not a function", other)),
        };
        self.limits().check_size(&value)?;
        Ok(value)
    }

    /// Call `receiver.name(args)` on a primitive or array
    pub(crate) fn call_method(
        &mut self,
        receiver: &mut Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        match receiver {
            Value::Array(items) => self.array_method(items, name, args),
            Value::String(s) => string_method(s, name, &args, self.limits()),
            Value::Number(n) => number_method(*n, name, &args),
            Value::Bool(b) if name == "toString" => Ok(Value::String(b.to_string())),
            other => Err(anyhow!("{}.{} is not a function", other.type_of(), name)),
        }
    }

    fn call_callback(
        &mut self,
        callback: &Value,
        item: &Value,
        index: usize,
        all: &[Value],
    ) -> Result<Value> {
        let mut args = vec![item.clone(), Value::Number(index as f64)];
        if wants_whole_array(callback) {
            args.push(Value::Array(all.to_vec()));
        }
        self.call_value(callback, args)
    }

    fn array_method(&mut self, items: &mut Vec<Value>, name: &str, args: Vec<Value>) -> Result<Value> {
        let len = items.len();
        let value = match name {
            // Mutating
            "push" => {
                items.extend(args);
                Value::Number(items.len() as f64)
            }
            "pop" => items.pop().unwrap_or_default(),
            "shift" => {
                if items.is_empty() {
                    Value::Undefined
                } else {
                    items.remove(0)
                }
            }
            "unshift" => {
                items.splice(0..0, args);
                Value::Number(items.len() as f64)
            }
            "splice" => {
                if args.is_empty() {
                    return Ok(Value::Array(Vec::new()));
                }
                let start = relative_index(args.first(), len, 0);
                let delete = match args.get(1) {
                    None | Some(Value::Undefined) => len - start,
                    Some(v) => {
                        let n = v.to_number();
                        if n.is_nan() || n < 0.0 {
                            0
                        } else {
                            (n as usize).min(len - start)
                        }
                    }
                };
                let inserted: Vec<Value> = args.into_iter().skip(2).collect();
                let removed: Vec<Value> = items.splice(start..start + delete, inserted).collect();
                Value::Array(removed)
            }
            "reverse" => {
                items.reverse();
                Value::Array(items.clone())
            }
            "sort" => {
                let comparator = match args.first() {
                    Some(f @ Value::Function(_)) => Some(f.clone()),
                    Some(Value::Undefined) | None => None,
                    Some(other) => {
                        return Err(anyhow!(
                            "The comparison function must be a function, got {}",
                            other.type_of()
                        ))
                    }
                };
                let sorted = self.merge_sort(std::mem::take(items), comparator.as_ref())?;
                *items = sorted;
                Value::Array(items.clone())
            }
            "fill" => {
                let value = arg(&args, 0);
                let start = relative_index(args.get(1), len, 0);
                let end = relative_index(args.get(2), len, len);
                self.limits().check_copies(&value, end.saturating_sub(start))?;
                for slot in items.iter_mut().take(end).skip(start) {
                    *slot = value.clone();
                }
                Value::Array(items.clone())
            }

            // Non-mutating
            "slice" => {
                let start = relative_index(args.first(), len, 0);
                let end = relative_index(args.get(1), len, len);
                Value::Array(if start < end {
                    items[start..end].to_vec()
                } else {
                    Vec::new()
                })
            }
            "concat" => {
                let mut result = items.clone();
                for value in args {
                    match value {
                        Value::Array(inner) => result.extend(inner),
                        other => result.push(other),
                    }
                    self.limits().check_array_len(result.len())?;
                }
                Value::Array(result)
            }
            "includes" => {
                let needle = arg(&args, 0);
                Value::Bool(items.iter().any(|item| item.same_value_zero(&needle)))
            }
            "indexOf" => {
                let needle = arg(&args, 0);
                Value::Number(
                    items
                        .iter()
                        .position(|item| item.strict_equals(&needle))
                        .map(|i| i as f64)
                        .unwrap_or(-1.0),
                )
            }
            "lastIndexOf" => {
                let needle = arg(&args, 0);
                Value::Number(
                    items
                        .iter()
                        .rposition(|item| item.strict_equals(&needle))
                        .map(|i| i as f64)
                        .unwrap_or(-1.0),
                )
            }
            "join" | "toString" => {
                let separator = match args.first() {
                    Some(Value::Undefined) | None => ",".to_string(),
                    Some(v) => v.to_js_string(),
                };
                let mut text = String::new();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        text.push_str(&separator);
                    }
                    if !item.is_nullish() {
                        text.push_str(&item.to_js_string());
                    }
                    self.limits().check_string_len(text.len())?;
                }
                Value::String(text)
            }
            "at" => {
                let n = num(&args, 0);
                let n = if n.is_nan() { 0.0 } else { n.trunc() };
                let index = if n < 0.0 { len as f64 + n } else { n };
                if index < 0.0 {
                    Value::Undefined
                } else {
                    items.get(index as usize).cloned().unwrap_or_default()
                }
            }
            "flat" => {
                let depth = match args.first() {
                    Some(Value::Undefined) | None => 1.0,
                    Some(v) => v.to_number(),
                };
                let mut result = Vec::new();
                flatten_into(items, depth, &mut result);
                Value::Array(result)
            }

            // Callback-driven
            "map" => {
                let callback = expect_function(&args, name)?;
                let mut result = Vec::with_capacity(len);
                for (i, item) in items.iter().enumerate() {
                    result.push(self.call_callback(callback, item, i, items)?);
                }
                Value::Array(result)
            }
            "filter" => {
                let callback = expect_function(&args, name)?;
                let mut result = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    if self.call_callback(callback, item, i, items)?.is_truthy() {
                        result.push(item.clone());
                    }
                }
                Value::Array(result)
            }
            "forEach" => {
                let callback = expect_function(&args, name)?;
                for (i, item) in items.iter().enumerate() {
                    self.call_callback(callback, item, i, items)?;
                }
                Value::Undefined
            }
            "find" | "findIndex" => {
                let callback = expect_function(&args, name)?;
                let mut found = None;
                for (i, item) in items.iter().enumerate() {
                    if self.call_callback(callback, item, i, items)?.is_truthy() {
                        found = Some(i);
                        break;
                    }
                }
                match (name, found) {
                    ("find", Some(i)) => items[i].clone(),
                    ("find", None) => Value::Undefined,
                    (_, Some(i)) => Value::Number(i as f64),
                    (_, None) => Value::Number(-1.0),
                }
            }
            "some" => {
                let callback = expect_function(&args, name)?;
                let mut result = false;
                for (i, item) in items.iter().enumerate() {
                    if self.call_callback(callback, item, i, items)?.is_truthy() {
                        result = true;
                        break;
                    }
                }
                Value::Bool(result)
            }
            "every" => {
                let callback = expect_function(&args, name)?;
                let mut result = true;
                for (i, item) in items.iter().enumerate() {
                    if !self.call_callback(callback, item, i, items)?.is_truthy() {
                        result = false;
                        break;
                    }
                }
                Value::Bool(result)
            }
            "reduce" => {
                let callback = expect_function(&args, name)?;
                let (mut acc, start) = match args.get(1) {
                    Some(initial) => (initial.clone(), 0),
                    None => match items.first() {
                        Some(first) => (first.clone(), 1),
                        None => return Err(anyhow!("Reduce of empty array with no initial value")),
                    },
                };
                for (i, item) in items.iter().enumerate().skip(start) {
                    acc = self.call_value(
                        callback,
                        vec![acc, item.clone(), Value::Number(i as f64)],
                    )?;
                }
                acc
            }

            other => return Err(anyhow!("array.{} is not a function", other)),
        };
        Ok(value)
    }

    /// Stable merge sort whose comparator may fail
    fn merge_sort(&mut self, mut items: Vec<Value>, comparator: Option<&Value>) -> Result<Vec<Value>> {
        if items.len() <= 1 {
            return Ok(items);
        }
        let right = items.split_off(items.len() / 2);
        let mut left = self.merge_sort(items, comparator)?;
        let mut right = self.merge_sort(right, comparator)?;

        let mut merged = Vec::with_capacity(left.len() + right.len());
        let (mut i, mut j) = (0, 0);
        while i < left.len() && j < right.len() {
            if self.sort_order(&left[i], &right[j], comparator)? > 0.0 {
                merged.push(std::mem::take(&mut right[j]));
                j += 1;
            } else {
                merged.push(std::mem::take(&mut left[i]));
                i += 1;
            }
        }
        merged.extend(left.drain(i..));
        merged.extend(right.drain(j..));
        Ok(merged)
    }

    fn sort_order(&mut self, a: &Value, b: &Value, comparator: Option<&Value>) -> Result<f64> {
        match (a, b) {
            (Value::Undefined, Value::Undefined) => return Ok(0.0),
            (Value::Undefined, _) => return Ok(1.0),
            (_, Value::Undefined) => return Ok(-1.0),
            _ => {}
        }
        match comparator {
            Some(f) => {
                let order = self.call_value(f, vec![a.clone(), b.clone()])?.to_number();
                Ok(if order.is_nan() { 0.0 } else { order })
            }
            None => Ok(match a.to_js_string().cmp(&b.to_js_string()) {
                Ordering::Less => -1.0,
                Ordering::Equal => 0.0,
                Ordering::Greater => 1.0,
            }),
        }
    }
}

fn flatten_into(items: &[Value], depth: f64, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => flatten_into(inner, depth - 1.0, out),
            other => out.push(other.clone()),
        }
    }
}

fn object_entries(value: &Value) -> Result<Vec<(String, Value)>> {
    Ok(match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::String(c.to_string())))
            .collect(),
        Value::Undefined | Value::Null => {
            return Err(anyhow!("Cannot convert undefined or null to object"))
        }
        _ => Vec::new(),
    })
}

fn string_method(s: &str, name: &str, args: &[Value], limits: &Limits) -> Result<Value> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let text_arg = |i: usize| args.get(i).map(Value::to_js_string).unwrap_or_else(|| "undefined".to_string());
    let char_index = |byte: usize| s[..byte].chars().count() as f64;

    let value = match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::string(s.trim()),
        "trimStart" => Value::string(s.trim_start()),
        "trimEnd" => Value::string(s.trim_end()),
        "toString" => Value::string(s),
        "split" => {
            let limit = match args.get(1) {
                None | Some(Value::Undefined) => usize::MAX,
                Some(v) => v.to_number().max(0.0) as usize,
            };
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::string(s)],
                Some(separator) => {
                    let separator = separator.to_js_string();
                    if separator.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str()).map(Value::string).collect()
                    }
                }
            };
            Value::Array(parts.into_iter().take(limit).collect())
        }
        "includes" => Value::Bool(s.contains(text_arg(0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text_arg(0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text_arg(0).as_str())),
        "indexOf" => Value::Number(s.find(text_arg(0).as_str()).map(char_index).unwrap_or(-1.0)),
        "lastIndexOf" => {
            Value::Number(s.rfind(text_arg(0).as_str()).map(char_index).unwrap_or(-1.0))
        }
        "slice" => {
            let start = relative_index(args.first(), len, 0);
            let end = relative_index(args.get(1), len, len);
            Value::String(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            })
        }
        "substring" => {
            let clamp = |v: Option<&Value>, default: usize| match v {
                None | Some(Value::Undefined) => default,
                Some(v) => {
                    let n = v.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n as usize).min(len)
                    }
                }
            };
            let (a, b) = (clamp(args.first(), 0), clamp(args.get(1), len));
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::String(chars[start..end].iter().collect())
        }
        "replace" => Value::String(s.replacen(text_arg(0).as_str(), &text_arg(1), 1)),
        "replaceAll" => {
            let (from, to) = (text_arg(0), text_arg(1));
            // An empty pattern matches at every char boundary
            let matches = if from.is_empty() {
                len + 1
            } else {
                s.matches(from.as_str()).count()
            };
            limits.check_string_len(
                (s.len() - matches * from.len()).saturating_add(matches.saturating_mul(to.len())),
            )?;
            Value::String(s.replace(from.as_str(), &to))
        }
        "repeat" => {
            let count = num(args, 0);
            let count = if count.is_nan() { 0.0 } else { count };
            if count < 0.0 || count.is_infinite() {
                return Err(anyhow!("Invalid count value: {}", format_number(count)));
            }
            let count = count.trunc();
            limits.check_string_len((s.len() as f64 * count) as usize)?;
            Value::String(s.repeat(count as usize))
        }
        "padStart" | "padEnd" => {
            let target = num(args, 0);
            let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
            let filler = match args.get(1) {
                None | Some(Value::Undefined) => " ".to_string(),
                Some(v) => v.to_js_string(),
            };
            if target <= len || filler.is_empty() {
                Value::string(s)
            } else {
                limits.check_string_len(target)?;
                let padding: String = filler.chars().cycle().take(target - len).collect();
                Value::String(if name == "padStart" {
                    format!("{}{}", padding, s)
                } else {
                    format!("{}{}", s, padding)
                })
            }
        }
        "charAt" => {
            let index = num(args, 0);
            let index = if index.is_nan() { 0.0 } else { index };
            Value::String(if index >= 0.0 {
                chars.get(index as usize).map(|c| c.to_string()).unwrap_or_default()
            } else {
                String::new()
            })
        }
        "at" => {
            let n = num(args, 0);
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            if index < 0.0 {
                Value::Undefined
            } else {
                chars
                    .get(index as usize)
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or_default()
            }
        }
        "concat" => Value::String(
            std::iter::once(s.to_string())
                .chain(args.iter().map(Value::to_js_string))
                .collect(),
        ),
        other => return Err(anyhow!("string.{} is not a function", other)),
    };
    Ok(value)
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "toFixed" => {
            let digits = match args.first() {
                None | Some(Value::Undefined) => 0.0,
                Some(v) => v.to_number(),
            };
            if !(0.0..=100.0).contains(&digits) {
                return Err(anyhow!("toFixed() digits argument must be between 0 and 100"));
            }
            if !n.is_finite() {
                return Ok(Value::String(format_number(n)));
            }
            Ok(Value::String(format!("{:.*}", digits as usize, n)))
        }
        "toString" => Ok(Value::String(format_number(n))),
        other => Err(anyhow!("number.{} is not a function", other)),
    }
}

/// `parseInt` semantics: leading whitespace, optional sign, longest digit prefix
fn parse_int(text: &str, radix: u32) -> f64 {
    let text = text.trim_start();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let has_hex_prefix = text.starts_with("0x") || text.starts_with("0X");
    let (radix, text) = match radix {
        0 if has_hex_prefix => (16, &text[2..]),
        0 => (10, text),
        16 if has_hex_prefix => (16, &text[2..]),
        r => (r, text),
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let digits: Vec<u32> = text.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .iter()
        .fold(0.0, |acc, d| acc * radix as f64 + *d as f64);
    if negative {
        -value
    } else {
        value
    }
}

/// `parseFloat` semantics: longest numeric prefix
fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    if text[end..].starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &text[digits_start..end] == "." {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    text[..end].parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", 0), 42.0);
        assert_eq!(parse_int("  -17", 0), -17.0);
        assert_eq!(parse_int("0x1F", 0), 31.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("px", 0).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.5em"), 3.5);
        assert_eq!(parse_float("-.5"), -0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert!(parse_float(".").is_nan());
        assert_eq!(parse_float("Infinity"), f64::INFINITY);
    }

    #[test]
    fn test_globals_resolve() {
        assert!(matches!(global("Math"), Some(Value::Object(m)) if m.contains_key("floor") && m.contains_key("PI")));
        assert!(matches!(global("parseInt"), Some(Value::Function(_))));
        assert!(global("process").is_none());
        assert!(global("require").is_none());
    }

    #[test]
    fn test_static_members() {
        let array = Callable::Builtin("Array");
        assert!(matches!(static_member(&array, "isArray"), Value::Function(_)));
        assert_eq!(static_member(&array, "prototype"), Value::Undefined);
    }

    #[test]
    fn test_string_methods() {
        let limits = Limits::default();
        let args = vec![Value::Number(3.0), Value::string("0")];
        assert_eq!(string_method("7", "padStart", &args, &limits).unwrap(), Value::string("007"));
        assert_eq!(
            string_method("a,b,c", "split", &[Value::string(",")], &limits).unwrap(),
            Value::Array(vec![Value::string("a"), Value::string("b"), Value::string("c")])
        );
        assert_eq!(
            string_method("héllo", "indexOf", &[Value::string("l")], &limits).unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(
            string_method("hello", "slice", &[Value::Number(-3.0)], &limits).unwrap(),
            Value::string("llo")
        );
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(
            number_method(3.14159, "toFixed", &[Value::Number(2.0)]).unwrap(),
            Value::string("3.14")
        );
        assert!(number_method(1.0, "toFixed", &[Value::Number(101.0)]).is_err());
    }
}
