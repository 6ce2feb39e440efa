//! Expression evaluation
//!
//! Evaluates expressions to values. Assignments, `++`/`--` and mutating
//! array methods write the updated value back to the variable the target
//! is rooted at (`board[i] = 'X'` replaces the element inside `board`).

use crate::parser::ast::{
    ArrayItem, AssignOp, BinaryOp, Expression, LogicalOp, ObjectProperty, PropertyKey,
    TemplatePart, UnaryOp, UpdateOp,
};
use crate::runtime::builtins;
use crate::runtime::interpreter::{Interpreter, Limits};
use crate::runtime::value::{format_number, Value};
use anyhow::{anyhow, Result};

/// One step of a place path: `.name` or `[value]`
enum PathKey {
    Name(String),
    Value(Value),
}

impl<'h> Interpreter<'h> {
    /// Evaluate an expression
    pub fn eval(&mut self, expr: &Expression) -> Result<Value> {
        self.tick()?;

        match expr {
            Expression::Number(n) => Ok(Value::Number(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Boolean(b) => Ok(Value::Bool(*b)),
            Expression::Null => Ok(Value::Null),
            Expression::Undefined => Ok(Value::Undefined),

            Expression::Template(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Literal(s) => text.push_str(s),
                        TemplatePart::Expression(e) => text.push_str(&self.eval(e)?.to_js_string()),
                    }
                    self.limits().check_string_len(text.len())?;
                }
                Ok(Value::String(text))
            }

            Expression::Identifier(name) => self.lookup(name),

            Expression::Array(items) => Ok(Value::Array(self.eval_items(items)?)),

            Expression::Object(properties) => self.eval_object(properties),

            Expression::Member { .. } | Expression::Index { .. } | Expression::Call { .. } => {
                Ok(self.eval_chain(expr)?.unwrap_or_default())
            }

            Expression::Unary { op, operand } => self.eval_unary(*op, operand),

            Expression::Update { op, prefix, target } => {
                let old = self.eval(target)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.assign(target, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }

            Expression::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let result = binary_op(*op, &left, &right)?;
                self.limits().check_size(&result)?;
                Ok(result)
            }

            Expression::Logical { op, left, right } => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }

            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }

            Expression::Assign { op, target, value } => self.eval_assign(*op, target, value),

            Expression::Function(def) => Ok(self.make_closure(def)),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.env.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.ambient_lookup(name) {
            return Ok(value);
        }
        builtins::global(name).ok_or_else(|| anyhow!("{} is not defined", name))
    }

    /// Array literal items and call arguments, expanding `...spread`
    pub(crate) fn eval_items(&mut self, items: &[ArrayItem]) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ArrayItem::Item(expr) => values.push(self.eval(expr)?),
                ArrayItem::Spread(expr) => match self.eval(expr)? {
                    Value::Array(inner) => values.extend(inner),
                    Value::String(s) => {
                        values.extend(s.chars().map(|c| Value::String(c.to_string())))
                    }
                    other => return Err(anyhow!("{} is not iterable", other.type_of())),
                },
            }
            self.limits().check_array_len(values.len())?;
        }
        Ok(values)
    }

    fn eval_object(&mut self, properties: &[ObjectProperty]) -> Result<Value> {
        let mut map = crate::runtime::value::Object::new();
        for property in properties {
            match property {
                ObjectProperty::KeyValue(key, value) => {
                    let key = match key {
                        PropertyKey::Static(name) => name.clone(),
                        PropertyKey::Computed(expr) => property_key(&self.eval(expr)?),
                    };
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                ObjectProperty::Spread(expr) => match self.eval(expr)? {
                    Value::Object(other) => map.extend(other),
                    Value::Array(items) => {
                        for (i, item) in items.into_iter().enumerate() {
                            map.insert(i.to_string(), item);
                        }
                    }
                    Value::String(s) => {
                        for (i, c) in s.chars().enumerate() {
                            map.insert(i.to_string(), Value::String(c.to_string()));
                        }
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::Object(map))
    }

    /// Evaluate a member/index/call chain. `None` means an optional link
    /// (`?.`) short-circuited the rest of the chain.
    fn eval_chain(&mut self, expr: &Expression) -> Result<Option<Value>> {
        match expr {
            Expression::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                self.get_property(&target, property).map(Some)
            }

            Expression::Index {
                object,
                index,
                optional,
            } => {
                let Some(target) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(index)?;
                self.get_index(&target, &key).map(Some)
            }

            Expression::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional),

            other => self.eval(other).map(Some),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expression,
        args: &[ArrayItem],
        optional: bool,
    ) -> Result<Option<Value>> {
        let (receiver_expr, method) = match callee {
            Expression::Member {
                object,
                property,
                optional: member_optional,
            } => {
                let Some(receiver) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *member_optional && receiver.is_nullish() {
                    return Ok(None);
                }
                (object.as_ref(), Some((receiver, property.clone())))
            }
            Expression::Index {
                object,
                index,
                optional: index_optional,
            } => {
                let Some(receiver) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *index_optional && receiver.is_nullish() {
                    return Ok(None);
                }
                let key = property_key(&self.eval(index)?);
                (object.as_ref(), Some((receiver, key)))
            }
            other => (other, None),
        };

        let Some((receiver, name)) = method else {
            let Some(function) = self.eval_chain(receiver_expr)? else {
                return Ok(None);
            };
            if optional && function.is_nullish() {
                return Ok(None);
            }
            let args = self.eval_items(args)?;
            return self.call_value(&function, args).map(Some);
        };

        // Functions stored on objects (`helpers.x`, `Math.max`, user callbacks)
        if matches!(receiver, Value::Object(_) | Value::Function(_)) {
            let function = self.get_property(&receiver, &name)?;
            if optional && function.is_nullish() {
                return Ok(None);
            }
            if !matches!(function, Value::Function(_)) {
                return Err(anyhow!("{} is not a function", name));
            }
            let args = self.eval_items(args)?;
            return self.call_value(&function, args).map(Some);
        }

        if receiver.is_nullish() {
            return Err(anyhow!(
                "Cannot read properties of {} (reading '{}')",
                receiver.to_js_string(),
                name
            ));
        }

        let args = self.eval_items(args)?;
        let mut receiver = receiver;
        let mutates = builtins::is_mutating_method(&receiver, &name);
        let result = self.call_method(&mut receiver, &name, args)?;
        self.limits().check_size(&result)?;
        self.limits().check_size(&receiver)?;
        if mutates && receiver_expr.is_place() {
            self.write_back(receiver_expr, receiver)?;
        }
        Ok(Some(result))
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expression) -> Result<Value> {
        if op == UnaryOp::Typeof {
            // `typeof missing` is "undefined" rather than an error
            if let Expression::Identifier(name) = operand {
                if let Ok(value) = self.lookup(name) {
                    return Ok(Value::string(value.type_of()));
                }
                return Ok(Value::string("undefined"));
            }
            return Ok(Value::string(self.eval(operand)?.type_of()));
        }

        let value = self.eval(operand)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.is_truthy()),
            UnaryOp::Negate => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::Typeof => Value::string(value.type_of()),
        })
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Expression, value: &Expression) -> Result<Value> {
        let binary = match op {
            AssignOp::Assign => {
                let value = self.eval(value)?;
                self.assign(target, value.clone())?;
                return Ok(value);
            }
            AssignOp::And | AssignOp::Or | AssignOp::Nullish => {
                let current = self.eval(target)?;
                let keep = match op {
                    AssignOp::And => !current.is_truthy(),
                    AssignOp::Or => current.is_truthy(),
                    _ => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                let value = self.eval(value)?;
                self.assign(target, value.clone())?;
                return Ok(value);
            }
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Subtract => BinaryOp::Subtract,
            AssignOp::Multiply => BinaryOp::Multiply,
            AssignOp::Divide => BinaryOp::Divide,
            AssignOp::Remainder => BinaryOp::Remainder,
        };

        let current = self.eval(target)?;
        let rhs = self.eval(value)?;
        let result = binary_op(binary, &current, &rhs)?;
        self.limits().check_size(&result)?;
        self.assign(target, result.clone())?;
        Ok(result)
    }

    /// Store `value` at a place expression (`x`, `x.a`, `x[i].b`)
    pub(crate) fn assign(&mut self, target: &Expression, value: Value) -> Result<()> {
        self.store(target, value, false)
    }

    /// Replace a receiver after an in-place method (`list.push(x)`); allowed
    /// on `const` bindings
    fn write_back(&mut self, target: &Expression, value: Value) -> Result<()> {
        self.store(target, value, true)
    }

    fn store(&mut self, target: &Expression, value: Value, in_place: bool) -> Result<()> {
        let limits = *self.limits();
        let mut path = Vec::new();
        let root = self.resolve_place(target, &mut path)?;
        if !self.env.is_defined(&root) {
            // `state.x = ...` inside an interpolation: copy the ambient
            // value into a local so the write has somewhere to land
            if let Some(ambient) = self.ambient_lookup(&root) {
                self.env.define(root.clone(), ambient, true);
            }
        }
        let slot = if path.is_empty() && !in_place {
            self.env.get_mut(&root)?
        } else {
            self.env.get_contents_mut(&root)?
        };
        write_path(slot, &path, value, &limits)
    }

    fn resolve_place(&mut self, target: &Expression, path: &mut Vec<PathKey>) -> Result<String> {
        match target {
            Expression::Identifier(name) => Ok(name.clone()),
            Expression::Member {
                object, property, ..
            } => {
                let root = self.resolve_place(object, path)?;
                path.push(PathKey::Name(property.clone()));
                Ok(root)
            }
            Expression::Index { object, index, .. } => {
                let root = self.resolve_place(object, path)?;
                let key = self.eval(index)?;
                path.push(PathKey::Value(key));
                Ok(root)
            }
            _ => Err(anyhow!("Invalid assignment target")),
        }
    }

    /// Read `target.name`
    pub fn get_property(&self, target: &Value, name: &str) -> Result<Value> {
        match target {
            Value::Undefined | Value::Null => Err(anyhow!(
                "Cannot read properties of {} (reading '{}')",
                target.to_js_string(),
                name
            )),
            Value::Object(map) => Ok(map.get(name).cloned().unwrap_or_default()),
            Value::Array(items) => Ok(match name {
                "length" => Value::Number(items.len() as f64),
                _ => array_index(name)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default(),
            }),
            Value::String(s) => Ok(match name {
                "length" => Value::Number(s.chars().count() as f64),
                _ => array_index(name)
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or_default(),
            }),
            Value::Function(callable) => Ok(builtins::static_member(callable, name)),
            Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
        }
    }

    /// Read `target[key]`
    fn get_index(&self, target: &Value, key: &Value) -> Result<Value> {
        match (target, key) {
            (Value::Array(items), Value::Number(n)) => Ok(number_index(*n)
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default()),
            _ => self.get_property(target, &property_key(key)),
        }
    }
}

fn write_path(slot: &mut Value, path: &[PathKey], value: Value, limits: &Limits) -> Result<()> {
    let Some((key, rest)) = path.split_first() else {
        *slot = value;
        return Ok(());
    };

    match slot {
        Value::Object(map) => {
            let name = match key {
                PathKey::Name(name) => name.clone(),
                PathKey::Value(v) => property_key(v),
            };
            if rest.is_empty() {
                map.insert(name, value);
                return Ok(());
            }
            match map.get_mut(&name) {
                Some(child) => write_path(child, rest, value, limits),
                None => Err(anyhow!(
                    "Cannot set properties of undefined (setting '{}')",
                    name
                )),
            }
        }
        Value::Array(items) => {
            let index = match key {
                PathKey::Name(name) if name == "length" && rest.is_empty() => {
                    let len = limits.array_len(value.to_number())?;
                    items.resize(len, Value::Undefined);
                    return Ok(());
                }
                PathKey::Name(name) => array_index(name),
                PathKey::Value(Value::Number(n)) => number_index(*n),
                PathKey::Value(v) => array_index(&property_key(v)),
            }
            .ok_or_else(|| anyhow!("Cannot set a non-index property on an array"))?;

            if rest.is_empty() {
                if index >= items.len() {
                    limits.check_array_len(index + 1)?;
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                return Ok(());
            }
            match items.get_mut(index) {
                Some(child) => write_path(child, rest, value, limits),
                None => Err(anyhow!(
                    "Cannot set properties of undefined (setting index {})",
                    index
                )),
            }
        }
        other => Err(anyhow!(
            "Cannot set properties of {}",
            if other.is_nullish() {
                other.to_js_string()
            } else {
                other.type_of().to_string()
            }
        )),
    }
}

/// Object key for a computed property
pub(crate) fn property_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        other => other.to_js_string(),
    }
}

fn array_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    name.parse::<usize>().ok()
}

fn number_index(n: f64) -> Option<usize> {
    if n >= 0.0 && n.fract() == 0.0 && n < u32::MAX as f64 {
        Some(n as usize)
    } else {
        None
    }
}

/// Apply a (non short-circuit) binary operator
pub(crate) fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    Ok(match op {
        BinaryOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (a, b) if is_stringy(a) || is_stringy(b) => {
                Value::String(format!("{}{}", a.to_js_string(), b.to_js_string()))
            }
            (a, b) => Value::Number(a.to_number() + b.to_number()),
        },
        BinaryOp::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Power => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOp::Equal => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEqual => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEqual => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEqual => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            Value::Bool(compare(op, left, right))
        }
        BinaryOp::In => {
            let key = property_key(left);
            match right {
                Value::Object(map) => Value::Bool(map.contains_key(&key)),
                Value::Array(items) => Value::Bool(
                    key == "length" || array_index(&key).is_some_and(|i| i < items.len()),
                ),
                other => {
                    return Err(anyhow!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key,
                        other.to_js_string()
                    ))
                }
            }
        }
    })
}

fn is_stringy(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Array(_) | Value::Object(_))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return match op {
            BinaryOp::Less => a < b,
            BinaryOp::LessEqual => a <= b,
            BinaryOp::Greater => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinaryOp::Less => a < b,
        BinaryOp::LessEqual => a <= b,
        BinaryOp::Greater => a > b,
        _ => a >= b,
    }
}
