//! `{{ expression }}` interpolation
//!
//! A string that is exactly one span evaluates to the expression's own
//! value (number, boolean, object...). Anything else gets every span
//! replaced by its display text. Failures are logged and resolve to
//! `undefined` / `""`; interpolation never fails the render path.

use crate::parser::ast::Expression;
use crate::parser::parse_expression;
use crate::runtime::{Interpreter, Limits, Object, PureHost, Value};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::warn;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

type Compiled = Rc<Result<Expression, String>>;

/// Interpolator with a per-session cache of parsed expressions
#[derive(Debug, Default)]
pub struct Interpolator {
    cache: RefCell<HashMap<String, Compiled>>,
    limits: Limits,
}

/// A `{{ }}` span inside a template string (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

fn find_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    while let Some(open) = text[cursor..].find(OPEN) {
        let start = cursor + open;
        let body = start + OPEN.len();
        match text[body..].find(CLOSE) {
            Some(close) => {
                let end = body + close + CLOSE.len();
                spans.push(Span { start, end });
                cursor = end;
            }
            None => break,
        }
    }
    spans
}

/// Does this string contain at least one complete span?
pub fn has_spans(text: &str) -> bool {
    !find_spans(text).is_empty()
}

impl Interpolator {
    pub fn new(limits: Limits) -> Self {
        Interpolator {
            cache: RefCell::new(HashMap::new()),
            limits,
        }
    }

    /// Interpolate a value. Non-strings pass through unchanged.
    pub fn interpolate(&self, value: &Value, state: &Value, locals: &Object) -> Value {
        match value {
            Value::String(text) => self.interpolate_str(text, state, locals),
            other => other.clone(),
        }
    }

    /// Interpolate a JSON attribute from the view tree
    pub fn interpolate_json(
        &self,
        value: &serde_json::Value,
        state: &Value,
        locals: &Object,
    ) -> Value {
        match value {
            serde_json::Value::String(text) => self.interpolate_str(text, state, locals),
            other => Value::from_json(other),
        }
    }

    /// Interpolate each entry of a params object (button `params`).
    /// A non-object is interpolated as a single value.
    pub fn interpolate_params(
        &self,
        params: &serde_json::Value,
        state: &Value,
        locals: &Object,
    ) -> Value {
        match params {
            serde_json::Value::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), self.interpolate_json(value, state, locals)))
                    .collect(),
            ),
            other => self.interpolate_json(other, state, locals),
        }
    }

    pub fn interpolate_str(&self, text: &str, state: &Value, locals: &Object) -> Value {
        let spans = find_spans(text);
        if spans.is_empty() {
            return Value::String(text.to_string());
        }

        // Exactly one span covering the whole (trimmed) string keeps its type
        let trimmed_start = text.len() - text.trim_start().len();
        let trimmed_end = text.trim_end().len();
        if let [only] = spans.as_slice() {
            if only.start == trimmed_start && only.end == trimmed_end {
                let source = &text[only.start + OPEN.len()..only.end - CLOSE.len()];
                return self.evaluate_or_log(source, state, locals);
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for span in spans {
            out.push_str(&text[cursor..span.start]);
            let source = &text[span.start + OPEN.len()..span.end - CLOSE.len()];
            out.push_str(&self.evaluate_or_log(source, state, locals).to_display_text());
            cursor = span.end;
        }
        out.push_str(&text[cursor..]);
        Value::String(out)
    }

    fn evaluate_or_log(&self, source: &str, state: &Value, locals: &Object) -> Value {
        match self.evaluate(source, state, locals) {
            Ok(value) => value,
            Err(e) => {
                warn!(expression = %source.trim(), error = %e, "Interpolation failed");
                Value::Undefined
            }
        }
    }

    /// Evaluate one expression against `state` (bound as `state` and by its
    /// top-level keys) plus local bindings
    pub fn evaluate(&self, source: &str, state: &Value, locals: &Object) -> Result<Value> {
        let compiled = self.compile(source.trim());
        let expr = match compiled.as_ref() {
            Ok(expr) => expr,
            Err(message) => return Err(anyhow!("{}", message)),
        };

        let mut host = PureHost;
        let mut interpreter = Interpreter::new(&mut host, self.limits).with_ambient_state(state);
        for (name, value) in locals {
            interpreter.define(name.clone(), value.clone());
        }
        interpreter.eval(expr)
    }

    fn compile(&self, source: &str) -> Compiled {
        if let Some(hit) = self.cache.borrow().get(source) {
            return Rc::clone(hit);
        }
        let compiled = Rc::new(parse_expression(source).map_err(|e| e.to_string()));
        self.cache
            .borrow_mut()
            .insert(source.to_string(), Rc::clone(&compiled));
        compiled
    }

    /// Number of distinct expressions parsed so far
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> Value {
        Value::from(json!({
            "count": 3,
            "name": "Ada",
            "done": false,
            "items": ["a", "b"],
            "winner": null
        }))
    }

    #[test]
    fn test_whole_span_keeps_type() {
        let interp = Interpolator::default();
        let locals = Object::new();

        assert_eq!(
            interp.interpolate_str("{{ count * 2 }}", &state(), &locals),
            Value::Number(6.0)
        );
        assert_eq!(
            interp.interpolate_str("  {{state.done}} ", &state(), &locals),
            Value::Bool(false)
        );
        assert_eq!(
            interp.interpolate_str("{{ items }}", &state(), &locals),
            Value::Array(vec![Value::string("a"), Value::string("b")])
        );
    }

    #[test]
    fn test_substitution_builds_string() {
        let interp = Interpolator::default();
        let locals = Object::new();

        assert_eq!(
            interp.interpolate_str("Hello {{ name }}, {{count}} left", &state(), &locals),
            Value::string("Hello Ada, 3 left")
        );
        assert_eq!(
            interp.interpolate_str("{{ count }}{{ count }}", &state(), &locals),
            Value::string("33")
        );
        assert_eq!(
            interp.interpolate_str("Winner: {{ winner }}", &state(), &locals),
            Value::string("Winner: ")
        );
    }

    #[test]
    fn test_failures_resolve_quietly() {
        let interp = Interpolator::default();
        let locals = Object::new();

        assert_eq!(
            interp.interpolate_str("{{ missing.field }}", &state(), &locals),
            Value::Undefined
        );
        assert_eq!(
            interp.interpolate_str("x{{ ) }}y", &state(), &locals),
            Value::string("xy")
        );
    }

    #[test]
    fn test_plain_and_non_strings_pass_through() {
        let interp = Interpolator::default();
        let locals = Object::new();

        assert_eq!(
            interp.interpolate_str("no spans {{ here", &state(), &locals),
            Value::string("no spans {{ here")
        );
        assert_eq!(
            interp.interpolate(&Value::Number(4.0), &state(), &locals),
            Value::Number(4.0)
        );
        assert_eq!(
            interp.interpolate_json(&json!(true), &state(), &locals),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_locals_shadow_state() {
        let interp = Interpolator::default();
        let mut locals = Object::new();
        locals.insert("count".to_string(), Value::Number(10.0));
        locals.insert("element".to_string(), Value::string("X"));

        assert_eq!(
            interp.interpolate_str("{{ element }}:{{ count }}", &state(), &locals),
            Value::string("X:10")
        );
    }

    #[test]
    fn test_params_interpolated_per_entry() {
        let interp = Interpolator::default();
        let mut locals = Object::new();
        locals.insert("index".to_string(), Value::Number(4.0));

        let params = interp.interpolate_params(
            &json!({"index": "{{ index }}", "label": "cell {{ index }}", "fixed": 1}),
            &state(),
            &locals,
        );
        assert_eq!(params.get_path("index"), Some(&Value::Number(4.0)));
        assert_eq!(params.get_path("label"), Some(&Value::string("cell 4")));
        assert_eq!(params.get_path("fixed"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_expressions_cached() {
        let interp = Interpolator::default();
        let locals = Object::new();
        for _ in 0..3 {
            interp.interpolate_str("{{ count + 1 }}", &state(), &locals);
        }
        assert_eq!(interp.cached(), 1);
    }
}
