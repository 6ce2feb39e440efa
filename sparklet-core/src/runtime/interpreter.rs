//! Interpreter for executing Sparklet script bodies
//!
//! Runs statements (declarations, control flow, function calls) with a
//! bounded step budget and call depth. Side effects leave the sandbox only
//! through the [`ScriptHost`] the caller supplies.

use crate::parser::ast::{Binding, FunctionBody, FunctionDef, Pattern, Statement};
use crate::runtime::environment::Environment;
use crate::runtime::value::{Callable, Closure, Value};
use anyhow::{anyhow, Result};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Capabilities a script can reach through `helpers.*`, `Math.random` and
/// `Date.now`. Everything else is pure computation.
pub trait ScriptHost {
    /// `helpers.<name>(params)`
    fn call_helper(&mut self, name: &str, params: Value) -> Result<Value>;

    /// `helpers.scheduleAction(name, params, delayMs)`
    fn schedule_action(&mut self, name: &str, params: Value, delay_ms: f64) -> Result<()>;

    /// `helpers.cancelAction(name)`
    fn cancel_action(&mut self, name: &str) -> Result<()>;

    /// `Math.random()`
    fn random(&mut self) -> f64;

    /// `Date.now()`
    fn now_ms(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as f64)
            .unwrap_or(0.0)
    }
}

/// Execution limits applied to one evaluation
///
/// The step budget bounds time; the two length caps bound what a single
/// step may allocate (`'x'.repeat(n)`, `Array(n)`, `list.length = n`).
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub step_budget: u64,
    pub max_call_depth: usize,
    /// Longest array a script may build, in elements
    pub max_array_len: usize,
    /// Longest string a script may build, in bytes. Also bounds the total
    /// size of the copies one `fill` makes.
    pub max_string_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            step_budget: 100_000,
            max_call_depth: 64,
            max_array_len: 100_000,
            max_string_len: 1_000_000,
        }
    }
}

impl Limits {
    /// Convert a script-supplied array length, rejecting anything that is
    /// not a valid length or exceeds `max_array_len`
    pub fn array_len(&self, n: f64) -> Result<usize> {
        if n.is_nan() || n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
            return Err(anyhow!("Invalid array length"));
        }
        let len = n as usize;
        self.check_array_len(len)?;
        Ok(len)
    }

    pub fn check_array_len(&self, len: usize) -> Result<()> {
        if len > self.max_array_len {
            return Err(anyhow!(
                "Array length {} exceeds the limit of {}",
                len,
                self.max_array_len
            ));
        }
        Ok(())
    }

    pub fn check_string_len(&self, len: usize) -> Result<()> {
        if len > self.max_string_len {
            return Err(anyhow!(
                "String length {} exceeds the limit of {}",
                len,
                self.max_string_len
            ));
        }
        Ok(())
    }

    /// `fill` copies `value` into `count` slots; the copies together must
    /// stay within `max_string_len` (strings weigh their bytes, everything
    /// else one per value)
    pub fn check_copies(&self, value: &Value, count: usize) -> Result<()> {
        let total = weight(value).saturating_mul(count);
        if total > self.max_string_len {
            return Err(anyhow!(
                "Filling {} slots would copy {} units, over the limit of {}",
                count,
                total,
                self.max_string_len
            ));
        }
        Ok(())
    }

    /// Size check for a freshly built value (top level only)
    pub fn check_size(&self, value: &Value) -> Result<()> {
        match value {
            Value::Array(items) => self.check_array_len(items.len()),
            Value::String(s) => self.check_string_len(s.len()),
            _ => Ok(()),
        }
    }
}

fn weight(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len().max(1),
        Value::Array(items) => items.iter().map(weight).fold(1, usize::saturating_add),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| key.len().saturating_add(weight(value)))
            .fold(1, usize::saturating_add),
        _ => 1,
    }
}

/// Control flow signals for break/continue/return
#[derive(Debug)]
pub enum ControlFlow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Tree-walking interpreter for one evaluation (an action dispatch, a
/// helper call or an interpolation span)
pub struct Interpreter<'h> {
    /// Variable environment
    pub(crate) env: Environment,
    pub(crate) host: &'h mut dyn ScriptHost,
    /// Read-only bindings consulted after the environment: `state` and the
    /// top-level keys of the object
    ambient: Option<&'h Value>,
    steps_left: u64,
    depth: usize,
    limits: Limits,
}

impl<'h> Interpreter<'h> {
    /// Create a new interpreter
    pub fn new(host: &'h mut dyn ScriptHost, limits: Limits) -> Self {
        Interpreter {
            env: Environment::new(),
            host,
            ambient: None,
            steps_left: limits.step_budget,
            depth: 0,
            limits,
        }
    }

    /// Resolve unknown identifiers against `state` (bound as `state` and by
    /// each of its top-level keys)
    pub fn with_ambient_state(mut self, state: &'h Value) -> Self {
        self.ambient = Some(state);
        self
    }

    /// Define a local binding
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.env.define(name.into(), value, true);
    }

    pub(crate) fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Steps still available
    pub fn steps_left(&self) -> u64 {
        self.steps_left
    }

    /// Consume one evaluation step
    pub(crate) fn tick(&mut self) -> Result<()> {
        if self.steps_left == 0 {
            return Err(anyhow!(
                "Execution budget of {} steps exhausted",
                self.limits.step_budget
            ));
        }
        self.steps_left -= 1;
        Ok(())
    }

    pub(crate) fn ambient_lookup(&self, name: &str) -> Option<Value> {
        let state = self.ambient?;
        if name == "state" {
            return Some(state.clone());
        }
        state.as_object()?.get(name).cloned()
    }

    /// Call a top-level function (a compiled action or helper) with no
    /// captured bindings
    pub fn call_function(&mut self, def: &Rc<FunctionDef>, args: Vec<Value>) -> Result<Value> {
        let closure = Closure {
            def: Rc::clone(def),
            captured: Vec::new(),
        };
        self.call_closure(&Rc::new(closure), args)
    }

    /// Invoke any callable value
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Function(Callable::Closure(closure)) => self.call_closure(closure, args),
            Value::Function(Callable::Builtin(name)) => self.call_builtin(name, args),
            Value::Function(Callable::Helper(name)) => {
                let params = args.into_iter().next().unwrap_or_default();
                self.host.call_helper(name, params)
            }
            Value::Function(Callable::ScheduleAction) => {
                let mut args = args.into_iter();
                let name = match args.next() {
                    Some(Value::String(name)) => name,
                    other => {
                        return Err(anyhow!(
                            "scheduleAction expects an action name, got {}",
                            other.unwrap_or_default().type_of()
                        ))
                    }
                };
                let params = match args.next() {
                    Some(Value::Undefined) | None => Value::object(),
                    Some(params) => params,
                };
                let delay = args.next().map(|d| d.to_number()).unwrap_or(0.0);
                self.host.schedule_action(&name, params, delay)?;
                Ok(Value::Undefined)
            }
            Value::Function(Callable::CancelAction) => {
                match args.first() {
                    Some(Value::String(name)) => self.host.cancel_action(name)?,
                    other => {
                        return Err(anyhow!(
                            "cancelAction expects an action name, got {}",
                            other.cloned().unwrap_or_default().type_of()
                        ))
                    }
                }
                Ok(Value::Undefined)
            }
            other => Err(anyhow!("{} is not a function", other.type_of())),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Result<Value> {
        self.tick()?;
        if self.depth >= self.limits.max_call_depth {
            return Err(anyhow!(
                "Maximum call depth of {} exceeded",
                self.limits.max_call_depth
            ));
        }

        let outer = std::mem::replace(&mut self.env, Environment::from_captured(&closure.captured));
        self.depth += 1;
        let result = self.run_closure_body(closure, args);
        self.depth -= 1;
        self.env = outer;

        result
    }

    fn run_closure_body(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Result<Value> {
        self.env.push_scope();
        if let Some(name) = &closure.def.name {
            self.env.define(
                name.clone(),
                Value::Function(Callable::Closure(Rc::clone(closure))),
                true,
            );
        }

        let mut args = args.into_iter();
        for param in &closure.def.params {
            let arg = args.next().unwrap_or_default();
            self.bind(param, arg, true)?;
        }

        match &closure.def.body {
            FunctionBody::Expression(expr) => self.eval(expr),
            FunctionBody::Block(statements) => match self.run_statements(statements)? {
                ControlFlow::Normal => Ok(Value::Undefined),
                ControlFlow::Return(value) => Ok(value),
                ControlFlow::Break => Err(anyhow!("Illegal break statement")),
                ControlFlow::Continue => Err(anyhow!("Illegal continue statement")),
            },
        }
    }

    /// Run statements in the current scope, hoisting function declarations
    pub fn run_statements(&mut self, statements: &[Statement]) -> Result<ControlFlow> {
        for stmt in statements {
            if let Statement::Function(def) = stmt {
                self.declare_function(def);
            }
        }

        for stmt in statements {
            if matches!(stmt, Statement::Function(_)) {
                continue;
            }
            match self.run_statement(stmt)? {
                ControlFlow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn declare_function(&mut self, def: &Rc<FunctionDef>) {
        if let Some(name) = &def.name {
            let closure = self.make_closure(def);
            self.env.define(name.clone(), closure, true);
        }
    }

    pub(crate) fn make_closure(&self, def: &Rc<FunctionDef>) -> Value {
        Value::Function(Callable::Closure(Rc::new(Closure {
            def: Rc::clone(def),
            captured: self.env.snapshot(),
        })))
    }

    fn run_block(&mut self, statements: &[Statement]) -> Result<ControlFlow> {
        self.env.push_scope();
        let flow = self.run_statements(statements);
        self.env.pop_scope();
        flow
    }

    /// Run a single statement
    pub fn run_statement(&mut self, stmt: &Statement) -> Result<ControlFlow> {
        self.tick()?;

        match stmt {
            Statement::Declaration { kind, declarations } => {
                for (pattern, init) in declarations {
                    let value = match init {
                        Some(expr) => self.eval(expr)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(pattern, value, kind.is_mutable())?;
                }
                Ok(ControlFlow::Normal)
            }

            Statement::Function(def) => {
                self.declare_function(def);
                Ok(ControlFlow::Normal)
            }

            Statement::Expression(expr) => {
                self.eval(expr)?;
                Ok(ControlFlow::Normal)
            }

            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.run_scoped(consequent)
                } else if let Some(alternate) = alternate {
                    self.run_scoped(alternate)
                } else {
                    Ok(ControlFlow::Normal)
                }
            }

            Statement::While { test, body } => {
                while self.eval(test)?.is_truthy() {
                    match self.run_scoped(body)? {
                        ControlFlow::Break => break,
                        ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                        ControlFlow::Normal | ControlFlow::Continue => {}
                    }
                }
                Ok(ControlFlow::Normal)
            }

            Statement::For {
                init,
                test,
                update,
                body,
            } => {
                self.env.push_scope();
                let flow = self.run_for(init.as_deref(), test.as_ref(), update.as_ref(), body);
                self.env.pop_scope();
                flow
            }

            Statement::ForOf {
                kind,
                pattern,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable)? {
                    Value::Array(items) => items,
                    Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                    other => return Err(anyhow!("{} is not iterable", other.type_of())),
                };
                self.run_each(items, *kind, pattern, body)
            }

            Statement::ForIn {
                kind,
                pattern,
                object,
                body,
            } => {
                let keys = match self.eval(object)? {
                    Value::Object(map) => map.keys().map(|k| Value::String(k.clone())).collect(),
                    Value::Array(items) => (0..items.len())
                        .map(|i| Value::String(i.to_string()))
                        .collect(),
                    Value::String(s) => (0..s.chars().count())
                        .map(|i| Value::String(i.to_string()))
                        .collect(),
                    _ => Vec::new(),
                };
                self.run_each(keys, *kind, pattern, body)
            }

            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                Ok(ControlFlow::Return(value))
            }

            Statement::Break => Ok(ControlFlow::Break),
            Statement::Continue => Ok(ControlFlow::Continue),
            Statement::Block(statements) => self.run_block(statements),
            Statement::Empty => Ok(ControlFlow::Normal),
        }
    }

    /// Run a nested statement in its own scope
    fn run_scoped(&mut self, stmt: &Statement) -> Result<ControlFlow> {
        match stmt {
            Statement::Block(statements) => self.run_block(statements),
            other => {
                self.env.push_scope();
                let flow = self.run_statement(other);
                self.env.pop_scope();
                flow
            }
        }
    }

    fn run_for(
        &mut self,
        init: Option<&Statement>,
        test: Option<&crate::parser::ast::Expression>,
        update: Option<&crate::parser::ast::Expression>,
        body: &Statement,
    ) -> Result<ControlFlow> {
        if let Some(init) = init {
            self.run_statement(init)?;
        }

        loop {
            if let Some(test) = test {
                if !self.eval(test)?.is_truthy() {
                    break;
                }
            } else {
                self.tick()?;
            }

            match self.run_scoped(body)? {
                ControlFlow::Break => break,
                ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                ControlFlow::Normal | ControlFlow::Continue => {}
            }

            if let Some(update) = update {
                self.eval(update)?;
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn run_each(
        &mut self,
        items: Vec<Value>,
        kind: crate::parser::ast::DeclarationKind,
        pattern: &Pattern,
        body: &Statement,
    ) -> Result<ControlFlow> {
        for item in items {
            self.tick()?;
            self.env.push_scope();
            let flow = self
                .bind_pattern(pattern, item, kind.is_mutable())
                .and_then(|_| self.run_scoped(body));
            self.env.pop_scope();

            match flow? {
                ControlFlow::Break => break,
                ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                ControlFlow::Normal | ControlFlow::Continue => {}
            }
        }
        Ok(ControlFlow::Normal)
    }

    /// Bind a parameter or pattern element, applying its default for `undefined`
    fn bind(&mut self, binding: &Binding, value: Value, mutable: bool) -> Result<()> {
        let value = match (&binding.default, value) {
            (Some(default), Value::Undefined) => self.eval(default)?,
            (_, value) => value,
        };
        self.bind_pattern(&binding.pattern, value, mutable)
    }

    /// Destructure `value` into the current scope
    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, mutable: bool) -> Result<()> {
        match pattern {
            Pattern::Identifier(name) => {
                self.env.define(name.clone(), value, mutable);
                Ok(())
            }
            Pattern::Object(properties) => {
                if value.is_nullish() {
                    return Err(anyhow!("Cannot destructure {}", value.to_js_string()));
                }
                for property in properties {
                    let field = self.get_property(&value, &property.key)?;
                    self.bind(&property.binding, field, mutable)?;
                }
                Ok(())
            }
            Pattern::Array(items) => {
                let elements = match value {
                    Value::Array(elements) => elements,
                    Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                    other => return Err(anyhow!("{} is not iterable", other.type_of())),
                };
                let mut elements = elements.into_iter();
                for item in items {
                    let element = elements.next().unwrap_or_default();
                    if let Some(binding) = item {
                        self.bind(binding, element, mutable)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Host for evaluations that get no capabilities (view interpolation).
/// `Math.random` still works.
pub struct PureHost;

impl ScriptHost for PureHost {
    fn call_helper(&mut self, name: &str, _params: Value) -> Result<Value> {
        Err(anyhow!("helpers.{} is not available here", name))
    }

    fn schedule_action(&mut self, name: &str, _params: Value, _delay_ms: f64) -> Result<()> {
        Err(anyhow!("Cannot schedule '{}' from here", name))
    }

    fn cancel_action(&mut self, name: &str) -> Result<()> {
        Err(anyhow!("Cannot cancel '{}' from here", name))
    }

    fn random(&mut self) -> f64 {
        rand::random::<f64>()
    }
}
