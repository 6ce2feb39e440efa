//! One mounted Sparklet: state, dispatch, schedules and rendering
//!
//! The session is the only owner of `state`. It changes in exactly two
//! ways: an action returns an object that is shallow-merged in, or an
//! input widget writes its bound field.

use crate::config::EngineConfig;
use crate::definition::{CompiledSparklet, DefinitionError, SparkletDefinition};
use crate::engine::scheduler::{PendingSchedule, Scheduler};
use crate::engine::timers::{TimerBackend, TimerId, VirtualTimers};
use crate::interpolate::Interpolator;
use crate::render::element::state_path;
use crate::render::{PressParams, PressTarget, RenderedNode, Renderer};
use crate::runtime::{Callable, Interpreter, Limits, Object, ScriptHost, Value};
use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Result of one dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// No such action (or it failed to compile)
    Missing,
    /// The body raised an error; state unchanged
    Failed(String),
    /// Returned nothing mergeable, or nothing differed
    NoChange,
    /// Top-level keys whose value changed
    Updated(Vec<String>),
    /// The session was already closed
    Closed,
}

impl DispatchOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, DispatchOutcome::Updated(_))
    }
}

pub struct SparkletSession<T: TimerBackend> {
    program: Option<Rc<CompiledSparklet>>,
    load_error: Option<String>,
    state: Value,
    scheduler: Scheduler<T>,
    interpolator: Interpolator,
    config: EngineConfig,
    rng: StdRng,
    revision: u64,
    last_change: Vec<String>,
    closed: bool,
}

impl<T: TimerBackend> SparkletSession<T> {
    /// Open a session on a parsed definition. `state` starts as a deep copy
    /// of `initialState`.
    pub fn open(definition: SparkletDefinition, backend: T, config: EngineConfig) -> Self {
        let state = Value::Object(
            definition
                .initial_state
                .iter()
                .map(|(key, value)| (key.clone(), Value::from_json(value)))
                .collect(),
        );
        let program = CompiledSparklet::compile(definition);
        debug!(sparklet = %program.title(), "Opened sparklet");

        let mut session = Self::empty(backend, config);
        session.state = state;
        session.program = Some(Rc::new(program));
        session
    }

    /// Open from definition JSON. An invalid definition still yields a
    /// session: it renders a placeholder and dispatches nothing.
    pub fn from_json(json: &str, backend: T, config: EngineConfig) -> Self {
        Self::open_result(SparkletDefinition::from_json(json), backend, config)
    }

    pub fn from_value(value: serde_json::Value, backend: T, config: EngineConfig) -> Self {
        Self::open_result(SparkletDefinition::from_value(value), backend, config)
    }

    fn open_result(
        definition: Result<SparkletDefinition, DefinitionError>,
        backend: T,
        config: EngineConfig,
    ) -> Self {
        match definition {
            Ok(definition) => Self::open(definition, backend, config),
            Err(e) => {
                warn!(error = %e, "Invalid sparklet definition; showing placeholder");
                let mut session = Self::empty(backend, config);
                session.load_error = Some(e.to_string());
                session
            }
        }
    }

    fn empty(backend: T, config: EngineConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        SparkletSession {
            program: None,
            load_error: None,
            state: Value::object(),
            scheduler: Scheduler::new(backend),
            interpolator: Interpolator::new(config.limits()),
            config,
            rng,
            revision: 0,
            last_change: Vec::new(),
            closed: false,
        }
    }

    pub fn title(&self) -> &str {
        match &self.program {
            Some(program) => program.title(),
            None => "Invalid Sparklet",
        }
    }

    pub fn definition(&self) -> Option<&SparkletDefinition> {
        self.program.as_ref().map(|program| &program.definition)
    }

    pub fn compiled(&self) -> Option<&CompiledSparklet> {
        self.program.as_deref()
    }

    /// Why the definition failed to load, for placeholder sessions
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn state_json(&self) -> serde_json::Value {
        self.state.to_json()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bumped on every committed change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Keys changed by the last committed change
    pub fn last_change(&self) -> &[String] {
        &self.last_change
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run a helper against the current state. Absent or failing helpers
    /// yield `null`.
    pub fn run_helper(&mut self, name: &str, params: Value) -> Value {
        let Some(program) = &self.program else {
            return Value::Null;
        };
        invoke_helper(program, &self.state, &mut self.rng, self.config.limits(), name, params)
    }

    /// Run an action and merge its result into state
    pub fn execute_action(&mut self, name: &str, params: Value) -> DispatchOutcome {
        if self.closed {
            debug!(action = %name, "Dispatch after close ignored");
            return DispatchOutcome::Closed;
        }
        let Some(program) = self.program.clone() else {
            return DispatchOutcome::Missing;
        };
        let Some(def) = program.action(name).cloned() else {
            warn!(sparklet = %program.title(), action = %name, "No such action");
            return DispatchOutcome::Missing;
        };

        let snapshot = self.state.clone();
        let helpers = capability_object(&program);
        let limits = self.config.limits();
        let result = {
            let mut host = DispatchHost {
                program: &program,
                state: &self.state,
                scheduler: &mut self.scheduler,
                rng: &mut self.rng,
                config: &self.config,
            };
            let mut interpreter = Interpreter::new(&mut host, limits);
            interpreter.call_function(&def, vec![snapshot, params, helpers])
        };

        match result {
            Ok(Value::Object(partial)) => {
                let outcome = self.merge(partial);
                trace!(action = %name, ?outcome, "Dispatched");
                outcome
            }
            Ok(_) => DispatchOutcome::NoChange,
            Err(e) => {
                warn!(sparklet = %program.title(), action = %name, error = %e, "Action failed; state unchanged");
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Shallow merge, recording which keys actually changed
    fn merge(&mut self, partial: Object) -> DispatchOutcome {
        let mut changed = Vec::new();
        if let Value::Object(current) = &mut self.state {
            for (key, value) in partial {
                let same = current
                    .get(&key)
                    .map(|existing| existing.strict_equals(&value))
                    .unwrap_or(false);
                if !same {
                    changed.push(key.clone());
                }
                current.insert(key, value);
            }
        }
        self.commit(changed)
    }

    fn commit(&mut self, changed: Vec<String>) -> DispatchOutcome {
        if changed.is_empty() {
            return DispatchOutcome::NoChange;
        }
        self.revision += 1;
        self.last_change = changed.clone();
        DispatchOutcome::Updated(changed)
    }

    /// Schedule `name` after `delay_ms`, replacing any pending schedule
    pub fn schedule(&mut self, name: &str, params: Value, delay_ms: u64) -> Option<TimerId> {
        if self.closed {
            return None;
        }
        let delay_ms = delay_ms.min(self.config.max_timer_delay_ms);
        Some(self.scheduler.schedule(name, params, delay_ms))
    }

    pub fn cancel(&mut self, name: &str) -> bool {
        self.scheduler.cancel(name)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.scheduler.is_pending(name)
    }

    /// Pending schedules sorted by action name
    pub fn pending(&self) -> Vec<(&str, &PendingSchedule)> {
        self.scheduler.pending()
    }

    /// Deliver an elapsed timer. Ids that were cancelled or replaced
    /// return `None` without dispatching.
    pub fn fire(&mut self, timer: TimerId) -> Option<DispatchOutcome> {
        let (name, params) = self.scheduler.take_fired(timer)?;
        trace!(action = %name, %timer, "Timer fired");
        Some(self.execute_action(&name, params))
    }

    /// Two-way input binding: write `text` at `binding` (dotted, optional
    /// `state.` prefix) without going through an action
    pub fn set_binding(&mut self, binding: &str, text: &str) -> DispatchOutcome {
        if self.closed {
            return DispatchOutcome::Closed;
        }
        let path = state_path(binding);
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some(&top) = segments.first() else {
            return DispatchOutcome::NoChange;
        };

        let value = Value::string(text);
        if self.state.get_path(path) == Some(&value) {
            return DispatchOutcome::NoChange;
        }
        if !write_path(&mut self.state, &segments, value) {
            warn!(sparklet = %self.title(), binding, "Binding names an array index that does not exist");
            return DispatchOutcome::NoChange;
        }
        self.commit(vec![top.to_string()])
    }

    /// Activate a rendered button / grid cell
    pub fn press(&mut self, target: &PressTarget) -> DispatchOutcome {
        let params = match &target.params {
            PressParams::None => Value::object(),
            PressParams::Fixed(params) => params.clone(),
            PressParams::Template(template) => {
                self.interpolator
                    .interpolate_params(template, &self.state, &target.locals)
            }
        };
        self.execute_action(&target.action, params)
    }

    /// Render the view against the current state
    pub fn render(&self) -> RenderedNode {
        match &self.program {
            Some(program) => {
                let view = &program.definition.view;
                Renderer::new(
                    &view.styles,
                    &self.state,
                    &self.interpolator,
                    self.config.default_grid_columns,
                )
                .render(&view.elements)
            }
            None => RenderedNode::Placeholder {
                message: self
                    .load_error
                    .clone()
                    .unwrap_or_else(|| "Nothing to show".to_string()),
            },
        }
    }

    /// Interpolate a value against the current state
    pub fn interpolate(&self, value: &Value) -> Value {
        self.interpolator.interpolate(value, &self.state, &Object::new())
    }

    pub fn timers(&self) -> &T {
        self.scheduler.backend()
    }

    pub fn timers_mut(&mut self) -> &mut T {
        self.scheduler.backend_mut()
    }

    /// Tear down: cancel every pending timer. Later dispatches are ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        let cancelled = self.scheduler.cancel_all();
        self.closed = true;
        debug!(sparklet = %self.title(), cancelled, "Closed sparklet");
    }
}

impl<T: TimerBackend> Drop for SparkletSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl SparkletSession<VirtualTimers> {
    /// Open on the virtual clock
    pub fn headless(json: &str, config: EngineConfig) -> Self {
        Self::from_json(json, VirtualTimers::new(), config)
    }

    /// Move the virtual clock forward, firing every timer that comes due
    /// (including ones scheduled by the firings). Returns the number of
    /// dispatches.
    pub fn advance(&mut self, ms: u64) -> usize {
        let until = self.timers().now_ms().saturating_add(ms);
        let (fired, stopped) = self.fire_until(until);
        if stopped {
            warn!(
                sparklet = %self.title(),
                limit = self.config.max_fires_per_advance,
                "Stopped advancing: too many timer firings"
            );
        }
        self.timers_mut().set_now(until);
        fired
    }

    /// Fire due timers up to `until_ms`. The flag is set when the firing
    /// guard stopped the loop with timers still due.
    fn fire_until(&mut self, until_ms: u64) -> (usize, bool) {
        let limit = self.config.max_fires_per_advance;
        let mut fired = 0;
        loop {
            match self.timers_mut().next_due_ms() {
                Some(due) if due <= until_ms => {}
                _ => return (fired, false),
            }
            if fired >= limit {
                return (fired, true);
            }
            let Some(timer) = self.timers_mut().pop_due(until_ms) else {
                return (fired, false);
            };
            if self.fire(timer).is_some() {
                fired += 1;
            }
        }
    }
}

/// `helpers` for an action body: every helper plus the two scheduling
/// capabilities
fn capability_object(program: &CompiledSparklet) -> Value {
    let mut helpers: Object = program
        .helper_names()
        .map(|name| (name.to_string(), Value::Function(Callable::Helper(name.to_string()))))
        .collect();
    helpers.insert(
        "scheduleAction".to_string(),
        Value::Function(Callable::ScheduleAction),
    );
    helpers.insert(
        "cancelAction".to_string(),
        Value::Function(Callable::CancelAction),
    );
    Value::Object(helpers)
}

fn invoke_helper(
    program: &CompiledSparklet,
    state: &Value,
    rng: &mut StdRng,
    limits: Limits,
    name: &str,
    params: Value,
) -> Value {
    let Some(def) = program.helper(name) else {
        debug!(sparklet = %program.title(), helper = %name, "No such helper");
        return Value::Null;
    };

    let mut host = HelperHost { rng };
    let mut interpreter = Interpreter::new(&mut host, limits);
    match interpreter.call_function(def, vec![state.clone(), params, Value::object()]) {
        Ok(value) => value,
        Err(e) => {
            warn!(sparklet = %program.title(), helper = %name, error = %e, "Helper failed");
            Value::Null
        }
    }
}

/// Write `value` at a dotted path, creating objects along the way.
/// Array segments must name an existing index; returns false (with the
/// state untouched) when one does not.
fn write_path(target: &mut Value, segments: &[&str], value: Value) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return true;
    };
    match target {
        Value::Array(items) => match first.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => write_path(slot, rest, value),
            None => false,
        },
        Value::Object(map) => {
            let slot = map.entry(first.to_string()).or_default();
            write_path(slot, rest, value)
        }
        other => {
            *other = Value::object();
            write_path(other, segments, value)
        }
    }
}

/// Capabilities seen by an action body
struct DispatchHost<'a, T: TimerBackend> {
    program: &'a CompiledSparklet,
    state: &'a Value,
    scheduler: &'a mut Scheduler<T>,
    rng: &'a mut StdRng,
    config: &'a EngineConfig,
}

impl<T: TimerBackend> ScriptHost for DispatchHost<'_, T> {
    fn call_helper(&mut self, name: &str, params: Value) -> Result<Value> {
        Ok(invoke_helper(
            self.program,
            self.state,
            self.rng,
            self.config.limits(),
            name,
            params,
        ))
    }

    fn schedule_action(&mut self, name: &str, params: Value, delay_ms: f64) -> Result<()> {
        if self.program.action(name).is_none() {
            debug!(action = %name, "Scheduling an action that does not exist");
        }
        let delay_ms = self.config.clamp_delay_ms(delay_ms);
        self.scheduler.schedule(name, params, delay_ms);
        Ok(())
    }

    fn cancel_action(&mut self, name: &str) -> Result<()> {
        self.scheduler.cancel(name);
        Ok(())
    }

    fn random(&mut self) -> f64 {
        self.rng.gen()
    }
}

/// Capabilities seen by a helper body: randomness only
struct HelperHost<'a> {
    rng: &'a mut StdRng,
}

impl ScriptHost for HelperHost<'_> {
    fn call_helper(&mut self, name: &str, _params: Value) -> Result<Value> {
        Err(anyhow!("helpers.{} is not available inside a helper", name))
    }

    fn schedule_action(&mut self, name: &str, _params: Value, _delay_ms: f64) -> Result<()> {
        Err(anyhow!("Helpers cannot schedule '{}'", name))
    }

    fn cancel_action(&mut self, name: &str) -> Result<()> {
        Err(anyhow!("Helpers cannot cancel '{}'", name))
    }

    fn random(&mut self) -> f64 {
        self.rng.gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(definition: serde_json::Value) -> SparkletSession<VirtualTimers> {
        SparkletSession::from_value(
            definition,
            VirtualTimers::new(),
            EngineConfig::default().with_random_seed(1),
        )
    }

    fn counter() -> SparkletSession<VirtualTimers> {
        session(json!({
            "title": "Counter",
            "initialState": {"count": 0, "label": "clicks", "form": {"name": ""}},
            "helpers": {
                "double": "return state.count * 2",
                "broken": "return nothing.here"
            },
            "actions": {
                "increment": "return { count: state.count + (params.by ?? 1) }",
                "noop": "state.count = 99",
                "same": "return { count: state.count }",
                "fail": "throw_it()",
                "useHelper": "return { label: 'x' + helpers.double() }",
                "useBrokenHelper": "return { label: String(helpers.broken()) }",
                "later": "helpers.scheduleAction('increment', { by: 5 }, 1000)",
                "scheduleThenFail": "helpers.scheduleAction('increment', {}, 10); return missing.value"
            },
            "view": {"elements": [{"type": "text", "value": "{{ count }}"}]}
        }))
    }

    #[test]
    fn test_state_starts_from_initial_state() {
        let s = counter();
        assert_eq!(s.state_json(), json!({"count": 0, "label": "clicks", "form": {"name": ""}}));
        assert_eq!(s.revision(), 0);
        assert_eq!(s.title(), "Counter");
    }

    #[test]
    fn test_merge_and_revision() {
        let mut s = counter();
        assert_eq!(
            s.execute_action("increment", json!({"by": 2}).into()),
            DispatchOutcome::Updated(vec!["count".to_string()])
        );
        assert_eq!(s.state().get_path("count"), Some(&Value::Number(2.0)));
        assert_eq!(s.state().get_path("label"), Some(&Value::string("clicks")));
        assert_eq!(s.revision(), 1);
        assert_eq!(s.last_change(), ["count".to_string()]);

        assert_eq!(s.execute_action("same", Value::object()), DispatchOutcome::NoChange);
        assert_eq!(s.revision(), 1);
    }

    #[test]
    fn test_non_object_result_and_snapshot_mutation_are_no_ops() {
        let mut s = counter();
        assert_eq!(s.execute_action("noop", Value::object()), DispatchOutcome::NoChange);
        assert_eq!(s.state().get_path("count"), Some(&Value::Number(0.0)));
    }

    #[test]
    fn test_failures_are_contained() {
        let mut s = counter();
        assert!(matches!(
            s.execute_action("fail", Value::object()),
            DispatchOutcome::Failed(_)
        ));
        assert_eq!(s.execute_action("nope", Value::object()), DispatchOutcome::Missing);
        assert_eq!(s.state_json()["count"], json!(0));
    }

    #[test]
    fn test_oversized_values_fail_the_dispatch() {
        let mut s = SparkletSession::headless(
            r#"{
                "initialState": {"s": ""},
                "actions": {"blowUp": "return { s: 'ab'.repeat(1e19), list: Array.from({ length: 1e19 }) }"},
                "view": {"elements": [{"type": "text", "value": "{{ 'ab'.repeat(1e19) }}"}]}
            }"#,
            EngineConfig::default(),
        );
        assert!(matches!(
            s.execute_action("blowUp", Value::object()),
            DispatchOutcome::Failed(_)
        ));
        assert_eq!(s.state_json(), json!({"s": ""}));
        assert_eq!(s.render().leaf_count(), 1);
    }

    #[test]
    fn test_deeply_nested_body_is_skipped() {
        let parens = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        let mut s = SparkletSession::from_value(
            json!({
                "initialState": {"n": 0},
                "actions": {
                    "deep": format!("return {{ n: {} }}", parens),
                    "bump": "return { n: state.n + 1 }"
                },
                "view": {"elements": []}
            }),
            VirtualTimers::new(),
            EngineConfig::default(),
        );
        assert!(s.load_error().is_none());
        assert_eq!(s.execute_action("deep", Value::object()), DispatchOutcome::Missing);
        assert!(s.execute_action("bump", Value::object()).changed());
        assert_eq!(s.state_json()["n"], json!(1));
    }

    #[test]
    fn test_helpers() {
        let mut s = counter();
        s.execute_action("increment", json!({"by": 4}).into());
        assert_eq!(s.run_helper("double", Value::Null), Value::Number(8.0));
        assert_eq!(s.run_helper("missing", Value::Null), Value::Null);
        assert_eq!(s.run_helper("broken", Value::Null), Value::Null);

        s.execute_action("useHelper", Value::object());
        assert_eq!(s.state().get_path("label"), Some(&Value::string("x8")));
        s.execute_action("useBrokenHelper", Value::object());
        assert_eq!(s.state().get_path("label"), Some(&Value::string("null")));
    }

    #[test]
    fn test_schedule_from_action_fires_on_advance() {
        let mut s = counter();
        s.execute_action("later", Value::object());
        assert!(s.is_pending("increment"));

        assert_eq!(s.advance(999), 0);
        assert_eq!(s.advance(1), 1);
        assert_eq!(s.state_json()["count"], json!(5));
        assert!(!s.is_pending("increment"));
    }

    #[test]
    fn test_schedule_survives_later_failure() {
        let mut s = counter();
        assert!(matches!(
            s.execute_action("scheduleThenFail", Value::object()),
            DispatchOutcome::Failed(_)
        ));
        assert!(s.is_pending("increment"));
    }

    #[test]
    fn test_stale_timer_ignored() {
        let mut s = counter();
        let first = s.schedule("increment", Value::object(), 100).unwrap();
        let second = s.schedule("increment", json!({"by": 3}).into(), 100).unwrap();

        assert_eq!(s.fire(first), None);
        assert_eq!(
            s.fire(second),
            Some(DispatchOutcome::Updated(vec!["count".to_string()]))
        );
        assert_eq!(s.state_json()["count"], json!(3));
    }

    #[test]
    fn test_set_binding_writes_nested_path() {
        let mut s = counter();
        assert!(s.set_binding("state.form.name", "Ada").changed());
        assert_eq!(s.state_json()["form"], json!({"name": "Ada"}));
        assert_eq!(s.last_change(), ["form".to_string()]);
        assert_eq!(s.set_binding("form.name", "Ada"), DispatchOutcome::NoChange);

        s.set_binding("title", "Hi");
        assert_eq!(s.state_json()["title"], json!("Hi"));
    }

    #[test]
    fn test_set_binding_to_missing_index_is_no_change() {
        let mut s = SparkletSession::headless(
            r#"{"initialState": {"items": ["a"]}, "view": {"elements": []}}"#,
            EngineConfig::default(),
        );
        assert_eq!(s.set_binding("items.5", "x"), DispatchOutcome::NoChange);
        assert_eq!(s.set_binding("state.items.0.name", "x"), DispatchOutcome::NoChange);
        assert_eq!(s.revision(), 0);
        assert_eq!(s.state_json()["items"], json!(["a"]));

        assert!(s.set_binding("items.0", "b").changed());
        assert_eq!(s.state_json()["items"], json!(["b"]));
        assert_eq!(s.revision(), 1);
    }

    #[test]
    fn test_close_cancels_everything() {
        let mut s = counter();
        s.schedule("increment", Value::object(), 10);
        s.schedule("later", Value::object(), 20);
        s.close();

        assert!(s.pending().is_empty());
        assert_eq!(s.timers().armed_count(), 0);
        assert_eq!(s.execute_action("increment", Value::object()), DispatchOutcome::Closed);
        assert_eq!(s.advance(100), 0);
    }

    #[test]
    fn test_invalid_definition_renders_placeholder() {
        let s = SparkletSession::headless("{\"view\": {}}", EngineConfig::default());
        assert!(s.load_error().is_some());
        assert!(matches!(s.render(), RenderedNode::Placeholder { .. }));
        assert_eq!(s.title(), "Invalid Sparklet");
    }

    #[test]
    fn test_press_interpolates_at_activation() {
        let mut s = session(json!({
            "initialState": {"step": 2, "count": 0},
            "actions": {"add": "return { count: state.count + params.by }"},
            "view": {"elements": [
                {"type": "button", "label": "+", "onPress": "add", "params": {"by": "{{ step }}"}}
            ]}
        }));

        let target = match &s.render().children()[0] {
            RenderedNode::Button { target: Some(target), .. } => target.clone(),
            other => panic!("expected button, got {:?}", other),
        };
        s.press(&target);
        assert_eq!(s.state_json()["count"], json!(2));
    }

    #[test]
    fn test_zero_delay_loop_is_bounded() {
        let mut s = SparkletSession::from_value(
            json!({
                "initialState": {"n": 0},
                "actions": {"spin": "helpers.scheduleAction('spin', {}, 0); return { n: state.n + 1 }"},
                "view": {"elements": []}
            }),
            VirtualTimers::new(),
            EngineConfig {
                max_fires_per_advance: 50,
                ..EngineConfig::default()
            },
        );
        s.execute_action("spin", Value::object());
        assert_eq!(s.advance(10), 50);
        assert_eq!(s.state_json()["n"], json!(51));
    }

    #[test]
    fn test_firing_guard_only_trips_with_timers_still_due() {
        let mut s = SparkletSession::from_value(
            json!({
                "initialState": {"n": 0},
                "actions": {
                    "bump": "return { n: state.n + 1 }",
                    "bumpAgain": "return { n: state.n + 1 }",
                    "spin": "helpers.scheduleAction('spin', {}, 0); return { n: state.n + 1 }"
                },
                "view": {"elements": []}
            }),
            VirtualTimers::new(),
            EngineConfig {
                max_fires_per_advance: 2,
                ..EngineConfig::default()
            },
        );

        // Exactly the limit, nothing left due
        s.schedule("bump", Value::object(), 5);
        s.schedule("bumpAgain", Value::object(), 5);
        assert_eq!(s.fire_until(5), (2, false));
        assert_eq!(s.state_json()["n"], json!(2));

        // A zero-delay loop is still due when the guard stops it
        s.execute_action("spin", Value::object());
        assert_eq!(s.fire_until(5), (2, true));
        assert!(s.is_pending("spin"));
    }
}
