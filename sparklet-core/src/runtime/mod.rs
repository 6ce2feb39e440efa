// sparklet-core/src/runtime/mod.rs
pub mod builtins;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod value;

#[cfg(test)]
mod evaluator_tests;

pub use environment::Environment;
pub use interpreter::{ControlFlow, Interpreter, Limits, PureHost, ScriptHost};
pub use value::{format_number, Callable, Closure, Object, Value};
