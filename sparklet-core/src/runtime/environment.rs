//! Lexical scopes for script bindings
//!
//! `let`/`var` slots are writable, `const` slots are not. Closures capture a
//! flattened snapshot of every visible binding.

use crate::runtime::value::Value;
use anyhow::{anyhow, Result};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    mutable: bool,
}

/// Stack of binding scopes for one evaluation
#[derive(Debug)]
pub struct Environment {
    /// Stack of scopes (inner scopes shadow outer ones)
    scopes: Vec<HashMap<String, Slot>>,
}

impl Environment {
    /// Create a new environment with a global scope
    pub fn new() -> Self {
        Environment {
            scopes: vec![HashMap::new()],
        }
    }

    /// Rebuild an environment from captured bindings (see [`Environment::snapshot`])
    pub fn from_captured(captured: &[(String, Value)]) -> Self {
        let mut env = Environment::new();
        for (name, value) in captured {
            env.define(name.clone(), value.clone(), true);
        }
        env
    }

    /// Push a new scope (e.g., when entering a block)
    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the current scope (e.g., when exiting a block)
    pub fn pop_scope(&mut self) {
        // Never pop the global scope
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Define a new variable in the current scope
    pub fn define(&mut self, name: String, value: Value, mutable: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, Slot { value, mutable });
        }
    }

    /// Get a variable's value (searches from inner to outer scopes)
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .map(|slot| &slot.value)
    }

    /// Mutable access to a variable for in-place updates.
    /// Fails for undeclared names and `const` bindings.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Value> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                if !slot.mutable {
                    return Err(anyhow!("Assignment to constant variable '{}'", name));
                }
                return Ok(&mut slot.value);
            }
        }
        Err(anyhow!("{} is not defined", name))
    }

    /// Mutable access to a binding's contents. `const` only forbids
    /// rebinding, so element and property writes go through here.
    pub fn get_contents_mut(&mut self, name: &str) -> Result<&mut Value> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .map(|slot| &mut slot.value)
            .ok_or_else(|| anyhow!("{} is not defined", name))
    }

    /// Set a variable's value (updates in the scope where it's defined)
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        *self.get_mut(name)? = value;
        Ok(())
    }

    /// Check if a variable is defined in any scope
    pub fn is_defined(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Flatten every visible binding, outermost first, for closure capture
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut result: Vec<(String, Value)> = Vec::new();
        for scope in &self.scopes {
            for (name, slot) in scope {
                match seen.get(name.as_str()) {
                    Some(&index) => result[index].1 = slot.value.clone(),
                    None => {
                        seen.insert(name, result.len());
                        result.push((name.clone(), slot.value.clone()));
                    }
                }
            }
        }
        result
    }

    /// Current scope depth (1 = global only)
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
