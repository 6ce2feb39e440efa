//! Sparklet definition loading
//!
//! Parses the definition JSON (`initialState`, `helpers`, `actions`, `view`)
//! and compiles every helper/action body once. A body that fails to parse
//! is logged and left out, so one broken action never takes the rest of the
//! Sparklet down with it.

use crate::parser::ast::{Binding, FunctionBody, FunctionDef};
use crate::parser::parse_statements;
use crate::render::element::ElementNode;
use indexmap::IndexMap;
use serde::Deserialize;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

/// Names bound for every helper/action body
pub const BODY_PARAMS: [&str; 3] = ["state", "params", "helpers"];

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Invalid definition JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Definition must be a JSON object")]
    NotAnObject,

    #[error("Definition has no view.elements")]
    MissingElements,

    #[error("initialState must be an object, found {0}")]
    InvalidInitialState(&'static str),
}

pub type StyleMap = IndexMap<String, IndexMap<String, serde_json::Value>>;

/// The `view` section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewDefinition {
    pub elements: Vec<ElementNode>,
    pub styles: StyleMap,
}

#[derive(Deserialize)]
struct RawView {
    elements: Option<Vec<ElementNode>>,
    #[serde(default)]
    styles: StyleMap,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDefinition {
    initial_state: Option<serde_json::Value>,
    #[serde(default)]
    helpers: IndexMap<String, String>,
    #[serde(default)]
    actions: IndexMap<String, String>,
    view: Option<RawView>,
    title: Option<String>,
    description: Option<String>,
    icon: Option<String>,
    version: Option<serde_json::Value>,
}

/// A parsed Sparklet definition document
#[derive(Debug, Clone, PartialEq)]
pub struct SparkletDefinition {
    pub initial_state: serde_json::Map<String, serde_json::Value>,
    pub helpers: IndexMap<String, String>,
    pub actions: IndexMap<String, String>,
    pub view: ViewDefinition,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub version: Option<serde_json::Value>,
}

impl SparkletDefinition {
    /// Parse a definition from its JSON text
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a definition from an already-decoded JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self, DefinitionError> {
        if !value.is_object() {
            return Err(DefinitionError::NotAnObject);
        }
        let raw: RawDefinition = serde_json::from_value(value)?;

        let initial_state = match raw.initial_state {
            None | Some(serde_json::Value::Null) => serde_json::Map::new(),
            Some(serde_json::Value::Object(map)) => map,
            Some(other) => return Err(DefinitionError::InvalidInitialState(json_type(&other))),
        };
        let view = raw.view.ok_or(DefinitionError::MissingElements)?;
        let elements = view.elements.ok_or(DefinitionError::MissingElements)?;

        Ok(SparkletDefinition {
            initial_state,
            helpers: raw.helpers,
            actions: raw.actions,
            view: ViewDefinition {
                elements,
                styles: view.styles,
            },
            title: raw.title,
            description: raw.description,
            icon: raw.icon,
            version: raw.version,
        })
    }

    /// Display name used in logs and outlines
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled Sparklet")
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A definition with its helper and action bodies compiled
#[derive(Debug)]
pub struct CompiledSparklet {
    pub definition: SparkletDefinition,
    helpers: IndexMap<String, Rc<FunctionDef>>,
    actions: IndexMap<String, Rc<FunctionDef>>,
}

impl CompiledSparklet {
    /// Compile every body once
    pub fn compile(definition: SparkletDefinition) -> Self {
        let title = definition.display_title().to_string();
        let helpers = compile_all(&title, "helper", &definition.helpers);
        let actions = compile_all(&title, "action", &definition.actions);
        debug!(
            sparklet = %title,
            helpers = helpers.len(),
            actions = actions.len(),
            "Compiled sparklet"
        );

        CompiledSparklet {
            definition,
            helpers,
            actions,
        }
    }

    pub fn helper(&self, name: &str) -> Option<&Rc<FunctionDef>> {
        self.helpers.get(name)
    }

    pub fn action(&self, name: &str) -> Option<&Rc<FunctionDef>> {
        self.actions.get(name)
    }

    /// Helpers that compiled, in declaration order
    pub fn helper_names(&self) -> impl Iterator<Item = &str> {
        self.helpers.keys().map(String::as_str)
    }

    /// Actions that compiled, in declaration order
    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn title(&self) -> &str {
        self.definition.display_title()
    }
}

fn compile_all(
    sparklet: &str,
    kind: &str,
    bodies: &IndexMap<String, String>,
) -> IndexMap<String, Rc<FunctionDef>> {
    bodies
        .iter()
        .filter_map(|(name, source)| {
            compile_body(name, source)
                .map_err(|e| {
                    warn!(sparklet = %sparklet, kind, name = %name, error = %e, "Body failed to compile; ignoring it");
                })
                .ok()
                .map(|def| (name.clone(), def))
        })
        .collect()
}

/// Compile one body. A body that is itself a single function literal
/// (`(state, params) => ...`) is used as written; anything else becomes
/// the body of a function taking `(state, params, helpers)`.
pub fn compile_body(name: &str, source: &str) -> anyhow::Result<Rc<FunctionDef>> {
    let program = parse_statements(source)?;
    if let Some(def) = program.as_function() {
        return Ok(def);
    }

    Ok(Rc::new(FunctionDef {
        name: Some(name.to_string()),
        params: BODY_PARAMS.iter().map(|p| Binding::identifier(*p)).collect(),
        body: FunctionBody::Block(program.statements),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_definition() {
        let def = SparkletDefinition::from_json(r#"{"view": {"elements": []}}"#).unwrap();
        assert!(def.initial_state.is_empty());
        assert!(def.view.elements.is_empty());
        assert_eq!(def.display_title(), "Untitled Sparklet");
    }

    #[test]
    fn test_missing_elements_is_error() {
        assert!(matches!(
            SparkletDefinition::from_json(r#"{"initialState": {}}"#),
            Err(DefinitionError::MissingElements)
        ));
        assert!(matches!(
            SparkletDefinition::from_json(r#"{"view": {"styles": {}}}"#),
            Err(DefinitionError::MissingElements)
        ));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            SparkletDefinition::from_json("{not json"),
            Err(DefinitionError::Json(_))
        ));
        assert!(matches!(
            SparkletDefinition::from_json("[1, 2]"),
            Err(DefinitionError::NotAnObject)
        ));
    }

    #[test]
    fn test_initial_state_must_be_object() {
        let result = SparkletDefinition::from_value(json!({
            "initialState": [1, 2],
            "view": {"elements": []}
        }));
        assert!(matches!(result, Err(DefinitionError::InvalidInitialState("array"))));
    }

    #[test]
    fn test_bad_body_is_skipped() {
        let def = SparkletDefinition::from_value(json!({
            "title": "Counter",
            "actions": {
                "increment": "return { count: state.count + 1 }",
                "broken": "return {{{"
            },
            "view": {"elements": []}
        }))
        .unwrap();

        let compiled = CompiledSparklet::compile(def);
        assert!(compiled.action("increment").is_some());
        assert!(compiled.action("broken").is_none());
        assert_eq!(compiled.action_names().collect::<Vec<_>>(), vec!["increment"]);
        assert_eq!(compiled.title(), "Counter");
    }

    #[test]
    fn test_function_literal_body_used_as_written() {
        let def = compile_body("inc", "(s, p) => ({ count: s.count + p.by })").unwrap();
        assert_eq!(def.params.len(), 2);
        assert!(def.name.is_none());

        let wrapped = compile_body("inc", "return 1").unwrap();
        assert_eq!(wrapped.params.len(), 3);
        assert_eq!(wrapped.name.as_deref(), Some("inc"));
    }
}
