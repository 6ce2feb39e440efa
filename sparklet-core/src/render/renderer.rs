//! View tree -> `RenderedNode` tree
//!
//! Rendering is a pure function of the element tree, the style map and the
//! current state. Interactive nodes carry a [`PressTarget`] or a binding
//! path that the host hands back to the session.

use crate::definition::StyleMap;
use crate::interpolate::{has_spans, Interpolator};
use crate::render::element::{state_path, ElementKind, ElementNode, StyleRef};
use crate::render::style::{resolve_style, NativeStyle};
use crate::runtime::{Object, Value};
use tracing::{debug, warn};

/// What a press should dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct PressTarget {
    pub action: String,
    pub params: PressParams,
    /// Local bindings at the pressed node (grid `element`/`index`)
    pub locals: Object,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PressParams {
    None,
    /// Declared `params`, interpolated when the press happens
    Template(serde_json::Value),
    /// Already resolved (default grid cells pass `{index}`)
    Fixed(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderedNode {
    Text {
        text: String,
        style: NativeStyle,
    },
    Button {
        label: String,
        target: Option<PressTarget>,
        container_style: NativeStyle,
        text_style: NativeStyle,
    },
    Input {
        binding: String,
        value: String,
        placeholder: String,
        style: NativeStyle,
    },
    Container {
        children: Vec<RenderedNode>,
        style: NativeStyle,
    },
    Grid {
        columns: usize,
        cells: Vec<RenderedNode>,
        style: NativeStyle,
    },
    /// Shown instead of the view when the definition could not be loaded
    Placeholder {
        message: String,
    },
}

impl RenderedNode {
    /// Leaf widgets under (and including) this node
    pub fn leaf_count(&self) -> usize {
        match self {
            RenderedNode::Container { children, .. } => children.iter().map(Self::leaf_count).sum(),
            RenderedNode::Grid { cells, .. } => cells.iter().map(Self::leaf_count).sum(),
            _ => 1,
        }
    }

    pub fn children(&self) -> &[RenderedNode] {
        match self {
            RenderedNode::Container { children, .. } => children,
            RenderedNode::Grid { cells, .. } => cells,
            _ => &[],
        }
    }

    /// Pre-order walk
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a RenderedNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Is this node hidden by `display: none`?
    pub fn is_hidden(&self) -> bool {
        match self {
            RenderedNode::Text { style, .. }
            | RenderedNode::Input { style, .. }
            | RenderedNode::Container { style, .. }
            | RenderedNode::Grid { style, .. } => style.hidden,
            RenderedNode::Button {
                container_style, ..
            } => container_style.hidden,
            RenderedNode::Placeholder { .. } => false,
        }
    }
}

/// Renders one view against one state
pub struct Renderer<'a> {
    styles: &'a StyleMap,
    state: &'a Value,
    interpolator: &'a Interpolator,
    default_columns: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(
        styles: &'a StyleMap,
        state: &'a Value,
        interpolator: &'a Interpolator,
        default_columns: usize,
    ) -> Self {
        Renderer {
            styles,
            state,
            interpolator,
            default_columns,
        }
    }

    /// Render the top-level elements into a root container
    pub fn render(&self, elements: &[ElementNode]) -> RenderedNode {
        let locals = Object::new();
        let mut children = Vec::new();
        for node in elements {
            self.render_node(node, &locals, &mut children);
        }
        RenderedNode::Container {
            children,
            style: NativeStyle::default(),
        }
    }

    fn render_node(&self, node: &ElementNode, locals: &Object, out: &mut Vec<RenderedNode>) {
        if !self.is_visible(node, locals) {
            return;
        }

        match &node.kind {
            ElementKind::Text => out.push(RenderedNode::Text {
                text: self.text_of(node.value.as_ref(), locals),
                style: self.style_of(node, locals),
            }),
            ElementKind::Button => {
                let (container_style, text_style) = self.style_of(node, locals).split_text();
                out.push(RenderedNode::Button {
                    label: self.text_of(node.label.as_ref().or(node.value.as_ref()), locals),
                    target: node.on_press.as_ref().map(|action| PressTarget {
                        action: action.clone(),
                        params: match &node.params {
                            Some(params) => PressParams::Template(params.clone()),
                            None => PressParams::None,
                        },
                        locals: locals.clone(),
                    }),
                    container_style,
                    text_style,
                });
            }
            ElementKind::Input => {
                let binding = node.binding.as_deref().map(state_path).unwrap_or_default();
                let value = if binding.is_empty() {
                    String::new()
                } else {
                    self.state
                        .get_path(binding)
                        .map(Value::to_display_text)
                        .unwrap_or_default()
                };
                out.push(RenderedNode::Input {
                    binding: binding.to_string(),
                    value,
                    placeholder: self.text_of(node.placeholder.as_ref(), locals),
                    style: self.style_of(node, locals),
                });
            }
            ElementKind::Container | ElementKind::View => {
                let mut children = Vec::new();
                for child in node.child_nodes() {
                    self.render_node(child, locals, &mut children);
                }
                out.push(RenderedNode::Container {
                    children,
                    style: self.style_of(node, locals),
                });
            }
            ElementKind::Grid => out.push(self.render_grid(node, locals)),
            ElementKind::Unknown | ElementKind::Other(_) => {
                debug!(kind = ?node.kind, "Unrecognized element type; rendering nothing");
            }
        }
    }

    fn render_grid(&self, node: &ElementNode, locals: &Object) -> RenderedNode {
        let items = self.grid_items(node, locals);
        let has_template = node.child_nodes().next().is_some();

        let cells = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let mut cell_locals = locals.clone();
                cell_locals.insert("element".to_string(), item.clone());
                cell_locals.insert("index".to_string(), Value::Number(index as f64));

                if has_template {
                    let mut children = Vec::new();
                    for child in node.child_nodes() {
                        self.render_node(child, &cell_locals, &mut children);
                    }
                    RenderedNode::Container {
                        children,
                        style: NativeStyle::default(),
                    }
                } else {
                    let mut params = Object::new();
                    params.insert("index".to_string(), Value::Number(index as f64));
                    RenderedNode::Button {
                        label: item.to_display_text(),
                        target: node.on_press.as_ref().map(|action| PressTarget {
                            action: action.clone(),
                            params: PressParams::Fixed(Value::Object(params)),
                            locals: cell_locals,
                        }),
                        container_style: NativeStyle::default(),
                        text_style: NativeStyle::default(),
                    }
                }
            })
            .collect();

        RenderedNode::Grid {
            columns: self.columns_of(node, locals),
            cells,
            style: self.style_of(node, locals),
        }
    }

    fn grid_items(&self, node: &ElementNode, locals: &Object) -> Vec<Value> {
        let Some(source) = node.data_source.as_deref() else {
            return Vec::new();
        };
        let resolved = if has_spans(source) {
            self.interpolator.interpolate_str(source, self.state, locals)
        } else {
            let path = state_path(source);
            locals
                .get(path)
                .or_else(|| self.state.get_path(path))
                .cloned()
                .unwrap_or_default()
        };
        match resolved {
            Value::Array(items) => items,
            Value::Undefined | Value::Null => Vec::new(),
            other => {
                warn!(data_source = %source, found = other.type_of(), "Grid dataSource is not an array");
                Vec::new()
            }
        }
    }

    fn columns_of(&self, node: &ElementNode, locals: &Object) -> usize {
        node.columns
            .as_ref()
            .map(|raw| self.interpolator.interpolate_json(raw, self.state, locals).to_number())
            .filter(|n| n.is_finite() && *n >= 1.0)
            .map(|n| (n as usize).min(64))
            .unwrap_or(self.default_columns)
    }

    fn text_of(&self, raw: Option<&serde_json::Value>, locals: &Object) -> String {
        raw.map(|raw| {
            self.interpolator
                .interpolate_json(raw, self.state, locals)
                .to_display_text()
        })
        .unwrap_or_default()
    }

    fn style_of(&self, node: &ElementNode, locals: &Object) -> NativeStyle {
        let declarations = match &node.style {
            None => return NativeStyle::default(),
            Some(StyleRef::Inline(declarations)) => declarations,
            Some(StyleRef::Named(name)) => match self.styles.get(name) {
                Some(declarations) => declarations,
                None => {
                    debug!(style = %name, "Unknown style name");
                    return NativeStyle::default();
                }
            },
        };
        resolve_style(declarations, |value| {
            self.interpolator.interpolate_json(value, self.state, locals)
        })
    }

    /// `visible` must resolve to `false` to hide a node and `hidden` to
    /// `true`. Any non-boolean result is an authoring error: it is logged
    /// and the attribute is ignored.
    fn is_visible(&self, node: &ElementNode, locals: &Object) -> bool {
        if let Some(raw) = &node.visible {
            if self.condition(raw, locals, "visible") == Some(false) {
                return false;
            }
        }
        if let Some(raw) = &node.hidden {
            if self.condition(raw, locals, "hidden") == Some(true) {
                return false;
            }
        }
        true
    }

    fn condition(&self, raw: &serde_json::Value, locals: &Object, attribute: &str) -> Option<bool> {
        let value = match raw {
            serde_json::Value::String(source) if !has_spans(source) => self
                .interpolator
                .evaluate(source, self.state, locals)
                .unwrap_or_else(|e| {
                    warn!(attribute, expression = %source, error = %e, "Visibility expression failed");
                    Value::Undefined
                }),
            other => self.interpolator.interpolate_json(other, self.state, locals),
        };
        match value {
            Value::Bool(b) => Some(b),
            other => {
                warn!(
                    attribute,
                    found = other.type_of(),
                    "Visibility must be a boolean; ignoring it"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn elements(value: serde_json::Value) -> Vec<ElementNode> {
        serde_json::from_value(value).unwrap()
    }

    fn render(view: serde_json::Value, styles: serde_json::Value, state: serde_json::Value) -> RenderedNode {
        let styles: StyleMap = serde_json::from_value(styles).unwrap();
        let state = Value::from(state);
        let interpolator = Interpolator::default();
        Renderer::new(&styles, &state, &interpolator, 3).render(&elements(view))
    }

    #[test]
    fn test_text_and_button() {
        let root = render(
            json!([
                {"type": "text", "value": "Count: {{ count }}"},
                {"type": "button", "label": "Add", "onPress": "add", "params": {"by": "{{ step }}"}, "style": "btn"}
            ]),
            json!({"btn": {"color": "white", "padding": "4px"}}),
            json!({"count": 2, "step": 5}),
        );

        let children = root.children();
        assert_eq!(
            children[0],
            RenderedNode::Text {
                text: "Count: 2".to_string(),
                style: NativeStyle::default()
            }
        );
        match &children[1] {
            RenderedNode::Button {
                label,
                target: Some(target),
                container_style,
                text_style,
            } => {
                assert_eq!(label, "Add");
                assert_eq!(target.action, "add");
                assert_eq!(target.params, PressParams::Template(json!({"by": "{{ step }}"})));
                assert!(container_style.get("padding").is_some());
                assert!(text_style.get("color").is_some());
            }
            other => panic!("expected button, got {:?}", other),
        }
    }

    #[test]
    fn test_input_reads_binding() {
        let root = render(
            json!([{"type": "input", "binding": "state.profile.name", "placeholder": "Name"}]),
            json!({}),
            json!({"profile": {"name": "Ada"}}),
        );
        assert_eq!(
            root.children()[0],
            RenderedNode::Input {
                binding: "profile.name".to_string(),
                value: "Ada".to_string(),
                placeholder: "Name".to_string(),
                style: NativeStyle::default()
            }
        );
    }

    #[test]
    fn test_visibility_is_boolean_only() {
        let root = render(
            json!([
                {"type": "text", "value": "a", "visible": "{{ showA }}"},
                {"type": "text", "value": "b", "hidden": "count > 1"},
                {"type": "text", "value": "c", "visible": "{{ label }}"},
                {"type": "text", "value": "d", "visible": "false"},
                {"type": "text", "value": "e", "visible": true}
            ]),
            json!({}),
            json!({"showA": false, "count": 2, "label": "false"}),
        );
        let texts: Vec<_> = root
            .children()
            .iter()
            .map(|n| match n {
                RenderedNode::Text { text, .. } => text.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(texts, vec!["c", "e"]);
    }

    #[test]
    fn test_grid_template_renders_per_item() {
        let root = render(
            json!([{
                "type": "grid",
                "dataSource": "state.board",
                "columns": 3,
                "elements": [
                    {"type": "text", "value": "{{ element }}"},
                    {"type": "button", "label": "#{{ index }}", "onPress": "pick", "params": {"index": "{{ index }}"}}
                ]
            }]),
            json!({}),
            json!({"board": ["X", "", "O", "", "", ""]}),
        );

        let grid = &root.children()[0];
        assert_eq!(grid.leaf_count(), 12);
        match grid {
            RenderedNode::Grid { columns, cells, .. } => {
                assert_eq!(*columns, 3);
                match &cells[2].children()[1] {
                    RenderedNode::Button {
                        label,
                        target: Some(target),
                        ..
                    } => {
                        assert_eq!(label, "#2");
                        assert_eq!(target.locals.get("element"), Some(&Value::string("O")));
                    }
                    other => panic!("expected button, got {:?}", other),
                }
            }
            other => panic!("expected grid, got {:?}", other),
        }
    }

    #[test]
    fn test_grid_default_cells() {
        let root = render(
            json!([{"type": "grid", "dataSource": "cells", "onPress": "tap"}]),
            json!({}),
            json!({"cells": [1, 2, 3, 4]}),
        );
        let grid = &root.children()[0];
        assert_eq!(grid.leaf_count(), 4);
        match &grid.children()[3] {
            RenderedNode::Button {
                label,
                target: Some(target),
                ..
            } => {
                assert_eq!(label, "4");
                let mut expected = Object::new();
                expected.insert("index".to_string(), Value::Number(3.0));
                assert_eq!(target.params, PressParams::Fixed(Value::Object(expected)));
            }
            other => panic!("expected cell button, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_types_and_missing_source() {
        let root = render(
            json!([
                {"type": "slider"},
                {"type": "grid", "dataSource": "nothing"},
                {"type": "view", "children": [{"type": "text", "value": "inner"}]}
            ]),
            json!({}),
            json!({}),
        );
        assert_eq!(root.children().len(), 2);
        assert_eq!(root.children()[0].leaf_count(), 0);
        assert_eq!(root.children()[1].leaf_count(), 1);
    }

    #[test]
    fn test_display_none_marks_hidden() {
        let root = render(
            json!([{"type": "container", "style": "gone", "elements": []}]),
            json!({"gone": {"display": "{{ collapsed ? 'none' : 'flex' }}"}}),
            json!({"collapsed": true}),
        );
        assert!(root.children()[0].is_hidden());
    }
}
