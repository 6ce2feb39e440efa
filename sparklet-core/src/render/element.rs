//! Declarative element tree as it appears in `view.elements`

use indexmap::IndexMap;
use serde::Deserialize;

/// Element `type`
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum ElementKind {
    Text,
    Button,
    Input,
    Container,
    View,
    Grid,
    /// Anything else renders nothing
    #[default]
    Unknown,
    Other(String),
}

impl From<String> for ElementKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "text" => ElementKind::Text,
            "button" => ElementKind::Button,
            "input" => ElementKind::Input,
            "container" => ElementKind::Container,
            "view" => ElementKind::View,
            "grid" => ElementKind::Grid,
            "" => ElementKind::Unknown,
            _ => ElementKind::Other(name),
        }
    }
}

/// `style` is normally the name of an entry in `view.styles`; an inline
/// declaration object is accepted too
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StyleRef {
    Named(String),
    Inline(IndexMap<String, serde_json::Value>),
}

/// One node of the view tree. Never mutated at runtime.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    #[serde(rename = "type", default)]
    pub kind: ElementKind,
    pub style: Option<StyleRef>,
    pub value: Option<serde_json::Value>,
    pub label: Option<serde_json::Value>,
    pub on_press: Option<String>,
    pub params: Option<serde_json::Value>,
    pub binding: Option<String>,
    pub data_source: Option<String>,
    pub elements: Option<Vec<ElementNode>>,
    pub children: Option<Vec<ElementNode>>,
    pub visible: Option<serde_json::Value>,
    pub hidden: Option<serde_json::Value>,
    pub placeholder: Option<serde_json::Value>,
    pub columns: Option<serde_json::Value>,
}

impl ElementNode {
    /// `elements` followed by `children`
    pub fn child_nodes(&self) -> impl Iterator<Item = &ElementNode> {
        self.elements
            .iter()
            .flatten()
            .chain(self.children.iter().flatten())
    }
}

/// Strip the optional `state.` prefix from a binding or data source path
pub fn state_path(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix("state.").unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_button() {
        let node: ElementNode = serde_json::from_value(json!({
            "type": "button",
            "label": "Reset",
            "onPress": "reset",
            "params": {"hard": true},
            "style": "primaryButton"
        }))
        .unwrap();

        assert_eq!(node.kind, ElementKind::Button);
        assert_eq!(node.on_press.as_deref(), Some("reset"));
        assert_eq!(node.style, Some(StyleRef::Named("primaryButton".to_string())));
    }

    #[test]
    fn test_unknown_type_and_inline_style() {
        let node: ElementNode = serde_json::from_value(json!({
            "type": "slider",
            "style": {"width": "10px"}
        }))
        .unwrap();

        assert_eq!(node.kind, ElementKind::Other("slider".to_string()));
        assert!(matches!(node.style, Some(StyleRef::Inline(_))));
    }

    #[test]
    fn test_child_nodes_chain_elements_and_children() {
        let node: ElementNode = serde_json::from_value(json!({
            "type": "container",
            "elements": [{"type": "text", "value": "a"}],
            "children": [{"type": "text", "value": "b"}]
        }))
        .unwrap();
        assert_eq!(node.child_nodes().count(), 2);
    }

    #[test]
    fn test_state_path() {
        assert_eq!(state_path("state.board"), "board");
        assert_eq!(state_path(" name "), "name");
    }
}
