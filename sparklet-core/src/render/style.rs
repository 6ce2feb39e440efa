//! Web-style declarations to native style values
//!
//! Length units become plain numbers (`px`, `em`/`rem` at 16px, `pt` at
//! 4/3px), `transform` and `boxShadow` strings become structured values,
//! `display: none` becomes a hidden zero-size box and web-only properties
//! are dropped.

use crate::runtime::{format_number, Value};
use indexmap::IndexMap;
use std::fmt;
use tracing::debug;

/// Pixels per `em`/`rem`
pub const EM_PX: f64 = 16.0;

/// Properties with no native meaning
const DROPPED: &[&str] = &[
    "cursor",
    "userSelect",
    "transition",
    "outline",
    "pointerEvents",
    "boxSizing",
    "WebkitTapHighlightColor",
];

/// Properties that style a button's label rather than its box
const TEXT_PROPERTIES: &[&str] = &[
    "color",
    "fontSize",
    "fontWeight",
    "fontFamily",
    "fontStyle",
    "fontVariant",
    "letterSpacing",
    "lineHeight",
    "textAlign",
    "textDecorationLine",
    "textDecorationColor",
    "textShadowColor",
    "textTransform",
];

/// Properties that stay strings even when numeric
const KEEP_TEXT: &[&str] = &["fontWeight"];

#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Number(f64),
    Text(String),
    Bool(bool),
    /// Arrays and objects, passed along untouched
    Raw(serde_json::Value),
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleValue::Number(n) => write!(f, "{}", format_number(*n)),
            StyleValue::Text(s) => write!(f, "{}", s),
            StyleValue::Bool(b) => write!(f, "{}", b),
            StyleValue::Raw(json) => write!(f, "{}", json),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    TranslateX(f64),
    TranslateY(f64),
    Scale(f64),
    ScaleX(f64),
    ScaleY(f64),
    /// Angle kept in its CSS form (`45deg`)
    Rotate(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shadow {
    pub offset_x: f64,
    pub offset_y: f64,
    pub blur: f64,
    pub color: String,
    /// Android-style elevation derived from the blur radius
    pub elevation: f64,
}

/// A resolved style ready for a native widget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeStyle {
    pub props: IndexMap<String, StyleValue>,
    pub transform: Vec<Transform>,
    pub shadow: Option<Shadow>,
    pub hidden: bool,
}

impl NativeStyle {
    pub fn is_empty(&self) -> bool {
        self.props.is_empty() && self.transform.is_empty() && self.shadow.is_none() && !self.hidden
    }

    pub fn get(&self, name: &str) -> Option<&StyleValue> {
        self.props.get(name)
    }

    /// Split into (container, text) styles for a button. Transform, shadow
    /// and visibility belong to the container.
    pub fn split_text(self) -> (NativeStyle, NativeStyle) {
        let mut container = NativeStyle {
            transform: self.transform,
            shadow: self.shadow,
            hidden: self.hidden,
            ..NativeStyle::default()
        };
        let mut text = NativeStyle::default();
        for (name, value) in self.props {
            if TEXT_PROPERTIES.contains(&name.as_str()) {
                text.props.insert(name, value);
            } else {
                container.props.insert(name, value);
            }
        }
        (container, text)
    }
}

/// Resolve one declaration block. `interpolate` evaluates `{{ }}` spans in
/// a declared value against the current render context.
pub fn resolve_style<F>(declarations: &IndexMap<String, serde_json::Value>, interpolate: F) -> NativeStyle
where
    F: Fn(&serde_json::Value) -> Value,
{
    let mut style = NativeStyle::default();

    for (raw_name, raw_value) in declarations {
        let name = camel_case(raw_name);
        if DROPPED.contains(&name.as_str()) {
            continue;
        }

        let value = interpolate(raw_value);
        match name.as_str() {
            "display" => match value.as_str().map(str::trim) {
                Some("none") => {
                    style.hidden = true;
                    style.props.insert("width".to_string(), StyleValue::Number(0.0));
                    style.props.insert("height".to_string(), StyleValue::Number(0.0));
                    style
                        .props
                        .insert("overflow".to_string(), StyleValue::Text("hidden".to_string()));
                }
                Some("flex") => {
                    style
                        .props
                        .insert(name, StyleValue::Text("flex".to_string()));
                }
                _ => {}
            },
            "transform" => match &value {
                Value::String(text) => {
                    style.transform = parse_transform(text);
                    if style.transform.is_empty() && !text.trim().is_empty() {
                        debug!(transform = %text, "Unsupported transform dropped");
                    }
                }
                other => {
                    if let Some(converted) = style_value(&name, other) {
                        style.props.insert(name, converted);
                    }
                }
            },
            "boxShadow" => match value.as_str().and_then(parse_box_shadow) {
                Some(shadow) => style.shadow = Some(shadow),
                None => debug!(value = %value, "Unparseable boxShadow dropped"),
            },
            _ => {
                if let Some(converted) = style_value(&name, &value) {
                    style.props.insert(name, converted);
                }
            }
        }
    }

    style
}

fn style_value(name: &str, value: &Value) -> Option<StyleValue> {
    match value {
        Value::Undefined | Value::Null | Value::Function(_) => None,
        Value::Bool(b) => Some(StyleValue::Bool(*b)),
        Value::Number(n) if KEEP_TEXT.contains(&name) => Some(StyleValue::Text(format_number(*n))),
        Value::Number(n) => Some(StyleValue::Number(*n)),
        Value::String(text) if KEEP_TEXT.contains(&name) => Some(StyleValue::Text(text.trim().to_string())),
        Value::String(text) => Some(match parse_length(text) {
            Some(px) => StyleValue::Number(px),
            None => StyleValue::Text(text.clone()),
        }),
        Value::Array(_) | Value::Object(_) => Some(StyleValue::Raw(value.to_json())),
    }
}

/// `12px`, `1.5em`, `2rem`, `9pt` or a bare number, in pixels.
/// Percentages and anything else are not lengths.
pub fn parse_length(text: &str) -> Option<f64> {
    let text = text.trim();
    let (number, multiplier, divisor) = if let Some(n) = text.strip_suffix("px") {
        (n, 1.0, 1.0)
    } else if let Some(n) = text.strip_suffix("rem") {
        (n, EM_PX, 1.0)
    } else if let Some(n) = text.strip_suffix("em") {
        (n, EM_PX, 1.0)
    } else if let Some(n) = text.strip_suffix("pt") {
        (n, 4.0, 3.0)
    } else {
        (text, 1.0, 1.0)
    };

    let number = number.trim();
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')) {
        return None;
    }
    number
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n * multiplier / divisor)
}

/// `translate(10px, 5px) scale(1.2) rotate(45deg)`
pub fn parse_transform(text: &str) -> Vec<Transform> {
    let mut transforms = Vec::new();
    let mut rest = text.trim();

    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')').map(|c| open + c) else {
            break;
        };
        let name = rest[..open].trim();
        let args: Vec<&str> = rest[open + 1..close]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|a| !a.is_empty())
            .collect();
        rest = &rest[close + 1..];

        let lengths: Option<Vec<f64>> = args.iter().map(|a| parse_length(a)).collect();
        match (name, lengths.as_deref()) {
            ("translate", Some([x])) => transforms.push(Transform::TranslateX(*x)),
            ("translate", Some([x, y])) => {
                transforms.push(Transform::TranslateX(*x));
                transforms.push(Transform::TranslateY(*y));
            }
            ("translateX", Some([x])) => transforms.push(Transform::TranslateX(*x)),
            ("translateY", Some([y])) => transforms.push(Transform::TranslateY(*y)),
            ("scale", Some([s])) => transforms.push(Transform::Scale(*s)),
            ("scale", Some([x, y])) => {
                transforms.push(Transform::ScaleX(*x));
                transforms.push(Transform::ScaleY(*y));
            }
            ("scaleX", Some([x])) => transforms.push(Transform::ScaleX(*x)),
            ("scaleY", Some([y])) => transforms.push(Transform::ScaleY(*y)),
            ("rotate", _) if args.len() == 1 => transforms.push(Transform::Rotate(args[0].to_string())),
            _ => debug!(function = %name, "Unsupported transform function"),
        }
    }

    transforms
}

/// `<offset-x> <offset-y> [blur] [spread] [color]`; `inset` is ignored
pub fn parse_box_shadow(text: &str) -> Option<Shadow> {
    let mut lengths = Vec::new();
    let mut color = Vec::new();
    for token in split_top_level(text) {
        if token == "inset" {
            continue;
        }
        match parse_length(token) {
            Some(px) if color.is_empty() && lengths.len() < 4 => lengths.push(px),
            _ => color.push(token),
        }
    }

    if lengths.len() < 2 {
        return None;
    }
    let blur = lengths.get(2).copied().unwrap_or(0.0);
    Some(Shadow {
        offset_x: lengths[0],
        offset_y: lengths[1],
        blur,
        color: if color.is_empty() {
            "black".to_string()
        } else {
            color.join(" ")
        },
        elevation: blur / 2.0,
    })
}

/// Split on whitespace outside parentheses (`rgba(0, 0, 0, 0.2)` stays whole)
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if c.is_whitespace() && depth == 0 {
            if let Some(s) = start.take() {
                parts.push(&text[s..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        parts.push(&text[s..]);
    }
    parts
}

/// `background-color` -> `backgroundColor`, `-webkit-x` -> `WebkitX`
pub fn camel_case(name: &str) -> String {
    if !name.contains('-') {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declarations(value: serde_json::Value) -> IndexMap<String, serde_json::Value> {
        serde_json::from_value(value).unwrap()
    }

    fn resolve(value: serde_json::Value) -> NativeStyle {
        resolve_style(&declarations(value), Value::from_json)
    }

    #[test]
    fn test_lengths() {
        assert_eq!(parse_length("12px"), Some(12.0));
        assert_eq!(parse_length("1.5em"), Some(24.0));
        assert_eq!(parse_length("2rem"), Some(32.0));
        assert_eq!(parse_length("9pt"), Some(12.0));
        assert_eq!(parse_length(" 40 "), Some(40.0));
        assert_eq!(parse_length("50%"), None);
        assert_eq!(parse_length("red"), None);
        assert_eq!(parse_length("px"), None);
    }

    #[test]
    fn test_units_normalized() {
        let style = resolve(json!({
            "padding": "8px",
            "margin": 4,
            "width": "50%",
            "fontWeight": 700,
            "backgroundColor": "#222"
        }));
        assert_eq!(style.get("padding"), Some(&StyleValue::Number(8.0)));
        assert_eq!(style.get("margin"), Some(&StyleValue::Number(4.0)));
        assert_eq!(style.get("width"), Some(&StyleValue::Text("50%".to_string())));
        assert_eq!(style.get("fontWeight"), Some(&StyleValue::Text("700".to_string())));
        assert_eq!(style.get("backgroundColor"), Some(&StyleValue::Text("#222".to_string())));
    }

    #[test]
    fn test_web_only_dropped_and_kebab_camel_cased() {
        let style = resolve(json!({
            "cursor": "pointer",
            "user-select": "none",
            "-webkit-tap-highlight-color": "transparent",
            "border-radius": "6px"
        }));
        assert_eq!(style.props.len(), 1);
        assert_eq!(style.get("borderRadius"), Some(&StyleValue::Number(6.0)));
    }

    #[test]
    fn test_display_none_hides() {
        let style = resolve(json!({"display": "none"}));
        assert!(style.hidden);
        assert_eq!(style.get("width"), Some(&StyleValue::Number(0.0)));
        assert_eq!(style.get("height"), Some(&StyleValue::Number(0.0)));

        let block = resolve(json!({"display": "block"}));
        assert!(block.is_empty());
    }

    #[test]
    fn test_transform() {
        assert_eq!(
            parse_transform("translate(10px, -5px) scale(1.5) rotate(45deg)"),
            vec![
                Transform::TranslateX(10.0),
                Transform::TranslateY(-5.0),
                Transform::Scale(1.5),
                Transform::Rotate("45deg".to_string()),
            ]
        );
        assert_eq!(parse_transform("translateY(2em)"), vec![Transform::TranslateY(32.0)]);
        assert!(parse_transform("skew(10deg)").is_empty());
    }

    #[test]
    fn test_box_shadow() {
        let shadow = parse_box_shadow("0 2px 8px rgba(0, 0, 0, 0.2)").unwrap();
        assert_eq!(shadow.offset_x, 0.0);
        assert_eq!(shadow.offset_y, 2.0);
        assert_eq!(shadow.blur, 8.0);
        assert_eq!(shadow.color, "rgba(0, 0, 0, 0.2)");
        assert_eq!(shadow.elevation, 4.0);

        assert_eq!(parse_box_shadow("1px 1px").unwrap().color, "black");
        assert!(parse_box_shadow("none").is_none());
    }

    #[test]
    fn test_interpolated_values() {
        let decls = declarations(json!({"opacity": "{{ faded }}", "color": "{{ tint }}"}));
        let style = resolve_style(&decls, |value| match value.as_str() {
            Some("{{ faded }}") => Value::Number(0.5),
            Some("{{ tint }}") => Value::string("tomato"),
            _ => Value::Undefined,
        });
        assert_eq!(style.get("opacity"), Some(&StyleValue::Number(0.5)));
        assert_eq!(style.get("color"), Some(&StyleValue::Text("tomato".to_string())));
    }

    #[test]
    fn test_split_text_properties() {
        let style = resolve(json!({
            "color": "white",
            "fontSize": "18px",
            "padding": 12,
            "transform": "scale(2)"
        }));
        let (container, text) = style.split_text();
        assert_eq!(container.props.keys().collect::<Vec<_>>(), vec!["padding"]);
        assert_eq!(container.transform, vec![Transform::Scale(2.0)]);
        assert_eq!(text.get("fontSize"), Some(&StyleValue::Number(18.0)));
        assert_eq!(text.get("color"), Some(&StyleValue::Text("white".to_string())));
    }
}
