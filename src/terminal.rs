//! Text rendering of a `RenderedNode` tree
//!
//! Interactive widgets are numbered in pre-order; `press <n>` and
//! `input <n> <text>` refer to these numbers.

use colored::*;
use sparklet_core::render::StyleValue;
use sparklet_core::{NativeStyle, PressTarget, RenderedNode};

const INDENT: &str = "  ";

/// An interactive widget as numbered on screen
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    Press { label: String, target: PressTarget },
    Input { binding: String },
}

impl Widget {
    pub fn describe(&self) -> String {
        match self {
            Widget::Press { label, target } => format!("button '{}' -> {}", label, target.action),
            Widget::Input { binding } => format!("input bound to '{}'", binding),
        }
    }
}

/// A rendered screen: the text to print and the widgets it numbered
#[derive(Debug, Default)]
pub struct Screen {
    pub text: String,
    pub widgets: Vec<Widget>,
}

pub fn render_screen(root: &RenderedNode) -> Screen {
    let mut screen = Screen::default();
    let mut lines = Vec::new();
    match root {
        // The root container only groups top-level elements
        RenderedNode::Container { children, .. } => {
            for child in children {
                render_node(child, 0, &mut lines, &mut screen.widgets);
            }
        }
        other => render_node(other, 0, &mut lines, &mut screen.widgets),
    }
    if lines.is_empty() {
        lines.push(format!("{}", "(empty view)".dimmed()));
    }
    screen.text = lines.join("\n");
    screen
}

fn render_node(node: &RenderedNode, depth: usize, lines: &mut Vec<String>, widgets: &mut Vec<Widget>) {
    if node.is_hidden() {
        return;
    }
    let pad = INDENT.repeat(depth);

    match node {
        RenderedNode::Container { children, .. } => {
            if children.is_empty() {
                return;
            }
            lines.push(format!("{}{}", pad, "┌".dimmed()));
            for child in children {
                render_node(child, depth + 1, lines, widgets);
            }
            lines.push(format!("{}{}", pad, "└".dimmed()));
        }
        RenderedNode::Grid { columns, cells, .. } => {
            let columns = (*columns).max(1);
            if cells.iter().all(|cell| single_leaf(cell).is_some()) {
                for row in cells.chunks(columns) {
                    let tokens: Vec<String> = row
                        .iter()
                        .filter_map(single_leaf)
                        .map(|cell| inline(cell, widgets))
                        .collect();
                    lines.push(format!("{}{}", pad, tokens.join("  ")));
                }
            } else {
                for (index, cell) in cells.iter().enumerate() {
                    lines.push(format!("{}{}", pad, format!("· cell {}", index).dimmed()));
                    render_node(cell, depth + 1, lines, widgets);
                }
            }
        }
        leaf => lines.push(format!("{}{}", pad, inline(leaf, widgets))),
    }
}

/// A leaf, or a template cell wrapping exactly one leaf
fn single_leaf(node: &RenderedNode) -> Option<&RenderedNode> {
    match node {
        RenderedNode::Text { .. } | RenderedNode::Button { .. } | RenderedNode::Input { .. } => {
            Some(node)
        }
        RenderedNode::Container { children, style } if children.len() == 1 && !style.hidden => {
            single_leaf(&children[0])
        }
        _ => None,
    }
}

/// One leaf as a single token, registering it if interactive
fn inline(node: &RenderedNode, widgets: &mut Vec<Widget>) -> String {
    match node {
        RenderedNode::Text { text, style } => paint(text, style).to_string(),
        RenderedNode::Button {
            label,
            target,
            text_style,
            ..
        } => {
            let shown = if label.is_empty() { "·" } else { label.as_str() };
            match target {
                Some(target) => {
                    widgets.push(Widget::Press {
                        label: label.clone(),
                        target: target.clone(),
                    });
                    format!(
                        "{}{}{}",
                        format!("[{}:", widgets.len()).bright_magenta(),
                        paint(shown, text_style).bold(),
                        "]".bright_magenta()
                    )
                }
                None => format!("[{}]", shown).dimmed().to_string(),
            }
        }
        RenderedNode::Input {
            binding,
            value,
            placeholder,
            ..
        } => {
            widgets.push(Widget::Input {
                binding: binding.clone(),
            });
            let content = if value.is_empty() {
                placeholder.dimmed().italic()
            } else {
                value.normal()
            };
            format!(
                "{} {}{}",
                format!("<{}>", widgets.len()).bright_cyan(),
                content,
                "_".bright_cyan()
            )
        }
        RenderedNode::Placeholder { message } => {
            format!("{} {}", "⚠ Sparklet could not be loaded:".bright_red(), message)
        }
        RenderedNode::Container { .. } | RenderedNode::Grid { .. } => String::new(),
    }
}

/// Apply the few style properties a terminal can show
fn paint(text: &str, style: &NativeStyle) -> ColoredString {
    let mut painted = text.normal();
    if let Some(StyleValue::Text(weight)) = style.get("fontWeight") {
        if weight == "bold" || weight.parse::<u32>().map(|w| w >= 600).unwrap_or(false) {
            painted = painted.bold();
        }
    }
    if let Some(StyleValue::Text(font_style)) = style.get("fontStyle") {
        if font_style == "italic" {
            painted = painted.italic();
        }
    }
    if let Some(StyleValue::Text(color)) = style.get("color") {
        if let Some((r, g, b)) = hex_color(color) {
            painted = painted.truecolor(r, g, b);
        } else if let Ok(named) = color.parse::<Color>() {
            painted = painted.color(named);
        }
    }
    painted
}

/// `#rgb` / `#rrggbb`
fn hex_color(text: &str) -> Option<(u8, u8, u8)> {
    let hex = text.trim().strip_prefix('#').filter(|h| h.is_ascii())?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut digits = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            Some((digits.next()??, digits.next()??, digits.next()??))
        }
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparklet_core::{EngineConfig, SparkletSession, VirtualTimers};

    fn screen(json: &str) -> Screen {
        colored::control::set_override(false);
        let session = SparkletSession::from_json(json, VirtualTimers::new(), EngineConfig::default());
        render_screen(&session.render())
    }

    #[test]
    fn test_numbers_interactive_widgets() {
        let screen = screen(
            r#"{"initialState": {"name": "Ada"},
                "view": {"elements": [
                    {"type": "text", "value": "Hello {{ name }}"},
                    {"type": "input", "binding": "state.name"},
                    {"type": "button", "label": "Greet", "onPress": "greet"}
                ]}}"#,
        );
        assert_eq!(screen.widgets.len(), 2);
        assert_eq!(
            screen.widgets[0],
            Widget::Input {
                binding: "name".to_string()
            }
        );
        assert!(screen.text.contains("Hello Ada"));
        assert!(screen.text.contains("<1> Ada_"));
        assert!(screen.text.contains("[2:Greet]"));
    }

    #[test]
    fn test_grid_rows() {
        let screen = screen(
            r#"{"initialState": {"cells": ["X", "", "O", "", "", ""]},
                "view": {"elements": [{"type": "grid", "dataSource": "cells", "columns": 3,
                    "elements": [{"type": "button", "label": "{{ element }}", "onPress": "tap"}]}]}}"#,
        );
        assert_eq!(screen.widgets.len(), 6);
        let lines: Vec<&str> = screen.text.lines().collect();
        assert_eq!(lines, vec!["[1:X]  [2:·]  [3:O]", "[4:·]  [5:·]  [6:·]"]);
    }

    #[test]
    fn test_placeholder_and_empty() {
        assert!(screen("{ nope").text.contains("could not be loaded"));
        assert!(screen(r#"{"view": {"elements": []}}"#).text.contains("(empty view)"));
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!(hex_color("#ff8000"), Some((255, 128, 0)));
        assert_eq!(hex_color("#fff"), Some((255, 255, 255)));
        assert_eq!(hex_color("red"), None);
    }
}
