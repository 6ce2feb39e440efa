// sparklet-core/src/render/mod.rs

pub mod element;
pub mod renderer;
pub mod style;

pub use element::{ElementKind, ElementNode, StyleRef};
pub use renderer::{PressParams, PressTarget, RenderedNode, Renderer};
pub use style::{NativeStyle, Shadow, StyleValue, Transform};
