//! UI module for the wizard TUI

pub mod render;
pub mod theme;
pub mod widgets;

pub use render::Overlay;
