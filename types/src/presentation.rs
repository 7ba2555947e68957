//! Presentation preferences for the consent layer.
//!
//! Only `dark_mode` reaches the wire (`cmpdarkmode`); layout and background
//! are hints the embedding host turns into margins and overlay styling.

use serde::{Deserialize, Serialize};

/// Layout presets for consent layer positioning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStyle {
    FullScreen,
    TopHalf,
    /// Recommended for games - keeps the top of the scene visible.
    #[default]
    BottomHalf,
}

/// Background treatment behind the layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStyle {
    /// Semi-transparent dimmed overlay.
    #[default]
    Dimmed,
    Solid,
    None,
}

/// Margins in surface pixels, clockwise from the left edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Margins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Margins {
    #[must_use]
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationConfig {
    #[serde(default)]
    pub layout: LayoutStyle,
    #[serde(default)]
    pub background: BackgroundStyle,
    #[serde(default)]
    pub dark_mode: bool,
}

impl PresentationConfig {
    #[must_use]
    pub fn full_screen() -> Self {
        Self {
            layout: LayoutStyle::FullScreen,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dark_mode(mut self, dark_mode: bool) -> Self {
        self.dark_mode = dark_mode;
        self
    }
}
