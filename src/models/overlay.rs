//! Overlay geometry
//!
//! Screen-space types for the floating minimized timer.

use serde::{Deserialize, Serialize};

/// Top-left corner of the overlay, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset_from(self, other: Position) -> Position {
        Position::new(self.x - other.x, self.y - other.y)
    }
}

/// Visible area the overlay must stay inside
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

/// Rendered size of the overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlaySize {
    pub width: f64,
    pub height: f64,
}

impl Default for OverlaySize {
    fn default() -> Self {
        Self {
            width: 280.0,
            height: 96.0,
        }
    }
}

impl OverlaySize {
    /// Largest x that keeps the overlay fully visible
    pub fn max_x(&self, viewport: Viewport) -> f64 {
        (viewport.width - self.width).max(0.0)
    }

    /// Largest y that keeps the overlay fully visible
    pub fn max_y(&self, viewport: Viewport) -> f64 {
        (viewport.height - self.height).max(0.0)
    }
}
