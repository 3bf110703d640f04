//! Scene object contract.
//!
//! `CanvasObject` is the explicit shape the memory layer relies on: identity,
//! a type tag, the transient transform fields that pooling resets, and an
//! open-ended `props` bag for whatever the graphics library attaches.

#[cfg(test)]
#[path = "object_test.rs"]
mod object_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a scene object.
pub type ObjectId = Uuid;

/// A graphical object that can be pooled and tracked on a canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasObject {
    /// Stable identity; survives pooling round trips.
    pub id: ObjectId,
    /// Type tag, e.g. `"rect"` or `"text"`. Pools are keyed by it.
    pub kind: String,
    /// Left position in canvas coordinates.
    pub x: f64,
    /// Top position in canvas coordinates.
    pub y: f64,
    /// Horizontal scale factor.
    pub scale_x: f64,
    /// Vertical scale factor.
    pub scale_y: f64,
    /// Clockwise rotation in degrees.
    pub rotation: f64,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Whether the object is drawn.
    pub visible: bool,
    /// Library-specific properties (fill, stroke, text, ...).
    pub props: serde_json::Value,
}

impl CanvasObject {
    /// Create an object of the given kind with a fresh id and default transform.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            visible: true,
            props: serde_json::json!({}),
        }
    }

    /// Builder-style props setter.
    #[must_use]
    pub fn with_props(mut self, props: serde_json::Value) -> Self {
        self.props = props;
        self
    }

    /// Restore position, scale, rotation, opacity and visibility to their
    /// defaults. Identity, kind and props are kept.
    pub fn reset_transform(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        self.rotation = 0.0;
        self.opacity = 1.0;
        self.visible = true;
    }

    /// Returns `true` if the transient fields all hold their defaults.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn has_default_transform(&self) -> bool {
        self.x == 0.0
            && self.y == 0.0
            && self.scale_x == 1.0
            && self.scale_y == 1.0
            && self.rotation == 0.0
            && self.opacity == 1.0
            && self.visible
    }
}
