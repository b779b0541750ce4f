//! Core geometry types: Size, Rect.
//!
//! Element bounding boxes and the viewport are measured in CSS pixels, so
//! everything here is `f64`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// A width/height pair.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Create a new size.
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero or negative.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// An element's bounding box relative to the viewport.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a new rect.
    #[inline]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    #[inline]
    pub fn right(self) -> f64 {
        self.left + self.width
    }

    #[inline]
    pub fn bottom(self) -> f64 {
        self.top + self.height
    }

    #[inline]
    pub fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Whether the point lies inside (right and bottom edges exclusive).
    #[inline]
    pub fn contains(self, x: f64, y: f64) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_edges() {
        let r = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(r.right(), 40.0);
        assert_eq!(r.bottom(), 60.0);
        assert_eq!(r.size(), Size::new(30.0, 40.0));
    }

    #[test]
    fn rect_contains() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(0.0, 0.0));
        assert!(r.contains(9.5, 9.5));
        assert!(!r.contains(10.0, 5.0));
        assert!(!r.contains(-1.0, 5.0));
    }

    #[test]
    fn size_empty() {
        assert!(Size::default().is_empty());
        assert!(Size::new(0.0, 5.0).is_empty());
        assert!(!Size::new(1.0, 1.0).is_empty());
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_value(Size::new(800.0, 600.0)).unwrap();
        assert_eq!(json, serde_json::json!({"width": 800.0, "height": 600.0}));
    }
}
