//! Page-space geometry.
//!
//! Page space is resolution independent: origin at the top-left of the page,
//! x grows right, y grows down, units are PDF points.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in page space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageRect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_edges(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { x: left, y: top, width: right - left, height: bottom - top }
    }

    /// Normalized rectangle spanning two corner points in any order.
    pub fn from_corners(a: PagePoint, b: PagePoint) -> Self {
        Self::from_edges(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> PagePoint {
        PagePoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: PagePoint) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// Strict overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &PageRect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    pub fn union(&self, other: &PageRect) -> PageRect {
        PageRect::from_edges(
            self.left().min(other.left()),
            self.top().min(other.top()),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Grow by `dx` on the left and right and `dy` on the top and bottom.
    pub fn expanded(&self, dx: f32, dy: f32) -> PageRect {
        PageRect::from_edges(self.left() - dx, self.top() - dy, self.right() + dx, self.bottom() + dy)
    }

    /// Bounding box of a point sequence, `None` when empty.
    pub fn bounding(points: &[PagePoint]) -> Option<PageRect> {
        let first = points.first()?;
        let start = PageRect::new(first.x, first.y, 0.0, 0.0);
        Some(points[1..].iter().fold(start, |rect, p| rect.union(&PageRect::new(p.x, p.y, 0.0, 0.0))))
    }
}
