//! Region-of-interest drag gesture.

use super::state::Region;

/// A point in rendered (screen) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendered bounding box of the image being selected on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ImageBounds {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Map a rendered point into `[0, 1]` image coordinates, clamping
    /// anything dragged past the edges.
    pub fn normalize(&self, point: Point) -> Point {
        Point {
            x: ((point.x - self.left) / self.width).clamp(0.0, 1.0),
            y: ((point.y - self.top) / self.height).clamp(0.0, 1.0),
        }
    }
}

/// An in-progress drag, stored normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RegionDrag {
    bounds: ImageBounds,
    start: Point,
    current: Point,
}

impl RegionDrag {
    pub(crate) fn begin(bounds: ImageBounds, point: Point) -> Self {
        let start = bounds.normalize(point);
        Self {
            bounds,
            start,
            current: start,
        }
    }

    pub(crate) fn update(&mut self, point: Point) {
        self.current = self.bounds.normalize(point);
    }

    /// Rectangle spanned so far, whichever direction the drag went.
    pub(crate) fn rect(&self) -> Region {
        Region {
            x: self.start.x.min(self.current.x),
            y: self.start.y.min(self.current.y),
            width: (self.current.x - self.start.x).abs(),
            height: (self.current.y - self.start.y).abs(),
        }
    }
}
