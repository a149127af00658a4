//! Plain geometry used by arrangement and drag resolution.

use serde::{Deserialize, Serialize};

use crate::layout_engine::Orientation;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self { Point { x, y } }

    pub fn distance_to(self, other: Point) -> f64 { f64::hypot(self.x - other.x, self.y - other.y) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const EMPTY: Rect = Rect::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn max_x(&self) -> f64 { self.x + self.width }

    pub fn max_y(&self) -> f64 { self.y + self.height }

    pub fn is_empty(&self) -> bool { self.width <= 0.0 || self.height <= 0.0 }

    pub fn contains(&self, point: Point) -> bool {
        !self.is_empty()
            && (self.x..=self.max_x()).contains(&point.x)
            && (self.y..=self.max_y()).contains(&point.y)
    }

    /// Extent along the given axis.
    pub fn extent(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }

    /// Carves a sub-rectangle along the axis, keeping the cross-axis extent.
    pub fn slice(&self, orientation: Orientation, offset: f64, length: f64) -> Rect {
        match orientation {
            Orientation::Horizontal => Rect::new(self.x + offset, self.y, length, self.height),
            Orientation::Vertical => Rect::new(self.x, self.y + offset, self.width, length),
        }
    }

    /// Relative position of `point` inside this rect, each axis in `[0, 1]`.
    pub fn relative(&self, point: Point) -> (f64, f64) {
        let rx = if self.width > 0.0 { (point.x - self.x) / self.width } else { 0.0 };
        let ry = if self.height > 0.0 { (point.y - self.y) / self.height } else { 0.0 };
        (rx.clamp(0.0, 1.0), ry.clamp(0.0, 1.0))
    }
}
