//! Geometric types for canvas coordinates and crop regions

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A point in base-image (canvas) coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length when treated as a vector
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Point) -> f32 {
        (self - other).length()
    }

    pub fn scale(self, factor: f32) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Pixel-aligned rectangle, used for crop regions and raster bounds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Create a new rectangle from coordinates
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a rectangle from an origin and a size
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    /// Build a normalized rectangle spanning two arbitrary corner points
    pub fn spanning(a: Point, b: Point) -> Self {
        let (min_x, min_y, max_x, max_y) = normalize_rect(a.x, a.y, b.x, b.y);
        Self::new(
            min_x.floor() as i32,
            min_y.floor() as i32,
            max_x.ceil() as i32,
            max_y.ceil() as i32,
        )
    }

    /// Calculate the intersection of two rectangles
    pub fn intersect(&self, other: Rect) -> Option<Rect> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right);
        let bottom = self.bottom.min(other.bottom);
        if left < right && top < bottom {
            Some(Rect {
                left,
                top,
                right,
                bottom,
            })
        } else {
            None
        }
    }

    /// Get the width of the rectangle
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    /// Get the height of the rectangle
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Floating-point axis-aligned bounds, used for hit testing items
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Bounds> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds {
            min: first,
            max: first,
        };
        for p in iter {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        Some(bounds)
    }

    pub fn expand(self, by: f32) -> Bounds {
        Bounds {
            min: Point::new(self.min.x - by, self.min.y - by),
            max: Point::new(self.max.x + by, self.max.y + by),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Whether any part of these bounds overlaps `[0, width] x [0, height]`
    pub fn overlaps_canvas(&self, width: f32, height: f32) -> bool {
        self.max.x >= 0.0 && self.max.y >= 0.0 && self.min.x <= width && self.min.y <= height
    }
}

/// Quarter-turn direction for background rotation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

/// Orientation of the base raster: rotation first, then flips
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgTransform {
    /// Clockwise degrees, one of 0, 90, 180, 270
    pub rotation: u16,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl BgTransform {
    pub fn is_identity(&self) -> bool {
        self.rotation % 360 == 0 && !self.flip_x && !self.flip_y
    }

    pub fn rotated(self, direction: RotateDirection) -> Self {
        let rotation = match direction {
            RotateDirection::Clockwise => (self.rotation + 90) % 360,
            RotateDirection::CounterClockwise => (self.rotation + 270) % 360,
        };
        Self { rotation, ..self }
    }

    /// Size of a `width` x `height` raster after this transform
    pub fn oriented_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.rotation % 180 == 90 {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// Normalize min/max coordinates from arbitrary start/end points
#[inline]
pub fn normalize_rect(x1: f32, y1: f32, x2: f32, y2: f32) -> (f32, f32, f32, f32) {
    let (min_x, max_x) = if x1 < x2 { (x1, x2) } else { (x2, x1) };
    let (min_y, max_y) = if y1 < y2 { (y1, y2) } else { (y2, y1) };
    (min_x, min_y, max_x, max_y)
}

/// Clamp a floating value into a u8 channel, rounding to nearest
#[inline]
pub fn to_channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Linear blend between two channel values, `t` in `[0, 1]`
#[inline]
pub fn mix_channel(a: u8, b: u8, t: f32) -> u8 {
    to_channel(a as f32 + (b as f32 - a as f32) * t.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spanning_normalizes_reversed_drag() {
        let r = Rect::spanning(Point::new(50.0, 40.0), Point::new(10.0, 5.0));
        assert_eq!(r, Rect::new(10, 5, 50, 40));
        assert_eq!(r.width(), 40);
        assert_eq!(r.height(), 35);
    }

    #[test]
    fn intersect_disjoint_is_none() {
        let a = Rect::from_xywh(0, 0, 10, 10);
        let b = Rect::from_xywh(20, 20, 5, 5);
        assert!(a.intersect(b).is_none());
        assert_eq!(
            a.intersect(Rect::from_xywh(5, 5, 10, 10)),
            Some(Rect::new(5, 5, 10, 10))
        );
    }

    #[test]
    fn bounds_from_points() {
        let b = Bounds::from_points([Point::new(3.0, -1.0), Point::new(-2.0, 4.0)]).unwrap();
        assert_eq!(b.min, Point::new(-2.0, -1.0));
        assert_eq!(b.max, Point::new(3.0, 4.0));
        assert!(Bounds::from_points(Vec::new()).is_none());
        assert!(b.overlaps_canvas(10.0, 10.0));
        let far = Bounds {
            min: Point::new(20.0, 20.0),
            max: Point::new(30.0, 30.0),
        };
        assert!(!far.overlaps_canvas(10.0, 10.0));
    }

    #[test]
    fn rotation_wraps_in_both_directions() {
        let t = BgTransform::default();
        assert_eq!(t.rotated(RotateDirection::CounterClockwise).rotation, 270);
        let full = (0..4).fold(t, |acc, _| acc.rotated(RotateDirection::Clockwise));
        assert!(full.is_identity());
        assert_eq!(
            t.rotated(RotateDirection::Clockwise).oriented_size(40, 30),
            (30, 40)
        );
    }

    #[test]
    fn mix_channel_endpoints() {
        assert_eq!(mix_channel(10, 200, 0.0), 10);
        assert_eq!(mix_channel(10, 200, 1.0), 200);
        assert_eq!(mix_channel(0, 100, 0.5), 50);
    }
}
