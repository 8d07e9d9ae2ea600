//! Shared geometry calculations for item rendering

use crate::domain::Point;

/// Arrow geometry constants
pub mod arrow {
    use crate::domain::{MIN_GESTURE_LENGTH, Point};

    /// Arrowhead angle from shaft in radians (35 degrees)
    pub const HEAD_ANGLE: f32 = 0.610_865_2; // 35.0_f32.to_radians()

    /// Calculate the two arrowhead line end points for an arrow ending at `end`
    pub fn head_points(start: Point, end: Point, head_size: f32) -> Option<(Point, Point)> {
        let d = end - start;
        let length = d.length();
        if length < MIN_GESTURE_LENGTH {
            return None;
        }

        // Unit direction vector (pointing from start to end)
        let nx = d.x / length;
        let ny = d.y / length;

        let cos_a = HEAD_ANGLE.cos();
        let sin_a = HEAD_ANGLE.sin();

        // First head line (rotated clockwise from arrow direction)
        let head1 = Point::new(
            end.x + (-nx * cos_a + ny * sin_a) * head_size,
            end.y + (-nx * sin_a - ny * cos_a) * head_size,
        );

        // Second head line (rotated counter-clockwise)
        let head2 = Point::new(
            end.x + (-nx * cos_a - ny * sin_a) * head_size,
            end.y + (nx * sin_a - ny * cos_a) * head_size,
        );

        Some((head1, head2))
    }

    /// Unit vector from start to end, if the arrow has a length
    pub fn direction(start: Point, end: Point) -> Option<Point> {
        let d = end - start;
        let length = d.length();
        (length >= f32::EPSILON).then(|| d.scale(1.0 / length))
    }
}

/// Shape geometry constants
pub mod shape {
    /// Ellipse bezier approximation constant: 4/3 * (sqrt(2) - 1)
    pub const BEZIER_K: f32 = 0.552_284_8;
}

/// Calculate ellipse center and radii from bounding box
#[inline]
pub fn ellipse_from_bounds(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> (f32, f32, f32, f32) {
    let cx = (min_x + max_x) * 0.5;
    let cy = (min_y + max_y) * 0.5;
    let rx = ((max_x - min_x) * 0.5).max(1.0);
    let ry = ((max_y - min_y) * 0.5).max(1.0);
    (cx, cy, rx, ry)
}

/// Uniform factor that fits `(width, height)` inside `max_dimension`, never upscaling
pub fn fit_scale(width: u32, height: u32, max_dimension: u32) -> f32 {
    let longest = width.max(height);
    if longest == 0 || max_dimension == 0 || longest <= max_dimension {
        1.0
    } else {
        max_dimension as f32 / longest as f32
    }
}

/// Midpoint of two points
pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_points_are_symmetric() {
        let (h1, h2) = arrow::head_points(Point::ZERO, Point::new(100.0, 0.0), 10.0).unwrap();
        assert!(h1.x < 100.0 && h2.x < 100.0);
        assert!((h1.y + h2.y).abs() < 1e-4);
        assert!((h1.distance(Point::new(100.0, 0.0)) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn short_arrow_has_no_head() {
        assert!(arrow::head_points(Point::ZERO, Point::new(1.0, 0.0), 10.0).is_none());
    }

    #[test]
    fn fit_scale_only_shrinks() {
        assert_eq!(fit_scale(400, 300, 800), 1.0);
        assert_eq!(fit_scale(1600, 900, 800), 0.5);
        assert_eq!(fit_scale(0, 0, 800), 1.0);
    }
}
