//! Planar primitives used to lay out an optical bench.
//!
//! The bench lives in the plane spanned by the optical axis (x) and one
//! transverse direction (y). Lengths are in metres.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A point in the bench plane (m).
pub type Point = Point2<f64>;

/// Euclidean distance between two points.
pub fn distance(p1: &Point, p2: &Point) -> f64 {
    nalgebra::distance(p1, p2)
}

/// An axis-aligned rectangle given by two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Extent along x.
    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).abs()
    }

    /// Extent along y.
    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).abs()
    }

    /// Check whether an abscissa lies within `[x1, x2]`.
    pub fn contains_x(&self, x: f64) -> bool {
        x >= self.x1.min(self.x2) && x <= self.x1.max(self.x2)
    }

    /// Check whether a point lies inside the rectangle (edges included).
    pub fn contains(&self, point: &Point) -> bool {
        self.contains_x(point.x)
            && point.y >= self.y1.min(self.y2)
            && point.y <= self.y1.max(self.y2)
    }
}

/// The axial extent `[start, start + width)` occupied by an element.
///
/// An interval of zero width is a single point at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub width: f64,
}

impl Interval {
    pub fn new(start: f64, width: f64) -> Self {
        Self { start, width }
    }

    pub fn stop(&self) -> f64 {
        self.start + self.width
    }

    fn contains(&self, x: f64) -> bool {
        if self.width <= 0.0 {
            x == self.start
        } else {
            x >= self.start && x < self.stop()
        }
    }

    /// Check whether two intervals share at least one point.
    ///
    /// Half-open intervals touching end-to-start do not overlap; a point
    /// interval overlaps any interval containing it.
    pub fn overlaps(&self, other: &Interval) -> bool {
        if self.start == other.start {
            return true;
        }
        self.contains(other.start) || other.contains(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rect_extent() {
        let r = Rect::new(-0.1, -0.2, 0.7, 0.2);
        assert_abs_diff_eq!(r.width(), 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(r.height(), 0.4, epsilon = 1e-12);
        assert!(r.contains(&Point::new(0.0, 0.0)));
        assert!(!r.contains(&Point::new(0.8, 0.0)));
    }

    #[test]
    fn test_interval_overlap() {
        let a = Interval::new(0.0, 0.1);
        assert!(a.overlaps(&Interval::new(0.05, 0.1)));
        assert!(!a.overlaps(&Interval::new(0.1, 0.1)));
        assert!(!a.overlaps(&Interval::new(0.2, 0.0)));
        assert!(a.overlaps(&Interval::new(0.05, 0.0)));
        // Two thin elements at the same spot collide.
        assert!(Interval::new(0.3, 0.0).overlaps(&Interval::new(0.3, 0.0)));
        assert!(!Interval::new(0.3, 0.0).overlaps(&Interval::new(0.31, 0.0)));
    }

    #[test]
    fn test_distance() {
        let d = distance(&Point::new(0.0, 0.0), &Point::new(3.0, 4.0));
        assert_abs_diff_eq!(d, 5.0, epsilon = 1e-12);
    }
}
