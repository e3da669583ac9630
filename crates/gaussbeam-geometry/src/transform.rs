//! Rigid planar transformations.
//!
//! A beam carries a local frame (origin + propagation angle). Converting
//! between bench coordinates and the beam's (axial, transverse) coordinates
//! is a rotation followed by a translation.

use nalgebra::{Matrix2, Vector2};

use crate::primitives::Point;

/// An affine planar transformation: rotation matrix + translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// 2x2 rotation matrix.
    pub matrix: Matrix2<f64>,
    /// Translation vector (m).
    pub translation: Vector2<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            matrix: Matrix2::identity(),
            translation: Vector2::zeros(),
        }
    }
}

impl Transform {
    /// Create a pure translation.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            matrix: Matrix2::identity(),
            translation: Vector2::new(dx, dy),
        }
    }

    /// Create a counter-clockwise rotation about the origin.
    pub fn rotation(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            matrix: Matrix2::new(c, -s, s, c),
            translation: Vector2::zeros(),
        }
    }

    /// Local-to-bench transform of a frame with the given origin and angle.
    ///
    /// Local x runs along the direction `angle`, local y is its left normal.
    pub fn frame(origin: &Point, angle: f64) -> Self {
        Self::rotation(angle).then(&Self::translation(origin.x, origin.y))
    }

    /// Apply this transformation to a point.
    pub fn apply(&self, point: &Point) -> Point {
        Point::from(self.matrix * point.coords + self.translation)
    }

    /// Compose two transforms: self followed by other.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            matrix: other.matrix * self.matrix,
            translation: other.matrix * self.translation + other.translation,
        }
    }

    /// Inverse of a rigid transform.
    ///
    /// The rotation block is orthogonal, so its inverse is its transpose.
    pub fn inverse(&self) -> Transform {
        let rt = self.matrix.transpose();
        Transform {
            translation: -(rt * self.translation),
            matrix: rt,
        }
    }
}
