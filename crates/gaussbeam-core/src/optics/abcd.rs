//! Composition of ray-transfer matrices.

use std::ops::{Mul, MulAssign};

use nalgebra::Matrix2;

use super::Optics;
use crate::types::{Axes, Orientation};

/// Per-axis ray-transfer matrix of a chain of elements, with its total width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbcdMatrix {
    pub matrices: Axes<Matrix2<f64>>,
    pub orientation: Orientation,
    pub width: f64,
}

impl Default for AbcdMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl AbcdMatrix {
    pub fn identity() -> Self {
        Self {
            matrices: Axes::splat(Matrix2::identity()),
            orientation: Orientation::Spherical,
            width: 0.0,
        }
    }

    /// Propagation over `length` (m).
    pub fn free_space(length: f64) -> Self {
        Self {
            matrices: Axes::splat(Matrix2::new(1.0, length, 0.0, 1.0)),
            orientation: Orientation::Spherical,
            width: length,
        }
    }

    /// Matrix of an ABCD element, `None` for a beam source.
    pub fn from_optics(optics: &Optics) -> Option<Self> {
        let spherical = optics.orientation() == Orientation::Spherical;
        let matrices = if spherical {
            Axes::splat(optics.matrix(Orientation::Spherical)?)
        } else {
            Axes {
                horizontal: optics.matrix(Orientation::Horizontal)?,
                vertical: optics.matrix(Orientation::Vertical)?,
            }
        };
        let orientation = if spherical {
            Orientation::Spherical
        } else {
            Orientation::Ellipsoidal
        };
        Some(Self {
            matrices,
            orientation,
            width: optics.width(),
        })
    }

    pub fn matrix(&self, orientation: Orientation) -> Matrix2<f64> {
        self.matrices.get(orientation)
    }

    pub fn a(&self, orientation: Orientation) -> f64 {
        self.matrix(orientation)[(0, 0)]
    }

    pub fn b(&self, orientation: Orientation) -> f64 {
        self.matrix(orientation)[(0, 1)]
    }

    pub fn c(&self, orientation: Orientation) -> f64 {
        self.matrix(orientation)[(1, 0)]
    }

    pub fn d(&self, orientation: Orientation) -> f64 {
        self.matrix(orientation)[(1, 1)]
    }

    pub fn determinant(&self, orientation: Orientation) -> f64 {
        self.matrix(orientation).determinant()
    }
}

/// `self = self · rhs`, widths add up.
impl MulAssign<&AbcdMatrix> for AbcdMatrix {
    fn mul_assign(&mut self, rhs: &AbcdMatrix) {
        self.matrices = Axes {
            horizontal: self.matrices.horizontal * rhs.matrices.horizontal,
            vertical: self.matrices.vertical * rhs.matrices.vertical,
        };
        self.width += rhs.width;
        self.orientation = if self.orientation == Orientation::Spherical
            && rhs.orientation == Orientation::Spherical
        {
            Orientation::Spherical
        } else {
            Orientation::Ellipsoidal
        };
    }
}

impl MulAssign<&Optics> for AbcdMatrix {
    fn mul_assign(&mut self, rhs: &Optics) {
        if let Some(matrix) = AbcdMatrix::from_optics(rhs) {
            *self *= &matrix;
        }
    }
}

impl Mul<&AbcdMatrix> for &AbcdMatrix {
    type Output = AbcdMatrix;

    fn mul(self, rhs: &AbcdMatrix) -> AbcdMatrix {
        let mut result = *self;
        result *= rhs;
        result
    }
}
