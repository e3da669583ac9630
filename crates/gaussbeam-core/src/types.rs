//! Core types shared across the Gaussian beam model.
//!
//! A beam and most optical elements can behave differently along the two
//! transverse axes. [`Orientation`] selects an axis (or both), and [`Axes`]
//! stores one value per axis with the broadcasting rules used throughout.

use serde::{Deserialize, Serialize};

/// Transverse axis selector.
///
/// `Spherical` addresses both axes at once (they are equal); `Ellipsoidal`
/// marks something whose two axes differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Spherical,
    Horizontal,
    Vertical,
    Ellipsoidal,
}

impl Orientation {
    /// The orthogonal axis. Only meaningful for `Horizontal` and `Vertical`;
    /// other orientations are returned unchanged.
    pub fn quadrature(self) -> Orientation {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
            other => {
                log::warn!("Invalid orientation {:?} for quadrature", other);
                other
            }
        }
    }
}

/// A pair of per-axis values.
///
/// Reads with `Vertical` return the vertical value and any other orientation
/// returns the horizontal one. Writes with `Spherical` or `Ellipsoidal`
/// broadcast to both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axes<T> {
    pub horizontal: T,
    pub vertical: T,
}

impl<T: Copy> Axes<T> {
    /// Same value on both axes.
    pub fn splat(value: T) -> Self {
        Self {
            horizontal: value,
            vertical: value,
        }
    }

    pub fn get(&self, orientation: Orientation) -> T {
        match orientation {
            Orientation::Vertical => self.vertical,
            _ => self.horizontal,
        }
    }

    pub fn set(&mut self, value: T, orientation: Orientation) {
        if orientation != Orientation::Vertical {
            self.horizontal = value;
        }
        if orientation != Orientation::Horizontal {
            self.vertical = value;
        }
    }
}

impl<T: Copy + PartialEq> Axes<T> {
    /// Both axes hold the same value.
    pub fn is_symmetric(&self) -> bool {
        self.horizontal == self.vertical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axes_broadcast() {
        let mut axes = Axes::splat(1.0);
        axes.set(2.0, Orientation::Vertical);
        assert_eq!(axes.get(Orientation::Horizontal), 1.0);
        assert_eq!(axes.get(Orientation::Vertical), 2.0);
        assert_eq!(axes.get(Orientation::Spherical), 1.0);
        assert!(!axes.is_symmetric());

        axes.set(3.0, Orientation::Spherical);
        assert!(axes.is_symmetric());
        assert_eq!(axes.get(Orientation::Vertical), 3.0);
    }

    #[test]
    fn test_quadrature() {
        assert_eq!(Orientation::Horizontal.quadrature(), Orientation::Vertical);
        assert_eq!(Orientation::Vertical.quadrature(), Orientation::Horizontal);
        assert_eq!(Orientation::Spherical.quadrature(), Orientation::Spherical);
    }
}
