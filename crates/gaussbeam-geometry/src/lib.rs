//! # Gaussbeam Geometry
//!
//! Planar geometry for optical bench layouts. Beams travel in a single plane,
//! so everything here is two-dimensional:
//!
//! - **Primitives** ([`primitives`]): points, the bench boundary rectangle and
//!   axial intervals occupied by optical elements.
//! - **Transformations** ([`transform`]): rigid rotations and translations
//!   mapping between a beam's local frame and bench coordinates.
//! - **Scalar helpers** ([`scalar`]): tolerances, positive modulo and sign
//!   conventions shared by the propagation and optimisation code.

pub mod primitives;
pub mod scalar;
pub mod transform;

pub use primitives::{distance, Interval, Point, Rect};
pub use scalar::{fmod_pos, sign, sqr, EPSILON, INFINITY};
pub use transform::Transform;
