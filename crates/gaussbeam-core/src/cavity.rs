//! Resonant cavities built from bench elements.
//!
//! A cavity is an ordered list of elements closed by a free-space gap from
//! the last element back to the first. Its round-trip ray-transfer matrix
//! decides stability and, when stable, the self-consistent eigenmode.

use std::cell::OnceCell;

use num_complex::Complex64;

use crate::beam::Beam;
use crate::optics::{AbcdMatrix, Optics, OpticsId};
use crate::types::Orientation;

/// Ordered set of borrowed elements forming a ring.
#[derive(Debug, Clone)]
pub struct Cavity<'a> {
    members: Vec<&'a Optics>,
    closing: f64,
    matrix: OnceCell<AbcdMatrix>,
}

impl<'a> Cavity<'a> {
    /// Empty cavity whose closing gap is `closing` (m).
    pub fn new(closing: f64) -> Self {
        Self {
            members: Vec::new(),
            closing,
            matrix: OnceCell::new(),
        }
    }

    pub fn members(&self) -> &[&'a Optics] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: OpticsId) -> bool {
        self.members.iter().any(|o| o.id() == id)
    }

    /// Append an element. Beam sources and duplicates are refused.
    pub fn add_optics(&mut self, optics: &'a Optics) -> bool {
        if !optics.is_abcd() || self.contains(optics.id()) {
            return false;
        }
        self.members.push(optics);
        self.matrix = OnceCell::new();
        true
    }

    pub fn remove_optics(&mut self, id: OpticsId) -> bool {
        let before = self.members.len();
        self.members.retain(|o| o.id() != id);
        let removed = self.members.len() != before;
        if removed {
            self.matrix = OnceCell::new();
        }
        removed
    }

    pub fn closing_free_space(&self) -> f64 {
        self.closing
    }

    pub fn set_closing_free_space(&mut self, closing: f64) {
        self.closing = closing;
        self.matrix = OnceCell::new();
    }

    /// Round-trip matrix starting just after the first member.
    pub fn matrix(&self) -> AbcdMatrix {
        *self.matrix.get_or_init(|| {
            let mut matrix = AbcdMatrix::free_space(0.0);
            let mut previous: Option<&Optics> = None;
            for &optics in &self.members {
                if let Some(previous) = previous {
                    matrix *= &AbcdMatrix::free_space(optics.position() - previous.end_position());
                }
                matrix *= optics;
                previous = Some(optics);
            }
            matrix *= &AbcdMatrix::free_space(self.closing);
            matrix
        })
    }

    /// $(D - A)^2 + 4BC$, negative for a stable axis.
    pub fn delta(&self, orientation: Orientation) -> f64 {
        let m = self.matrix();
        let (a, b, c, d) = (m.a(orientation), m.b(orientation), m.c(orientation), m.d(orientation));
        (d - a).powi(2) + 4.0 * b * c
    }

    /// Whether the cavity confines a Gaussian mode on both axes.
    pub fn is_stable(&self) -> bool {
        !self.members.is_empty()
            && self.delta(Orientation::Horizontal) < 0.0
            && self.delta(Orientation::Vertical) < 0.0
    }

    /// Self-consistent beam leaving member `index`.
    ///
    /// The eigenmode is anchored at the first member and imaged through
    /// members `1..=index`. Returns `None` if the cavity is unstable or
    /// `index` is out of range.
    pub fn eigen_beam(&self, wavelength: f64, index: usize) -> Option<Beam> {
        if !self.is_stable() || index >= self.members.len() {
            return None;
        }
        let position = self.members[0].position();
        let m = self.matrix();
        let mut beam = Beam::with_wavelength(wavelength);
        for orientation in [Orientation::Horizontal, Orientation::Vertical] {
            let (a, c, d) = (m.a(orientation), m.c(orientation), m.d(orientation));
            if c == 0.0 {
                return None;
            }
            let delta = self.delta(orientation);
            let q = Complex64::new((a - d) / (2.0 * c), (-delta).sqrt() / (2.0 * c.abs()));
            beam.set_q(q, position, orientation);
        }
        for optics in &self.members[1..=index] {
            beam = optics.image_of(&beam);
        }
        log::debug!("cavity eigenmode at {}: {}", self.members[index].name(), beam);
        Some(beam)
    }
}
