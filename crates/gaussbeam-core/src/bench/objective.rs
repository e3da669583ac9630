//! Overlap of the propagated beam with a target, as a function of element
//! positions.

use ndarray::Array1;

use gaussbeam_optim::Objective;

use crate::beam::Beam;
use crate::optics::{lock, Optics};

/// Place each element at `positions[i]` and keep the source first.
///
/// Respecting locks, only lock-tree roots are placed and their descendants
/// follow rigidly; absolutely locked trees stay put.
pub(crate) fn apply_positions(optics: &mut [Optics], positions: &Array1<f64>, respect_locks: bool) {
    for (index, &position) in positions.iter().enumerate().take(optics.len()) {
        if !respect_locks || optics[index].parent().is_none() {
            lock::set_position(optics, index, position, respect_locks);
        }
    }
    if optics.len() > 1 {
        optics[1..].sort_by(|a, b| a.position().total_cmp(&b.position()));
    }
}

/// Beam leaving the last element when a default beam at `wavelength` enters
/// the first.
pub(crate) fn propagate(optics: &[Optics], wavelength: f64) -> Beam {
    optics
        .iter()
        .fold(Beam::with_wavelength(wavelength), |beam, o| o.image_of(&beam))
}

/// Mode overlap between a target beam and the beam leaving a copy of the
/// bench elements placed at the evaluated positions.
///
/// Evaluation works on copies: the elements it was built from are never
/// modified.
#[derive(Debug, Clone)]
pub struct OpticsObjective {
    optics: Vec<Optics>,
    wavelength: f64,
    target: Beam,
    check_lock: bool,
}

impl OpticsObjective {
    pub fn new(optics: &[Optics], wavelength: f64, target: Beam, check_lock: bool) -> Self {
        Self {
            optics: optics.to_vec(),
            wavelength,
            target,
            check_lock,
        }
    }

    /// Current element positions, the natural starting point.
    pub fn current_position(&self) -> Array1<f64> {
        self.optics.iter().map(Optics::position).collect()
    }

    /// Elements placed at `positions`.
    pub fn placed(&self, positions: &Array1<f64>) -> Vec<Optics> {
        let mut optics = self.optics.clone();
        apply_positions(&mut optics, positions, self.check_lock);
        optics
    }

    /// Beam leaving the elements placed at `positions`.
    pub fn beam(&self, positions: &Array1<f64>) -> Beam {
        propagate(&self.placed(positions), self.wavelength)
    }
}

impl Objective for OpticsObjective {
    fn value(&self, x: &Array1<f64>) -> f64 {
        Beam::mode_overlap(&self.target, &self.beam(x))
    }
}
