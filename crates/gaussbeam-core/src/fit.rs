//! Beam-radius measurements and the Gaussian fit recovering a beam from them.
//!
//! A [`Fit`] holds `(position, horizontal, vertical)` samples. Its
//! orientation tells which axes carry data: a spherical fit stores one value
//! on both axes, a horizontal (vertical) fit only uses its own axis and an
//! ellipsoidal fit stores both independently.
//!
//! Each axis is fitted in two stages: a linear regression of the radius
//! against position seeds a hyperbola guess, then Levenberg–Marquardt
//! refines waist and waist position over all samples. The regression is
//! repeated on the first two and last two usable samples and the candidate
//! with the lowest residual wins.

use std::cell::RefCell;
use std::f64::consts::{LN_2, PI};

use gaussbeam_geometry::{sqr, EPSILON};
use gaussbeam_optim::{levenberg_marquardt, LeastSquaresProblem, LmConfig, Statistics};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::beam::Beam;
use crate::types::Orientation;

/// Quantity measured by the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitDataType {
    /// $1/e^2$ intensity radius.
    #[default]
    Radius,
    /// $1/e^2$ intensity diameter.
    Diameter,
    /// Standard deviation of the intensity profile.
    StandardDeviation,
    /// Full width at half maximum.
    Fwhm,
    /// Half width at half maximum.
    Hwhm,
}

impl FitDataType {
    /// Convert a measured value to a $1/e^2$ radius.
    pub fn to_radius(self, value: f64) -> f64 {
        match self {
            FitDataType::Radius => value,
            FitDataType::Diameter => value / 2.0,
            FitDataType::StandardDeviation => value * 2.0,
            FitDataType::Fwhm => value / (2.0 * LN_2).sqrt(),
            FitDataType::Hwhm => value * (2.0 / LN_2).sqrt(),
        }
    }
}

/// One measurement plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitSample {
    pub position: f64,
    pub horizontal: f64,
    pub vertical: f64,
}

/// Best-fit beam and its residual for one wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub beam: Beam,
    pub residue: f64,
    wavelength: f64,
}

/// Named set of beam-radius samples.
#[derive(Debug, Clone)]
pub struct Fit {
    name: String,
    data_type: FitDataType,
    color: u32,
    orientation: Orientation,
    samples: Vec<FitSample>,
    cache: RefCell<Option<FitResult>>,
}

impl PartialEq for Fit {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.data_type == other.data_type
            && self.color == other.color
            && self.orientation == other.orientation
            && self.samples == other.samples
    }
}

impl Default for Fit {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Fit {
    /// Spherical radius fit with `n_data` empty samples.
    pub fn new(n_data: usize) -> Self {
        Self {
            name: String::new(),
            data_type: FitDataType::Radius,
            color: 0,
            orientation: Orientation::Spherical,
            samples: vec![FitSample::default(); n_data],
            cache: RefCell::new(None),
        }
    }

    fn invalidate(&mut self) {
        self.cache.get_mut().take();
    }

    // ── Metadata ───────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Display colour as `0xRRGGBB`.
    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn set_color(&mut self, color: u32) {
        self.color = color;
    }

    pub fn data_type(&self) -> FitDataType {
        self.data_type
    }

    pub fn set_data_type(&mut self, data_type: FitDataType) {
        self.data_type = data_type;
        self.invalidate();
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
        self.invalidate();
    }

    // ── Samples ────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[FitSample] {
        &self.samples
    }

    pub fn position(&self, index: usize) -> f64 {
        self.samples[index].position
    }

    /// Raw value of sample `index` read along `orientation`.
    ///
    /// | fit \ read | S | H | V | E |
    /// |------------|---|---|---|---|
    /// | S          | H | H | V | - |
    /// | H          | - | H | - | - |
    /// | V          | - | - | V | - |
    /// | E          | - | H | V | - |
    ///
    /// Invalid combinations, and spherical fits whose two stored values
    /// disagree, read as 0.
    pub fn value(&self, index: usize, orientation: Orientation) -> f64 {
        let sample = &self.samples[index];
        if self.orientation == Orientation::Spherical && sample.horizontal != sample.vertical {
            log::warn!(
                "Fit {}: horizontal and vertical values differ ({} / {})",
                self.name,
                sample.horizontal,
                sample.vertical
            );
            return 0.0;
        }
        match orientation {
            Orientation::Spherical if self.orientation == Orientation::Spherical => sample.horizontal,
            Orientation::Horizontal if self.orientation != Orientation::Vertical => sample.horizontal,
            Orientation::Vertical if self.orientation != Orientation::Horizontal => sample.vertical,
            _ => {
                log::warn!("Fit {}: cannot read {:?} values", self.name, orientation);
                0.0
            }
        }
    }

    /// $1/e^2$ radius of sample `index` along `orientation`.
    pub fn radius(&self, index: usize, orientation: Orientation) -> f64 {
        self.data_type.to_radius(self.value(index, orientation))
    }

    /// Store a value at sample `index`, growing the sample list if needed.
    ///
    /// | fit \ write | S  | H | V | E |
    /// |-------------|----|---|---|---|
    /// | S           | HV | - | - | - |
    /// | H           | H  | H | - | - |
    /// | V           | V  | - | V | - |
    /// | E           | HV | H | V | - |
    ///
    /// Returns `false` and stores nothing for invalid combinations.
    pub fn set_data(&mut self, index: usize, position: f64, value: f64, orientation: Orientation) -> bool {
        let rejected = orientation == Orientation::Ellipsoidal
            || (self.orientation == Orientation::Spherical && orientation != Orientation::Spherical)
            || (self.orientation == Orientation::Horizontal && orientation == Orientation::Vertical)
            || (self.orientation == Orientation::Vertical && orientation == Orientation::Horizontal);
        if rejected {
            log::warn!("Fit {}: cannot write {:?} values", self.name, orientation);
            return false;
        }

        if self.samples.len() <= index {
            self.samples.resize(index + 1, FitSample::default());
        }
        let sample = &mut self.samples[index];
        let spherical = orientation == Orientation::Spherical;
        if orientation == Orientation::Horizontal || (spherical && self.orientation != Orientation::Vertical) {
            sample.horizontal = value;
        }
        if orientation == Orientation::Vertical || (spherical && self.orientation != Orientation::Horizontal) {
            sample.vertical = value;
        }
        sample.position = position;
        self.invalidate();
        true
    }

    pub fn add_data(&mut self, position: f64, value: f64, orientation: Orientation) -> bool {
        self.set_data(self.samples.len(), position, value, orientation)
    }

    pub fn remove_data(&mut self, index: usize) {
        if index < self.samples.len() {
            self.samples.remove(index);
            self.invalidate();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.invalidate();
    }

    /// Number of samples with a usable radius along `orientation`.
    pub fn non_zero_size(&self, orientation: Orientation) -> usize {
        (0..self.samples.len())
            .filter(|&i| self.radius(i, orientation) > EPSILON)
            .count()
    }

    /// Whether sample `index` holds data for the fit orientation.
    pub fn non_zero_entry(&self, index: usize) -> bool {
        match self.orientation {
            Orientation::Ellipsoidal => {
                self.value(index, Orientation::Horizontal) != 0.0
                    || self.value(index, Orientation::Vertical) != 0.0
            }
            orientation => self.value(index, orientation) != 0.0,
        }
    }

    /// Whether at least two usable samples exist along `orientation`.
    pub fn fit_available(&self, orientation: Orientation) -> bool {
        match orientation {
            Orientation::Spherical => self.non_zero_size(orientation) > 1,
            Orientation::Horizontal | Orientation::Vertical => {
                self.orientation != orientation.quadrature() && self.non_zero_size(orientation) > 1
            }
            Orientation::Ellipsoidal => {
                log::warn!("Fit {}: availability is per axis", self.name);
                false
            }
        }
    }

    // ── Fitting ────────────────────────────────────────────────────────────

    /// Best-fit beam at `wavelength`, recomputed only after a change.
    ///
    /// Axes without enough data keep the default beam values; the residue
    /// only accounts for fitted axes and is 0 when nothing could be fitted.
    pub fn fit(&self, wavelength: f64) -> FitResult {
        if let Some(result) = self.cache.borrow().as_ref() {
            if result.wavelength == wavelength {
                return result.clone();
            }
        }

        let mut beam = Beam::with_wavelength(wavelength);
        let residue = if self.orientation == Orientation::Ellipsoidal {
            let r1 = self.fit_axis(wavelength, Orientation::Horizontal, &mut beam);
            let r2 = self.fit_axis(wavelength, Orientation::Vertical, &mut beam);
            match (r1, r2) {
                (Some(r1), Some(r2)) => (r1 * r2).sqrt(),
                (Some(r), None) | (None, Some(r)) => r,
                (None, None) => 0.0,
            }
        } else {
            self.fit_axis(wavelength, self.orientation, &mut beam).unwrap_or(0.0)
        };

        let result = FitResult {
            beam,
            residue,
            wavelength,
        };
        *self.cache.borrow_mut() = Some(result.clone());
        result
    }

    /// Copy the fitted waist and waist position onto the axes of `beam` that
    /// have enough data, and return the residue.
    pub fn apply_fit(&self, beam: &mut Beam) -> f64 {
        let result = self.fit(beam.wavelength());
        for axis in [Orientation::Horizontal, Orientation::Vertical] {
            if self.orientation != axis.quadrature() && self.non_zero_size(axis) >= 2 {
                beam.set_waist(result.beam.waist(axis), axis);
                beam.set_waist_position(result.beam.waist_position(axis), axis);
            }
        }
        result.residue
    }

    fn usable(&self, orientation: Orientation) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.samples
            .iter()
            .enumerate()
            .map(move |(i, s)| (s.position, self.radius(i, orientation)))
            .filter(|&(_, r)| r > EPSILON)
    }

    fn fit_axis(&self, wavelength: f64, orientation: Orientation, beam: &mut Beam) -> Option<f64> {
        if self.non_zero_size(orientation) < 2 {
            return None;
        }
        let (positions, radii): (Vec<f64>, Vec<f64>) = self.usable(orientation).unzip();
        let first: (Vec<f64>, Vec<f64>) = self.usable(orientation).take(2).unzip();
        let last: (Vec<f64>, Vec<f64>) = {
            let mut tail: Vec<(f64, f64)> = self.usable(orientation).collect();
            tail.drain(..tail.len().saturating_sub(2));
            tail.into_iter().unzip()
        };

        let problem = WaistProblem {
            positions: &positions,
            radii: &radii,
            wavelength,
        };
        let best = [(&positions, &radii), (&first.0, &first.1), (&last.0, &last.1)]
            .into_iter()
            .filter_map(|(z, r)| {
                let guess = linear_fit(z, r, wavelength)
                    .unwrap_or_else(|| Beam::new(mean(r), mean(z), wavelength, 1.0, 1.0));
                problem.refine(&guess)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        log::debug!(
            "fit {} {:?}: waist {:.4e} at {:.4e}, residue {:.3e}",
            self.name,
            orientation,
            best.0.waist(Orientation::Spherical),
            best.0.waist_position(Orientation::Spherical),
            best.1
        );
        beam.set_waist(best.0.waist(Orientation::Spherical), orientation);
        beam.set_waist_position(best.0.waist_position(Orientation::Spherical), orientation);
        Some(best.1)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Hyperbola through the regression line of `radii` against `positions`,
/// matching value and slope at the centroid.
fn linear_fit(positions: &[f64], radii: &[f64], wavelength: f64) -> Option<Beam> {
    let stats = Statistics::new(positions, radii);
    let z = stats.mean_x;
    let f = stats.slope * z + stats.intercept;
    let f_prime = stats.slope;
    // (z - z_w) / z_R
    let alpha = PI * f * f_prime / wavelength;
    let waist = f / (1.0 + sqr(alpha)).sqrt();
    if !waist.is_finite() || waist <= 0.0 {
        return None;
    }
    let mut beam = Beam::new(waist, 0.0, wavelength, 1.0, 1.0);
    beam.set_waist_position(z - beam.rayleigh(Orientation::Spherical) * alpha, Orientation::Spherical);
    Some(beam)
}

/// Radius residuals of a diffraction-limited beam with free waist and waist
/// position.
struct WaistProblem<'a> {
    positions: &'a [f64],
    radii: &'a [f64],
    wavelength: f64,
}

impl WaistProblem<'_> {
    fn model(&self, params: &DVector<f64>) -> Beam {
        Beam::new(params[0].abs(), params[1], self.wavelength, 1.0, 1.0)
    }

    fn refine(&self, guess: &Beam) -> Option<(Beam, f64)> {
        let initial = DVector::from_vec(vec![
            guess.waist(Orientation::Spherical),
            guess.waist_position(Orientation::Spherical),
        ]);
        let result = levenberg_marquardt(self, initial, &LmConfig::default()).ok()?;
        let beam = self.model(&result.params);
        result.residual_norm.is_finite().then_some((beam, result.residual_norm))
    }
}

impl LeastSquaresProblem for WaistProblem<'_> {
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let beam = self.model(params);
        DVector::from_iterator(
            self.positions.len(),
            self.positions
                .iter()
                .zip(self.radii)
                .map(|(&z, &r)| r - beam.radius(z, Orientation::Spherical)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const S: Orientation = Orientation::Spherical;
    const H: Orientation = Orientation::Horizontal;
    const V: Orientation = Orientation::Vertical;
    const E: Orientation = Orientation::Ellipsoidal;

    fn sampled(beam: &Beam, positions: &[f64], orientation: Orientation) -> Fit {
        let mut fit = Fit::new(0);
        fit.set_orientation(orientation);
        for &z in positions {
            match orientation {
                Orientation::Ellipsoidal => {
                    let i = fit.len();
                    fit.set_data(i, z, beam.radius(z, H), H);
                    fit.set_data(i, z, beam.radius(z, V), V);
                }
                _ => {
                    fit.add_data(z, beam.radius(z, orientation), S);
                }
            }
        }
        fit
    }

    #[test]
    fn test_data_type_conversions() {
        assert_eq!(FitDataType::Radius.to_radius(2.0), 2.0);
        assert_eq!(FitDataType::Diameter.to_radius(2.0), 1.0);
        assert_eq!(FitDataType::StandardDeviation.to_radius(2.0), 4.0);
        assert_relative_eq!(FitDataType::Fwhm.to_radius(1.0), 1.0 / (2.0 * LN_2).sqrt());
        assert_relative_eq!(FitDataType::Hwhm.to_radius(1.0), (2.0 / LN_2).sqrt());
    }

    #[test]
    fn test_default_fit_has_empty_samples() {
        let fit = Fit::new(3);
        assert_eq!(fit.len(), 3);
        assert_eq!(fit.orientation(), S);
        assert_eq!(fit.data_type(), FitDataType::Radius);
        assert_eq!(fit.non_zero_size(S), 0);
        assert!(!fit.fit_available(S));
        assert!(!fit.non_zero_entry(0));
    }

    #[test]
    fn test_orientation_tables() {
        let mut fit = Fit::new(0);
        assert!(fit.add_data(0.1, 2e-4, S));
        assert!(!fit.add_data(0.2, 2e-4, H));
        assert_eq!(fit.value(0, H), 2e-4);
        assert_eq!(fit.value(0, V), 2e-4);
        assert_eq!(fit.value(0, E), 0.0);

        fit.set_orientation(H);
        assert!(fit.set_data(0, 0.1, 3e-4, H));
        assert!(!fit.set_data(0, 0.1, 3e-4, V));
        assert_eq!(fit.value(0, H), 3e-4);
        assert_eq!(fit.value(0, V), 0.0);
        assert!(!fit.fit_available(V));

        fit.set_orientation(E);
        assert!(fit.set_data(0, 0.1, 5e-4, V));
        assert_eq!(fit.value(0, H), 3e-4);
        assert_eq!(fit.value(0, V), 5e-4);
        assert!(!fit.set_data(0, 0.1, 5e-4, E));
    }

    #[test]
    fn test_spherical_mismatch_reads_zero() {
        let mut fit = Fit::new(0);
        fit.set_orientation(E);
        fit.set_data(0, 0.0, 1e-4, H);
        fit.set_data(0, 0.0, 2e-4, V);
        fit.set_orientation(S);
        assert_eq!(fit.value(0, S), 0.0);
    }

    #[test]
    fn test_fit_recovers_spherical_beam() {
        let beam = Beam::new(150e-6, 0.01, 461e-9, 1.0, 1.0);
        let fit = sampled(&beam, &[-0.2, -0.1, 0.0, 0.1, 0.2, 0.3], S);
        let mut recovered = Beam::with_wavelength(461e-9);
        let residue = fit.apply_fit(&mut recovered);
        assert_relative_eq!(recovered.waist(S), 150e-6, max_relative = 1e-2);
        assert_abs_diff_eq!(recovered.waist_position(S), 0.01, epsilon = 1e-3);
        assert!(residue < 1e-9);
    }

    #[test]
    fn test_fit_converts_diameters() {
        let beam = Beam::new(150e-6, 0.01, 461e-9, 1.0, 1.0);
        let mut fit = Fit::new(0);
        fit.set_data_type(FitDataType::Diameter);
        for z in [-0.2, 0.0, 0.2, 0.4] {
            fit.add_data(z, 2.0 * beam.radius(z, S), S);
        }
        let result = fit.fit(461e-9);
        assert_relative_eq!(result.beam.waist(S), 150e-6, max_relative = 1e-2);
    }

    #[test]
    fn test_fit_ellipsoidal_axes_independent() {
        let mut beam = Beam::new(150e-6, 0.01, 461e-9, 1.0, 1.0);
        beam.set_waist(250e-6, V);
        beam.set_waist_position(-0.05, V);
        let fit = sampled(&beam, &[-0.3, -0.1, 0.1, 0.3, 0.5], E);
        let mut recovered = Beam::with_wavelength(461e-9);
        let residue = fit.apply_fit(&mut recovered);
        assert_relative_eq!(recovered.waist(H), 150e-6, max_relative = 1e-2);
        assert_relative_eq!(recovered.waist(V), 250e-6, max_relative = 1e-2);
        assert_abs_diff_eq!(recovered.waist_position(V), -0.05, epsilon = 2e-3);
        assert!(residue < 1e-9);
    }

    #[test]
    fn test_unfittable_leaves_beam_untouched() {
        let mut fit = Fit::new(0);
        fit.add_data(0.0, 1e-4, S);
        let mut beam = Beam::new(3e-4, 0.2, 461e-9, 1.0, 1.0);
        let before = beam.clone();
        assert_eq!(fit.apply_fit(&mut beam), 0.0);
        assert_eq!(beam, before);
    }

    #[test]
    fn test_cache_invalidated_by_edit() {
        let beam = Beam::new(150e-6, 0.01, 461e-9, 1.0, 1.0);
        let mut fit = sampled(&beam, &[-0.2, 0.0, 0.2], S);
        let first = fit.fit(461e-9);
        assert_eq!(fit.fit(461e-9), first);
        fit.remove_data(0);
        fit.add_data(0.5, 2.0 * beam.radius(0.5, S), S);
        assert!(fit.fit(461e-9).residue > 1e-6);
    }
}
