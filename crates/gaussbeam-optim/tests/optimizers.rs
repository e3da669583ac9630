//! Integration tests for the optimisation toolkit on smooth test problems.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::DVector;
use ndarray::{array, Array1};

use gaussbeam_optim::{
    bracket_minimum, brent, levenberg_marquardt, local_maximum, ConjugateGradientConfig,
    FnObjective, LeastSquaresProblem, LmConfig, Objective,
};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Normalised overlap of two 1-D Gaussian profiles as a function of the
/// relative offset and width ratio; maximal (= 1) at `x = [0, 1]`.
fn gaussian_overlap(x: &Array1<f64>) -> f64 {
    let offset = x[0];
    let ratio = x[1].abs().max(1e-6);
    let s = 1.0 + ratio * ratio;
    (2.0 * ratio / s).sqrt() * (-offset * offset / s).exp()
}

/// Hyperbolic beam-radius profile $w(z) = w_0\sqrt{1 + ((z - z_w)/z_R)^2}$.
struct Hyperbola {
    z: Vec<f64>,
    w: Vec<f64>,
    rayleigh_per_waist2: f64,
}

impl LeastSquaresProblem for Hyperbola {
    fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
        let waist = p[0].abs();
        let rayleigh = self.rayleigh_per_waist2 * waist * waist;
        DVector::from_iterator(
            self.z.len(),
            self.z.iter().zip(&self.w).map(|(&z, &w)| {
                let zred = (z - p[1]) / rayleigh;
                w - waist * (1.0 + zred * zred).sqrt()
            }),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Line search
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_brent_on_bracketed_quartic() {
    let f = |t: f64| (t - 1.5).powi(4) + 0.1 * (t - 1.5).powi(2);
    let bracket = bracket_minimum(f, -1.0, 0.0);
    let t = brent(f, &bracket);
    assert_abs_diff_eq!(t, 1.5, epsilon = 1e-2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Conjugate gradient
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_conjugate_gradient_maximises_overlap() {
    let f = FnObjective(gaussian_overlap);
    let start = array![0.4, 1.6];
    assert!(f.value(&start) < 0.9);

    let outcome = local_maximum(&f, &start, &ConjugateGradientConfig::default());
    assert!(outcome.success, "stopped at {:?}", outcome.position);
    assert!(outcome.value >= 0.99999);
    assert!(outcome.iterations <= 250);
}

#[test]
fn test_curvature_is_negative_at_maximum() {
    let f = FnObjective(gaussian_overlap);
    let c = f.curvature(&array![0.0, 1.0]);
    assert!(c[0] < 0.0);
    assert!(c[1] < 0.0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Levenberg–Marquardt
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_levenberg_marquardt_recovers_beam_waist() {
    let wavelength = 461e-9;
    let rayleigh_per_waist2 = std::f64::consts::PI / wavelength;
    let (w0, zw) = (150e-6, 0.01);
    let zr = rayleigh_per_waist2 * w0 * w0;

    let z: Vec<f64> = (0..7).map(|i| zw - zr + i as f64 * zr / 3.0).collect();
    let w = z
        .iter()
        .map(|&z| w0 * (1.0 + ((z - zw) / zr).powi(2)).sqrt())
        .collect();
    let problem = Hyperbola {
        z,
        w,
        rayleigh_per_waist2,
    };

    let result = levenberg_marquardt(
        &problem,
        DVector::from_vec(vec![120e-6, 0.05]),
        &LmConfig::default(),
    )
    .unwrap();

    assert_relative_eq!(result.params[0].abs(), w0, max_relative = 1e-4);
    assert_abs_diff_eq!(result.params[1], zw, epsilon = 1e-5);
    assert!(result.residual_norm < 1e-9);
}
