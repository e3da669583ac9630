//! Polak–Ribière nonlinear conjugate gradient.
//!
//! Each iteration estimates the gradient by finite differences, builds a new
//! conjugate direction
//!
//! $d_k = \beta_k d_{k-1} \mp g_k, \quad \beta_k = \max\left(0, \frac{g_k \cdot (g_k - g_{k-1})}{g_{k-1} \cdot g_{k-1}}\right)$
//!
//! and moves to the extremum along it with [`line_extremum`].

use log::debug;
use ndarray::Array1;

use crate::function::{Extremum, Objective};
use crate::line_search::line_extremum;

/// Overlap fraction treated as a perfect match when maximising beam overlap.
pub const OVERLAP_TARGET: f64 = 0.99999;

/// Stopping rules for [`local_extremum`].
#[derive(Debug, Clone)]
pub struct ConjugateGradientConfig {
    /// Iteration cap. Reaching it without meeting the stopping rule is a
    /// failure.
    pub max_iterations: usize,
    /// Stop successfully once the objective reaches this value (from below
    /// when maximising, from above when minimising). With `None` the search
    /// stops once an iteration improves the objective by less than
    /// `value_tolerance`.
    pub target_value: Option<f64>,
    /// Relative improvement below which the search is considered converged
    /// when no target is set.
    pub value_tolerance: f64,
}

impl Default for ConjugateGradientConfig {
    fn default() -> Self {
        Self {
            max_iterations: 250,
            target_value: Some(OVERLAP_TARGET),
            value_tolerance: 1e-12,
        }
    }
}

impl ConjugateGradientConfig {
    /// Search without a target value, stopping on convergence.
    pub fn converging() -> Self {
        Self {
            target_value: None,
            ..Default::default()
        }
    }
}

/// Result of a local search.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    /// Final parameters.
    pub position: Array1<f64>,
    /// Objective value at `position`.
    pub value: f64,
    /// Whether the stopping rule was met before the iteration cap.
    pub success: bool,
    /// Number of conjugate-gradient iterations performed.
    pub iterations: usize,
}

fn target_reached(value: f64, target: f64, kind: Extremum) -> bool {
    match kind {
        Extremum::Maximum => value >= target,
        Extremum::Minimum => value <= target,
    }
}

/// Local extremum of `objective` starting from `x`.
pub fn local_extremum<O>(
    objective: &O,
    x: &Array1<f64>,
    kind: Extremum,
    config: &ConjugateGradientConfig,
) -> OptimizationOutcome
where
    O: Objective + ?Sized,
{
    // Ascent for maxima, descent for minima
    let ascent = -kind.sign();

    let mut position = x.clone();
    let mut value = objective.value(&position);
    let mut direction: Array1<f64> = Array1::zeros(x.len());
    let mut old_grad: Option<Array1<f64>> = None;
    let mut iterations = 0;

    while iterations < config.max_iterations {
        if let Some(target) = config.target_value {
            if target_reached(value, target, kind) {
                return OptimizationOutcome {
                    position,
                    value,
                    success: true,
                    iterations,
                };
            }
        }

        let grad = objective.gradient(&position);
        let beta = match &old_grad {
            Some(old) => {
                let denominator = old.dot(old);
                if denominator > 0.0 {
                    (grad.dot(&(&grad - old)) / denominator).max(0.0)
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        direction = &direction * beta + &grad * ascent;
        old_grad = Some(grad);

        if direction.iter().all(|&d| d == 0.0) {
            // Flat objective: nowhere to go.
            let success = config.target_value.is_none();
            debug!("Conjugate gradient stalled at iteration {} (value {:.6})", iterations, value);
            return OptimizationOutcome {
                position,
                value,
                success,
                iterations,
            };
        }

        position = line_extremum(objective, &position, &direction, kind);
        let new_value = objective.value(&position);
        iterations += 1;
        debug!("Conjugate gradient iteration {}: value {:.8}", iterations, new_value);

        if config.target_value.is_none() {
            let improvement = (new_value - value) * ascent;
            if improvement.abs() <= config.value_tolerance * (value.abs() + config.value_tolerance) {
                return OptimizationOutcome {
                    position,
                    value: new_value,
                    success: true,
                    iterations,
                };
            }
        }
        value = new_value;
    }

    let success = match config.target_value {
        Some(target) => target_reached(value, target, kind),
        None => false,
    };
    if !success {
        debug!("Conjugate gradient reached its iteration cap ({})", config.max_iterations);
    }

    OptimizationOutcome {
        position,
        value,
        success,
        iterations,
    }
}

/// Local minimum with the given stopping rules.
pub fn local_minimum<O>(
    objective: &O,
    x: &Array1<f64>,
    config: &ConjugateGradientConfig,
) -> OptimizationOutcome
where
    O: Objective + ?Sized,
{
    local_extremum(objective, x, Extremum::Minimum, config)
}

/// Local maximum with the given stopping rules.
pub fn local_maximum<O>(
    objective: &O,
    x: &Array1<f64>,
    config: &ConjugateGradientConfig,
) -> OptimizationOutcome
where
    O: Objective + ?Sized,
{
    local_extremum(objective, x, Extremum::Maximum, config)
}
