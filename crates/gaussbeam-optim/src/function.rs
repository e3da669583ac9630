//! Objective functions over a vector of scalar parameters.
//!
//! Only [`Objective::value`] is required. Derivatives are estimated by
//! finite differences, which is adequate for the smooth, cheap objectives
//! found on an optical bench (beam overlap as a function of positions).

use ndarray::Array1;

/// Step used for the finite-difference derivatives.
pub const FINITE_DIFFERENCE_STEP: f64 = 1e-6;

/// Which extremum a search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Minimum,
    Maximum,
}

impl Extremum {
    /// Factor turning the search into a minimisation.
    pub fn sign(self) -> f64 {
        match self {
            Extremum::Minimum => 1.0,
            Extremum::Maximum => -1.0,
        }
    }
}

/// A real-valued function of several scalar parameters.
pub trait Objective {
    /// Evaluate the function at `x`.
    fn value(&self, x: &Array1<f64>) -> f64;

    /// Forward finite-difference gradient.
    ///
    /// $\partial_i f \approx (f(x + \epsilon e_i) - f(x))/\epsilon$
    fn gradient(&self, x: &Array1<f64>) -> Array1<f64> {
        let f0 = self.value(x);
        let mut local = x.clone();
        let mut grad = Array1::zeros(x.len());

        for i in 0..x.len() {
            local[i] += FINITE_DIFFERENCE_STEP;
            grad[i] = (self.value(&local) - f0) / FINITE_DIFFERENCE_STEP;
            local[i] = x[i];
        }

        grad
    }

    /// Diagonal of the Hessian by central second differences.
    ///
    /// $\partial_i^2 f \approx (f(x + \epsilon e_i) - 2f(x) + f(x - \epsilon e_i))/\epsilon^2$
    fn curvature(&self, x: &Array1<f64>) -> Array1<f64> {
        let f0 = self.value(x);
        let eps2 = FINITE_DIFFERENCE_STEP * FINITE_DIFFERENCE_STEP;
        let mut local = x.clone();
        let mut curv = Array1::zeros(x.len());

        for i in 0..x.len() {
            local[i] = x[i] + FINITE_DIFFERENCE_STEP;
            let forward = self.value(&local);
            local[i] = x[i] - FINITE_DIFFERENCE_STEP;
            let backward = self.value(&local);
            local[i] = x[i];
            curv[i] = (forward - 2.0 * f0 + backward) / eps2;
        }

        curv
    }
}

/// Adapts a plain closure to [`Objective`].
pub struct FnObjective<F>(pub F);

impl<F> Objective for FnObjective<F>
where
    F: Fn(&Array1<f64>) -> f64,
{
    fn value(&self, x: &Array1<f64>) -> f64 {
        (self.0)(x)
    }
}
