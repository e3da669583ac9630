//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimises $\|r(p)\|^2$ for a residual vector $r$ over a handful of
//! parameters. Each step solves the damped normal equations
//!
//! $(J^T J + \lambda\,\mathrm{diag}(J^T J))\,\delta = -J^T r$
//!
//! and adapts $\lambda$ depending on whether the step reduced the cost.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::OptimError;

/// A least-squares problem: residuals as a function of parameters.
pub trait LeastSquaresProblem {
    /// Residual vector at `params`.
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Jacobian of the residuals, one row per residual.
    ///
    /// Defaults to forward finite differences with a step relative to each
    /// parameter's magnitude.
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        let r0 = self.residuals(params);
        let mut jac = DMatrix::zeros(r0.len(), params.len());
        let mut local = params.clone();
        let sqrt_eps = f64::EPSILON.sqrt();

        for j in 0..params.len() {
            let h = if params[j] != 0.0 {
                sqrt_eps * params[j].abs()
            } else {
                sqrt_eps
            };
            local[j] = params[j] + h;
            let r = self.residuals(&local);
            local[j] = params[j];
            jac.set_column(j, &((r - &r0) / h));
        }

        jac
    }
}

/// Configuration for Levenberg–Marquardt optimisation.
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Maximum number of accepted or rejected steps.
    pub max_iterations: usize,
    /// Initial damping parameter.
    pub initial_lambda: f64,
    /// Factor applied to lambda after a rejected step.
    pub lambda_up: f64,
    /// Factor applied to lambda after an accepted step.
    pub lambda_down: f64,
    /// Relative cost reduction below which the fit has converged.
    pub cost_tolerance: f64,
    /// Relative step size below which the fit has converged.
    pub step_tolerance: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            cost_tolerance: 1e-15,
            step_tolerance: 1e-14,
        }
    }
}

/// Result of Levenberg–Marquardt optimisation.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Best parameters found.
    pub params: DVector<f64>,
    /// Euclidean norm of the residuals at `params`.
    pub residual_norm: f64,
    /// Whether a convergence criterion was met.
    pub converged: bool,
    /// Iterations performed.
    pub iterations: usize,
}

/// Damping above which the normal equations are deemed unsolvable.
const MAX_LAMBDA: f64 = 1e16;

/// Minimise the squared residuals of `problem` starting from `initial`.
pub fn levenberg_marquardt<P>(
    problem: &P,
    initial: DVector<f64>,
    config: &LmConfig,
) -> Result<LmResult, OptimError>
where
    P: LeastSquaresProblem + ?Sized,
{
    let mut params = initial;
    let mut residuals = problem.residuals(&params);
    if params.is_empty() || residuals.is_empty() {
        return Err(OptimError::EmptyProblem);
    }

    let mut cost = residuals.norm_squared();
    let mut lambda = config.initial_lambda;
    let mut converged = cost == 0.0;
    let mut iterations = 0;

    while !converged && iterations < config.max_iterations {
        iterations += 1;

        let jac = problem.jacobian(&params);
        let jtj = jac.transpose() * &jac;
        let jtr = jac.transpose() * &residuals;

        if jtr.norm() == 0.0 {
            converged = true;
            break;
        }

        let max_diag = jtj.diagonal().max();
        let floor = f64::EPSILON * max_diag.max(f64::MIN_POSITIVE);

        let mut damped = jtj.clone();
        for i in 0..params.len() {
            damped[(i, i)] += lambda * jtj[(i, i)].max(floor);
        }

        let step = match damped.cholesky() {
            Some(chol) => -chol.solve(&jtr),
            None => {
                lambda *= config.lambda_up;
                if lambda > MAX_LAMBDA {
                    return Err(OptimError::Singular { lambda });
                }
                continue;
            }
        };

        let candidate = &params + &step;
        let candidate_residuals = problem.residuals(&candidate);
        let candidate_cost = candidate_residuals.norm_squared();

        if candidate_cost.is_finite() && candidate_cost < cost {
            let reduction = cost - candidate_cost;
            let step_small =
                step.norm() <= config.step_tolerance * (params.norm() + config.step_tolerance);

            params = candidate;
            residuals = candidate_residuals;
            lambda *= config.lambda_down;

            if reduction <= config.cost_tolerance * cost || step_small || candidate_cost == 0.0 {
                converged = true;
            }
            cost = candidate_cost;
        } else {
            lambda *= config.lambda_up;
            if lambda > MAX_LAMBDA {
                // No descent direction left at machine precision.
                converged = true;
            }
        }
    }

    debug!(
        "Levenberg-Marquardt finished after {} iterations: |r| = {:.3e}, converged = {}",
        iterations,
        cost.sqrt(),
        converged
    );

    Ok(LmResult {
        params,
        residual_norm: cost.sqrt(),
        converged,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Exponential {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for Exponential {
        fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.t.len(),
                self.t
                    .iter()
                    .zip(&self.y)
                    .map(|(&t, &y)| y - p[0] * (-p[1] * t).exp()),
            )
        }
    }

    #[test]
    fn test_recovers_exponential_decay() {
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y = t.iter().map(|&t| 2.5 * (-1.3 * t).exp()).collect();
        let problem = Exponential { t, y };

        let result =
            levenberg_marquardt(&problem, DVector::from_vec(vec![1.0, 0.5]), &LmConfig::default())
                .unwrap();
        assert!(result.converged);
        assert_relative_eq!(result.params[0], 2.5, max_relative = 1e-6);
        assert_relative_eq!(result.params[1], 1.3, max_relative = 1e-6);
        assert!(result.residual_norm < 1e-8);
    }

    #[test]
    fn test_empty_problem_is_rejected() {
        let problem = Exponential { t: vec![], y: vec![] };
        let err = levenberg_marquardt(&problem, DVector::from_vec(vec![1.0]), &LmConfig::default())
            .unwrap_err();
        assert_eq!(err, OptimError::EmptyProblem);
    }
}
