//! # Gaussbeam Optim
//!
//! Small numerical optimisation toolkit used to place optical elements and to
//! fit measured beam profiles.
//!
//! ## Modules
//!
//! - [`function`]: the [`Objective`] trait with finite-difference gradient
//!   and curvature estimates.
//! - [`line_search`]: minimum bracketing and Brent's one-dimensional
//!   minimiser, composed into a search along a direction.
//! - [`conjugate_gradient`]: Polak–Ribière conjugate gradient built on the
//!   line search.
//! - [`levenberg_marquardt`]: damped nonlinear least squares with a
//!   finite-difference Jacobian.
//! - [`statistics`]: first and second moments and the least-squares line.

pub mod conjugate_gradient;
pub mod function;
pub mod levenberg_marquardt;
pub mod line_search;
pub mod statistics;

use thiserror::Error;

pub use conjugate_gradient::{
    local_extremum, local_maximum, local_minimum, ConjugateGradientConfig, OptimizationOutcome,
};
pub use function::{Extremum, FnObjective, Objective};
pub use levenberg_marquardt::{levenberg_marquardt, LeastSquaresProblem, LmConfig, LmResult};
pub use line_search::{bracket_minimum, brent, line_extremum, Bracket};
pub use statistics::Statistics;

/// Errors reported by the optimisers.
#[derive(Debug, Error, PartialEq)]
pub enum OptimError {
    #[error("Optimisation problem has no parameters or no residuals")]
    EmptyProblem,

    #[error("Normal equations are singular (damping reached {lambda:.2e})")]
    Singular { lambda: f64 },
}
