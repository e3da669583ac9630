//! One-dimensional minimisation along a direction.
//!
//! The search first brackets a minimum by parabolic extrapolation with
//! golden-ratio expansion, then refines it with Brent's method (golden
//! section combined with inverse parabolic interpolation).

use log::debug;
use ndarray::Array1;

use crate::function::{Extremum, Objective};

/// Default expansion ratio between successive bracketing intervals.
const GOLDEN: f64 = 1.618_033_988_749_895;
/// Guard against division by zero in the parabolic step.
const TINY: f64 = 1e-20;
/// Maximum magnification of a parabolic extrapolation step.
const GROWTH_LIMIT: f64 = 100.0;
/// Bracketing gives up after this many expansions.
const BRACKET_MAX_ITERATIONS: usize = 200;

/// $(3 - \sqrt 5)/2$
const C_GOLDEN: f64 = 0.381_966_011_250_105_2;
const BRENT_MAX_ITERATIONS: usize = 100;
const BRENT_RELATIVE_TOLERANCE: f64 = 2e-4;
const BRENT_ABSOLUTE_TOLERANCE: f64 = 1e-10;

/// Three abscissae with `f(b)` below `f(a)` and `f(c)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// Bracket a minimum of `f` starting from the interval `[start, stop]`.
///
/// Walks downhill from the better of the two starting points, extrapolating
/// parabolically and otherwise expanding by the golden ratio. If `f` keeps
/// decreasing the last triple is returned after a bounded number of steps.
pub fn bracket_minimum<F>(mut f: F, start: f64, stop: f64) -> Bracket
where
    F: FnMut(f64) -> f64,
{
    let (mut a, mut b) = (start, stop);
    let mut fa = f(a);
    let mut fb = f(b);
    if fb > fa {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = b + GOLDEN * (b - a);
    let mut fc = f(c);

    let mut iterations = 0;
    while fb > fc && iterations < BRACKET_MAX_ITERATIONS {
        iterations += 1;

        let r = (b - a) * (fb - fc);
        let q = (b - c) * (fb - fa);
        let denominator = 2.0 * (q - r).abs().max(TINY).copysign(q - r);
        let mut u = b - ((b - c) * q - (b - a) * r) / denominator;
        let ulim = b + GROWTH_LIMIT * (c - b);
        let mut fu;

        if (b - u) * (u - c) > 0.0 {
            // Parabolic minimum between b and c
            fu = f(u);
            if fu < fc {
                return Bracket { a: b, b: u, c };
            } else if fu > fb {
                return Bracket { a, b, c: u };
            }
            u = c + GOLDEN * (c - b);
            fu = f(u);
        } else if (c - u) * (u - ulim) > 0.0 {
            fu = f(u);
            if fu < fc {
                b = c;
                c = u;
                u = c + GOLDEN * (c - b);
                fb = fc;
                fc = fu;
                fu = f(u);
            }
        } else if (u - ulim) * (ulim - c) >= 0.0 {
            u = ulim;
            fu = f(u);
        } else {
            u = c + GOLDEN * (c - b);
            fu = f(u);
        }

        a = b;
        b = c;
        c = u;
        fa = fb;
        fb = fc;
        fc = fu;
    }

    Bracket { a, b, c }
}

/// Minimise `f` inside `bracket` with Brent's method.
///
/// Converges to a relative tolerance of 2e-4 (plus 1e-10 absolute) or
/// stops after 100 iterations. Returns the abscissa of the minimum.
pub fn brent<F>(mut f: F, bracket: &Bracket) -> f64
where
    F: FnMut(f64) -> f64,
{
    let mut a = bracket.a.min(bracket.c);
    let mut b = bracket.a.max(bracket.c);

    let mut x = bracket.b;
    let mut w = x;
    let mut v = x;
    let mut fx = f(x);
    let mut fw = fx;
    let mut fv = fx;

    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;

    for _ in 0..BRENT_MAX_ITERATIONS {
        let xm = 0.5 * (a + b);
        let tol1 = BRENT_RELATIVE_TOLERANCE * x.abs() + BRENT_ABSOLUTE_TOLERANCE;
        let tol2 = 2.0 * tol1;

        if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
            return x;
        }

        let mut golden_step = true;
        if e.abs() > tol1 {
            // Trial parabolic fit through x, v, w
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            } else {
                q = -q;
            }

            let previous_e = e;
            e = d;
            if p.abs() < (0.5 * q * previous_e).abs() && p > q * (a - x) && p < q * (b - x) {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(xm - x);
                }
                golden_step = false;
            }
        }

        if golden_step {
            e = if x >= xm { a - x } else { b - x };
            d = C_GOLDEN * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else {
            x + tol1.copysign(d)
        };
        let fu = f(u);

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            w = x;
            x = u;
            fv = fw;
            fw = fx;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                w = u;
                fv = fw;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }

    x
}

/// Search the extremum of `objective` on the line `x + t·direction`.
///
/// Returns the parameter vector at the extremum found.
pub fn line_extremum<O>(
    objective: &O,
    x: &Array1<f64>,
    direction: &Array1<f64>,
    kind: Extremum,
) -> Array1<f64>
where
    O: Objective + ?Sized,
{
    let sign = kind.sign();
    let along = |t: f64| x + &(direction * t);
    let mut line_value = |t: f64| sign * objective.value(&along(t));

    let bracket = bracket_minimum(&mut line_value, 0.0, 1.0);
    debug!(
        "Line search bracket: [{:.4e}, {:.4e}] around {:.4e}",
        bracket.a, bracket.c, bracket.b
    );

    let t = brent(&mut line_value, &bracket);
    debug!("Line search extremum at t = {:.6e}", t);

    along(t)
}

/// Minimum of `objective` along `direction` from `x`.
pub fn line_minimum<O>(objective: &O, x: &Array1<f64>, direction: &Array1<f64>) -> Array1<f64>
where
    O: Objective + ?Sized,
{
    line_extremum(objective, x, direction, Extremum::Minimum)
}

/// Maximum of `objective` along `direction` from `x`.
pub fn line_maximum<O>(objective: &O, x: &Array1<f64>, direction: &Array1<f64>) -> Array1<f64>
where
    O: Objective + ?Sized,
{
    line_extremum(objective, x, direction, Extremum::Maximum)
}
