//! Sample moments and the least-squares regression line.

/// Summary statistics of paired samples `(x, y)`.
///
/// Variances and covariance use the unbiased `n - 1` normalisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub mean_x: f64,
    pub mean_y: f64,
    pub variance_x: f64,
    pub variance_y: f64,
    pub covariance: f64,
    /// Squared correlation coefficient.
    pub rho2: f64,
    /// Slope of the regression line `y = slope·x + intercept`.
    pub slope: f64,
    pub intercept: f64,
}

impl Statistics {
    /// Compute the statistics of `x` and `y`, truncated to the shorter of
    /// the two.
    ///
    /// Fewer than two samples, or samples with no spread in `x`, produce
    /// non-finite regression coefficients.
    pub fn new(x: &[f64], y: &[f64]) -> Self {
        let n = x.len().min(y.len()) as f64;
        let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);

        for (&xi, &yi) in x.iter().zip(y) {
            sx += xi;
            sy += yi;
            sxx += xi * xi;
            syy += yi * yi;
            sxy += xi * yi;
        }

        let mean_x = sx / n;
        let mean_y = sy / n;
        let covariance = (sxy - mean_x * mean_y * n) / (n - 1.0);
        let variance_x = (sxx - mean_x * mean_x * n) / (n - 1.0);
        let variance_y = (syy - mean_y * mean_y * n) / (n - 1.0);
        let rho2 = covariance * covariance / (variance_x * variance_y);
        let slope = covariance / variance_x;
        let intercept = mean_y - slope * mean_x;

        Self {
            mean_x,
            mean_y,
            variance_x,
            variance_y,
            covariance,
            rho2,
            slope,
            intercept,
        }
    }
}
