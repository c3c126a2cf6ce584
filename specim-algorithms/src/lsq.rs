//! Least-squares solvers: ordinary linear fits and a box-bounded
//! Levenberg–Marquardt minimiser for small nonlinear models.

use nalgebra::{DMatrix, DVector};
use specim_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for [`levenberg_marquardt`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LmConfig {
    /// Relative cost decrease below which the fit is considered converged.
    pub ftol: f64,
    /// Maximum number of accepted or rejected steps.
    pub max_iterations: usize,
    /// Initial damping factor.
    pub initial_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            ftol: 1e-5,
            max_iterations: 200,
            initial_lambda: 1e-3,
        }
    }
}

impl LmConfig {
    /// Set the convergence tolerance.
    #[must_use]
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    /// Set the iteration limit.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Outcome of a Levenberg–Marquardt run.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Best parameters found, inside the bounds.
    pub params: Vec<f64>,
    /// Half the sum of squared residuals at `params`.
    pub cost: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether the tolerance was reached before the iteration limit.
    pub converged: bool,
}

const MAX_LAMBDA: f64 = 1e12;

/// Minimise `0.5 * sum(residual(p)^2)` with `p` kept inside `bounds`.
///
/// The Jacobian is estimated with forward differences. Each trial step is
/// projected onto the box before evaluation.
///
/// # Errors
/// Returns [`Error::FitFailed`] if the parameter and bound counts differ,
/// a bound is NaN, the residual is empty, or the starting point gives a
/// non-finite cost.
pub fn levenberg_marquardt<F>(
    residual: F,
    initial: &[f64],
    bounds: &[(f64, f64)],
    config: &LmConfig,
) -> Result<LmResult>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    if initial.len() != bounds.len() {
        return Err(Error::FitFailed(format!(
            "{} parameters but {} bounds",
            initial.len(),
            bounds.len()
        )));
    }
    if let Some(i) = bounds.iter().position(|(lo, hi)| lo.is_nan() || hi.is_nan()) {
        return Err(Error::FitFailed(format!("bound {i} is NaN")));
    }
    let n = initial.len();
    let mut params: Vec<f64> = initial
        .iter()
        .zip(bounds)
        .map(|(&p, &b)| clamp(p, b))
        .collect();
    let mut r = residual(&params);
    if r.is_empty() {
        return Err(Error::FitFailed("empty residual".into()));
    }
    let mut cost = half_sum_sq(&r);
    if !cost.is_finite() {
        return Err(Error::FitFailed("non-finite cost at starting point".into()));
    }

    let mut lambda = config.initial_lambda;
    let mut iterations = 0;
    let mut converged = cost == 0.0;

    while !converged && iterations < config.max_iterations {
        iterations += 1;
        let jac = jacobian(&residual, &params, &r, bounds);
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let g = &jt * DVector::from_column_slice(&r);

        let mut damped = jtj.clone();
        for i in 0..n {
            damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
        }
        let Some(step) = damped.lu().solve(&(-g)) else {
            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                break;
            }
            continue;
        };

        let trial: Vec<f64> = params
            .iter()
            .zip(step.iter())
            .zip(bounds)
            .map(|((&p, &d), &b)| clamp(p + d, b))
            .collect();
        let r_trial = residual(&trial);
        let cost_trial = half_sum_sq(&r_trial);

        if cost_trial.is_finite() && cost_trial < cost {
            let decrease = (cost - cost_trial) / cost.max(f64::MIN_POSITIVE);
            params = trial;
            r = r_trial;
            cost = cost_trial;
            lambda = (lambda / 10.0).max(1e-12);
            if decrease < config.ftol || cost == 0.0 {
                converged = true;
            }
        } else {
            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                // No downhill step exists at this point.
                converged = true;
            }
        }
    }

    Ok(LmResult {
        params,
        cost,
        iterations,
        converged,
    })
}

fn jacobian<F>(residual: &F, params: &[f64], r0: &[f64], bounds: &[(f64, f64)]) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = r0.len();
    let n = params.len();
    let mut jac = DMatrix::zeros(m, n);
    let mut shifted = params.to_vec();
    for j in 0..n {
        let h = f64::EPSILON.sqrt() * params[j].abs().max(1.0);
        // Step backwards when the upper bound is in the way.
        let h = if params[j] + h > bounds[j].1 { -h } else { h };
        shifted[j] = params[j] + h;
        let r1 = residual(&shifted);
        shifted[j] = params[j];
        for i in 0..m.min(r1.len()) {
            jac[(i, j)] = (r1[i] - r0[i]) / h;
        }
    }
    jac
}

/// Project onto `[lo, hi]` in either order. A NaN bound leaves the value as is.
fn clamp(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if lo <= hi {
        value.clamp(lo, hi)
    } else if hi < lo {
        value.clamp(hi, lo)
    } else {
        value
    }
}

fn half_sum_sq(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

/// Straight-line fit `y = intercept + slope * x`.
///
/// # Errors
/// Returns [`Error::FitFailed`] with fewer than two points or when all `x`
/// values coincide.
#[allow(clippy::cast_precision_loss)]
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return Err(Error::FitFailed(format!("{n} points for a line fit")));
    }
    let nf = n as f64;
    let mx = x[..n].iter().sum::<f64>() / nf;
    let my = y[..n].iter().sum::<f64>() / nf;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        sxx += dx * dx;
        sxy += dx * (y[i] - my);
    }
    if sxx <= 0.0 || !sxx.is_finite() {
        return Err(Error::FitFailed("degenerate abscissa".into()));
    }
    let slope = sxy / sxx;
    Ok((my - slope * mx, slope))
}

/// Coefficients `c` minimising `|sum_k c_k * basis_k - y|^2`.
///
/// # Errors
/// Returns [`Error::FitFailed`] if the normal equations are singular.
pub fn linear_combination(basis: &[Vec<f64>], y: &[f64]) -> Result<Vec<f64>> {
    let k = basis.len();
    let m = y.len();
    if k == 0 || basis.iter().any(|b| b.len() != m) {
        return Err(Error::FitFailed("basis length mismatch".into()));
    }
    let a = DMatrix::from_fn(m, k, |i, j| basis[j][i]);
    let at = a.transpose();
    let ata = &at * &a;
    let aty = &at * DVector::from_column_slice(y);
    ata.lu()
        .solve(&aty)
        .map(|c| c.iter().copied().collect())
        .ok_or_else(|| Error::FitFailed("singular normal equations".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_fit() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 0.5 * v).collect();
        let (a, b) = linear_fit(&x, &y).unwrap();
        assert_relative_eq!(a, 2.0, epsilon = 1e-12);
        assert_relative_eq!(b, 0.5, epsilon = 1e-12);
        assert!(linear_fit(&[1.0, 1.0], &[0.0, 1.0]).is_err());
    }

    #[test]
    fn test_linear_combination() {
        let x: Vec<f64> = (1..=10).map(f64::from).collect();
        let b1: Vec<f64> = x.iter().map(|v| v.powf(-2.0)).collect();
        let b2: Vec<f64> = x.iter().map(|v| v.powf(-4.0)).collect();
        let y: Vec<f64> = b1.iter().zip(&b2).map(|(p, q)| 3.0 * p + 7.0 * q).collect();
        let c = linear_combination(&[b1, b2], &y).unwrap();
        assert_relative_eq!(c[0], 3.0, epsilon = 1e-8);
        assert_relative_eq!(c[1], 7.0, epsilon = 1e-8);
    }

    #[test]
    fn test_lm_recovers_exponential() {
        let x: Vec<f64> = (0..40).map(|i| f64::from(i) * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| 5.0 * (-1.3 * v).exp()).collect();
        let res = levenberg_marquardt(
            |p| x.iter().zip(&y).map(|(xi, yi)| p[0] * (-p[1] * xi).exp() - yi).collect(),
            &[3.0, 0.5],
            &[(0.0, 100.0), (0.0, 10.0)],
            &LmConfig::default().with_ftol(1e-12),
        )
        .unwrap();
        assert_relative_eq!(res.params[0], 5.0, epsilon = 1e-4);
        assert_relative_eq!(res.params[1], 1.3, epsilon = 1e-4);
    }

    #[test]
    fn test_lm_respects_bounds() {
        let res = levenberg_marquardt(
            |p| vec![p[0] - 10.0],
            &[0.0],
            &[(-1.0, 2.0)],
            &LmConfig::default(),
        )
        .unwrap();
        assert!(res.params[0] <= 2.0);
        assert_relative_eq!(res.params[0], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_clamp_tolerates_nan_bounds() {
        assert_relative_eq!(clamp(5.0, (2.0, 1.0)), 2.0);
        assert_relative_eq!(clamp(5.0, (f64::NAN, f64::NAN)), 5.0);
        assert_relative_eq!(clamp(-5.0, (f64::NAN, 1.0)), -5.0);
    }

    #[test]
    fn test_lm_rejects_nan_bounds() {
        let res = levenberg_marquardt(
            |p| vec![p[0] - 1.0],
            &[0.0],
            &[(f64::NAN, f64::NAN)],
            &LmConfig::default(),
        );
        assert!(matches!(res, Err(Error::FitFailed(_))));
    }
}
