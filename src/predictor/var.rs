use chrono::NaiveDate;
use nalgebra::DMatrix;

use crate::error::{ForecastError, Result};
use crate::linalg::{log_det_spd, matrix_from_rows, ols};
use crate::model::ModelWindow;

/// Design matrix for a levels VAR with constant: row `t` (for `t` in `start..n`) is
/// `[1, x_{t-1}, ..., x_{t-lag}]`. Requires `start >= lag`.
pub fn var_design(rows: &[Vec<f64>], lag: usize, start: usize) -> DMatrix<f64> {
    let k = rows.first().map(|r| r.len()).unwrap_or(0);
    let n = rows.len();
    let nobs = n.saturating_sub(start);
    DMatrix::from_fn(nobs, 1 + k * lag, |i, j| {
        if j == 0 {
            return 1.0;
        }
        let t = start + i;
        let l = (j - 1) / k + 1;
        let col = (j - 1) % k;
        rows[t - l][col]
    })
}

fn var_targets(rows: &[Vec<f64>], start: usize) -> DMatrix<f64> {
    let k = rows.first().map(|r| r.len()).unwrap_or(0);
    matrix_from_rows(&rows[start..], k)
}

/// AIC of a VAR(`lag`) fitted on rows `start..n` (shared sample across candidate lags).
pub fn var_aic(rows: &[Vec<f64>], lag: usize, start: usize) -> Option<f64> {
    let k = rows.first()?.len();
    let x = var_design(rows, lag, start);
    let y = var_targets(rows, start);
    let fit = ols(&y, &x)?;
    let nobs = y.nrows() as f64;
    let sigma = fit.resid.transpose() * &fit.resid / nobs;
    let ld = log_det_spd(&sigma)?;
    let free_params = (k * k * lag + k) as f64;
    Some(ld + 2.0 * free_params / nobs)
}

/// Unrestricted levels VAR with a constant term.
#[derive(Debug, Clone)]
pub struct VarModel {
    lag: usize,
    n_series: usize,
    /// `(1 + k * lag) x k`: intercept row, then lag-1 block, lag-2 block, ...
    coef: DMatrix<f64>,
    history: Vec<Vec<f64>>,
}

impl VarModel {
    pub fn fit(window: &ModelWindow<'_>, lag: usize) -> Result<Self> {
        let rows = window.rows();
        let k = window.n_series();
        let required = lag + k * lag + 2;
        if lag == 0 || rows.len() < required {
            return Err(ForecastError::InsufficientWindowData {
                as_of: window.as_of,
                rows: rows.len(),
                required,
            });
        }
        let x = var_design(rows, lag, lag);
        let y = var_targets(rows, lag);
        let fit = ols(&y, &x).ok_or_else(|| ForecastError::singular(window.as_of, "var fit"))?;
        Ok(Self {
            lag,
            n_series: k,
            coef: fit.coef,
            history: rows[rows.len() - lag..].to_vec(),
        })
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    pub fn intercept(&self) -> Vec<f64> {
        self.coef.row(0).iter().copied().collect()
    }

    /// Iterate the recursion `horizon` steps and return only the final step.
    pub fn forecast(&self, horizon: usize, as_of: NaiveDate) -> Result<Vec<f64>> {
        let k = self.n_series;
        let mut path = self.history.clone();
        for _ in 0..horizon.max(1) {
            let t = path.len();
            let mut next = vec![0.0; k];
            for (eq, out) in next.iter_mut().enumerate() {
                let mut v = self.coef[(0, eq)];
                for l in 1..=self.lag {
                    let prev = &path[t - l];
                    for (col, x) in prev.iter().enumerate() {
                        v += self.coef[(1 + (l - 1) * k + col, eq)] * x;
                    }
                }
                *out = v;
            }
            if next.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::singular(as_of, "var forecast"));
            }
            path.push(next);
        }
        path.pop()
            .ok_or_else(|| ForecastError::singular(as_of, "var forecast"))
    }
}
