use chrono::NaiveDate;
use nalgebra::DMatrix;
use serde::Serialize;

use crate::error::{ForecastError, Result};
use crate::linalg::ols;

// MacKinnon (2010) response surface, constant-only case, one series: 1%, 5%, 10%.
const MACKINNON_CONST: [[f64; 4]; 3] = [
    [-3.43035, -6.5393, -16.786, -79.433],
    [-2.86154, -2.8903, -4.234, -40.040],
    [-2.56677, -1.5384, -2.809, 0.0],
];

#[derive(Debug, Clone, Serialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub lag: usize,
    pub nobs: usize,
    /// Finite-sample 1/5/10% critical values.
    pub critical_values: [f64; 3],
}

impl AdfResult {
    pub fn rejects_unit_root_5pct(&self) -> bool {
        self.statistic < self.critical_values[1]
    }
}

fn critical_values(nobs: usize) -> [f64; 3] {
    let t = nobs as f64;
    let mut out = [0.0; 3];
    for (o, b) in out.iter_mut().zip(MACKINNON_CONST.iter()) {
        *o = b[0] + b[1] / t + b[2] / (t * t) + b[3] / (t * t * t);
    }
    out
}

/// Augmented Dickey-Fuller t-test with a constant and `lag` lagged differences.
pub fn adf_test(series: &[f64], lag: usize, as_of: NaiveDate) -> Result<AdfResult> {
    let n = series.len();
    let start = lag + 1;
    let ncols = 2 + lag;
    if n <= start + ncols + 1 {
        return Err(ForecastError::InsufficientWindowData {
            as_of,
            rows: n,
            required: start + ncols + 2,
        });
    }
    let nobs = n - start;
    let diff = |t: usize| series[t] - series[t - 1];
    let y = DMatrix::from_fn(nobs, 1, |i, _| diff(start + i));
    let x = DMatrix::from_fn(nobs, ncols, |i, j| {
        let t = start + i;
        match j {
            0 => 1.0,
            1 => series[t - 1],
            _ => diff(t - (j - 1)),
        }
    });
    let fit = ols(&y, &x).ok_or_else(|| ForecastError::singular(as_of, "adf"))?;
    let ssr = fit.resid.iter().map(|e| e * e).sum::<f64>();
    let s2 = ssr / (nobs - ncols) as f64;
    let se = (s2 * fit.xtx_inv[(1, 1)]).sqrt();
    if !se.is_finite() || se <= 0.0 {
        return Err(ForecastError::singular(as_of, "adf"));
    }
    Ok(AdfResult {
        statistic: fit.coef[(1, 0)] / se,
        lag,
        nobs,
        critical_values: critical_values(nobs),
    })
}
