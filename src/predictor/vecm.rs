use chrono::NaiveDate;
use nalgebra::DMatrix;

use crate::error::{ForecastError, Result};
use crate::linalg::{hstack, ols};
use crate::model::{EquilibriumVector, ModelWindow};
use crate::selector::johansen::{ecm_design, level_lag, restricted_term, DeterministicMode};
use crate::selector::RankTest;

/// Error-correction model of rank `rank` with `k_ar_diff` lagged differences.
///
/// `dx_t = A (beta' [x_{t-L}, d_t]) + sum_l G_l dx_{t-l} (+ c in long-run mode)`, where
/// `L` and `d_t` follow the deterministic mode of the rank test it was built from.
#[derive(Debug, Clone)]
pub struct VecmModel {
    mode: DeterministicMode,
    rank: usize,
    k_ar_diff: usize,
    n_series: usize,
    /// `(k + 1) x rank`, top `rank x rank` block is the identity.
    beta: DMatrix<f64>,
    /// OLS coefficients on `[ect, lagged dx, (const)]`, `ncols x k`.
    coef: DMatrix<f64>,
    /// Last `k_ar_diff + 1` levels of the window.
    tail: Vec<Vec<f64>>,
    /// Window row index of `tail[0]`; drives the trend term.
    tail_start: usize,
}

impl VecmModel {
    pub fn fit(window: &ModelWindow<'_>, test: &RankTest, rank: usize) -> Result<Self> {
        let as_of = window.as_of;
        let k = window.n_series();
        let rows = window.rows();
        let k_ar_diff = test.k_ar_diff;
        if rank == 0 || rank >= k {
            return Err(ForecastError::singular(as_of, "vecm rank"));
        }
        let required = k_ar_diff + 2 + k * k_ar_diff + k + 1;
        if rows.len() < required {
            return Err(ForecastError::InsufficientWindowData {
                as_of,
                rows: rows.len(),
                required,
            });
        }

        let raw = test.raw_vectors.columns(0, rank).into_owned();
        let head = raw.rows(0, rank).into_owned();
        let head_inv = head
            .try_inverse()
            .ok_or_else(|| ForecastError::singular(as_of, "vecm normalization"))?;
        let beta = raw * head_inv;

        let d = ecm_design(rows, test.mode, k_ar_diff);
        let ect = &d.z1 * &beta;
        let x = hstack(&[&ect, &d.zk]);
        let fit = ols(&d.z0, &x).ok_or_else(|| ForecastError::singular(as_of, "vecm fit"))?;

        let tail_start = rows.len() - (k_ar_diff + 1);
        Ok(Self {
            mode: test.mode,
            rank,
            k_ar_diff,
            n_series: k,
            beta,
            coef: fit.coef,
            tail: rows[tail_start..].to_vec(),
            tail_start,
        })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn k_ar_diff(&self) -> usize {
        self.k_ar_diff
    }

    /// First cointegrating relation, first metal's coefficient equal to 1.
    pub fn equilibrium_vector(&self) -> EquilibriumVector {
        let k = self.n_series;
        EquilibriumVector {
            coefficients: (0..k).map(|i| self.beta[(i, 0)]).collect(),
            deterministic: Some(self.beta[(k, 0)]),
        }
    }

    /// Loadings on the error-correction terms, `k x rank`.
    pub fn alpha(&self) -> DMatrix<f64> {
        self.coef.rows(0, self.rank).transpose()
    }

    /// Iterate the difference equation `horizon` steps, integrate to levels, and return
    /// only the final step.
    pub fn forecast(&self, horizon: usize, as_of: NaiveDate) -> Result<Vec<f64>> {
        let k = self.n_series;
        let lvl = level_lag(self.mode, self.k_ar_diff);
        let has_const = self.mode == DeterministicMode::LongRun;
        let mut path = self.tail.clone();

        for _ in 0..horizon.max(1) {
            let p = path.len();
            let t = self.tail_start + p;
            let mut z1 = Vec::with_capacity(k + 1);
            z1.extend_from_slice(&path[p - lvl]);
            z1.push(restricted_term(self.mode, t));
            let ect: Vec<f64> = (0..self.rank)
                .map(|c| (0..=k).map(|i| z1[i] * self.beta[(i, c)]).sum())
                .collect();

            let mut next = path[p - 1].clone();
            for (eq, level) in next.iter_mut().enumerate() {
                let mut dx = 0.0;
                for (c, e) in ect.iter().enumerate() {
                    dx += self.coef[(c, eq)] * e;
                }
                for l in 1..=self.k_ar_diff {
                    for j in 0..k {
                        let lagged = path[p - l][j] - path[p - l - 1][j];
                        dx += self.coef[(self.rank + (l - 1) * k + j, eq)] * lagged;
                    }
                }
                if has_const {
                    dx += self.coef[(self.rank + k * self.k_ar_diff, eq)];
                }
                *level += dx;
            }
            if next.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::singular(as_of, "vecm forecast"));
            }
            path.push(next);
        }
        path.pop()
            .ok_or_else(|| ForecastError::singular(as_of, "vecm forecast"))
    }
}
