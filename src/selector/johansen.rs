use chrono::NaiveDate;
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::linalg::{cholesky_lower, residualize, spd_inverse};
use crate::model::{EquilibriumVector, ModelWindow};

/// Deterministic-term specification of the rank test. Fixed by the call site, never by
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeterministicMode {
    /// Single full-history invocation: trend restricted to the cointegration space,
    /// unrestricted constant, level term `x_{t-K}`.
    LongRun,
    /// Every bounded window: constant restricted to the cointegration space, level term
    /// `x_{t-1}`.
    ShortWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankStatistic {
    #[default]
    Trace,
    MaxEigen,
}

/// Index of the 90% column in a critical-value triple.
pub const CV_10PCT: usize = 0;

// Osterwald-Lenum (1992) 90/95/99% critical values, indexed by free dimensions (k - r).
const TRACE_CONST: [[f64; 3]; 10] = [
    [7.52, 9.24, 12.97],
    [17.85, 19.96, 24.60],
    [32.00, 34.91, 41.07],
    [49.65, 53.12, 60.16],
    [71.86, 76.07, 84.45],
    [97.18, 102.14, 111.01],
    [126.58, 131.70, 143.09],
    [159.48, 165.58, 177.20],
    [196.37, 202.92, 215.74],
    [236.54, 244.15, 257.68],
];
const EIGEN_CONST: [[f64; 3]; 10] = [
    [7.52, 9.24, 12.97],
    [13.75, 15.67, 20.20],
    [19.77, 22.00, 26.81],
    [25.56, 28.14, 33.24],
    [31.66, 34.40, 39.79],
    [37.45, 40.30, 46.82],
    [43.25, 46.45, 51.91],
    [48.91, 52.00, 57.95],
    [54.35, 57.42, 62.80],
    [60.25, 63.57, 69.09],
];
const TRACE_TREND: [[f64; 3]; 10] = [
    [10.49, 12.25, 16.26],
    [22.76, 25.32, 30.45],
    [39.06, 42.44, 48.45],
    [59.14, 62.99, 70.05],
    [83.20, 87.31, 96.58],
    [110.42, 114.90, 124.75],
    [141.01, 146.76, 158.49],
    [176.67, 182.82, 196.08],
    [215.17, 222.21, 234.41],
    [256.72, 263.42, 279.07],
];
const EIGEN_TREND: [[f64; 3]; 10] = [
    [10.49, 12.25, 16.26],
    [16.85, 18.96, 23.65],
    [23.11, 25.54, 30.34],
    [29.12, 31.46, 36.65],
    [34.75, 37.52, 42.36],
    [40.91, 43.97, 49.51],
    [46.32, 49.42, 54.71],
    [52.16, 55.50, 62.46],
    [57.87, 61.29, 67.88],
    [63.18, 66.23, 73.73],
];

pub const MAX_RANK_DIMENSION: usize = TRACE_CONST.len();

fn critical_table(mode: DeterministicMode, stat: RankStatistic) -> &'static [[f64; 3]; 10] {
    match (mode, stat) {
        (DeterministicMode::ShortWindow, RankStatistic::Trace) => &TRACE_CONST,
        (DeterministicMode::ShortWindow, RankStatistic::MaxEigen) => &EIGEN_CONST,
        (DeterministicMode::LongRun, RankStatistic::Trace) => &TRACE_TREND,
        (DeterministicMode::LongRun, RankStatistic::MaxEigen) => &EIGEN_TREND,
    }
}

/// Regression blocks of the error-correction form over the effective sample
/// `t = k_ar_diff + 1 .. n`.
#[derive(Debug, Clone)]
pub(crate) struct EcmDesign {
    /// `dx_t`, `T x k`.
    pub z0: DMatrix<f64>,
    /// Level term stacked with its restricted deterministic column, `T x (k + 1)`.
    pub z1: DMatrix<f64>,
    /// Lagged differences (plus an unrestricted constant in long-run mode).
    pub zk: DMatrix<f64>,
}

/// Row index (within the window) of the level term entering the equation at time `t`.
pub(crate) fn level_lag(mode: DeterministicMode, k_ar_diff: usize) -> usize {
    match mode {
        DeterministicMode::ShortWindow => 1,
        DeterministicMode::LongRun => k_ar_diff + 1,
    }
}

/// Restricted deterministic regressor at time `t`.
pub(crate) fn restricted_term(mode: DeterministicMode, t: usize) -> f64 {
    match mode {
        DeterministicMode::ShortWindow => 1.0,
        DeterministicMode::LongRun => t as f64,
    }
}

pub(crate) fn ecm_design(rows: &[Vec<f64>], mode: DeterministicMode, k_ar_diff: usize) -> EcmDesign {
    let k = rows[0].len();
    let n = rows.len();
    let start = k_ar_diff + 1;
    let nobs = n - start;
    let lvl = level_lag(mode, k_ar_diff);
    let diff = |t: usize, j: usize| rows[t][j] - rows[t - 1][j];

    let z0 = DMatrix::from_fn(nobs, k, |i, j| diff(start + i, j));
    let z1 = DMatrix::from_fn(nobs, k + 1, |i, j| {
        let t = start + i;
        if j < k {
            rows[t - lvl][j]
        } else {
            restricted_term(mode, t)
        }
    });
    let unrestricted_const = usize::from(mode == DeterministicMode::LongRun);
    let zk = DMatrix::from_fn(nobs, k * k_ar_diff + unrestricted_const, |i, j| {
        let t = start + i;
        if j < k * k_ar_diff {
            let l = j / k + 1;
            diff(t - l, j % k)
        } else {
            1.0
        }
    });
    EcmDesign { z0, z1, zk }
}

/// Eigen solution of the reduced-rank regression, eigenvalues descending.
#[derive(Debug, Clone)]
pub(crate) struct JohansenEigen {
    pub nobs: usize,
    pub eigenvalues: Vec<f64>,
    /// Columns are eigenvectors of length `k + 1`, in eigenvalue order.
    pub vectors: DMatrix<f64>,
}

pub(crate) fn johansen_eigen(
    rows: &[Vec<f64>],
    mode: DeterministicMode,
    k_ar_diff: usize,
    as_of: NaiveDate,
) -> Result<JohansenEigen> {
    let k = rows.first().map(|r| r.len()).unwrap_or(0);
    let required = k_ar_diff + 2 + k * k_ar_diff + k + 1;
    if k_ar_diff == 0 || rows.len() < required {
        return Err(ForecastError::InsufficientWindowData {
            as_of,
            rows: rows.len(),
            required,
        });
    }
    let singular = || ForecastError::singular(as_of, "rank test");

    let d = ecm_design(rows, mode, k_ar_diff);
    let r0 = residualize(&d.z0, &d.zk).ok_or_else(singular)?;
    let r1 = residualize(&d.z1, &d.zk).ok_or_else(singular)?;
    let t = r0.nrows() as f64;
    let s00 = r0.transpose() * &r0 / t;
    let s11 = r1.transpose() * &r1 / t;
    let s01 = r0.transpose() * &r1 / t;
    let s10 = s01.transpose();

    let s00_inv = spd_inverse(&s00).ok_or_else(singular)?;
    let l = cholesky_lower(&s11).ok_or_else(singular)?;
    let dim = l.nrows();
    let l_inv = l
        .solve_lower_triangular(&DMatrix::identity(dim, dim))
        .ok_or_else(singular)?;
    let a = &l_inv * &s10 * &s00_inv * &s01 * l_inv.transpose();
    let a = (&a + a.transpose()) * 0.5;
    let eig = SymmetricEigen::new(a);

    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|&i, &j| {
        eig.eigenvalues[j]
            .partial_cmp(&eig.eigenvalues[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let back = l_inv.transpose();
    let mut vectors = DMatrix::zeros(dim, k);
    let mut eigenvalues = Vec::with_capacity(k);
    for (c, &idx) in order.iter().take(k).enumerate() {
        let lambda = eig.eigenvalues[idx];
        if !lambda.is_finite() || lambda >= 1.0 {
            return Err(singular());
        }
        eigenvalues.push(lambda.max(0.0));
        let v = &back * eig.eigenvectors.column(idx);
        vectors.set_column(c, &v);
    }
    Ok(JohansenEigen {
        nobs: r0.nrows(),
        eigenvalues,
        vectors,
    })
}

/// Outcome of the cointegration rank test on one window.
#[derive(Debug, Clone, Serialize)]
pub struct RankTest {
    pub mode: DeterministicMode,
    pub statistic: RankStatistic,
    pub k_ar_diff: usize,
    pub nobs: usize,
    pub eigenvalues: Vec<f64>,
    /// Conventional order: index 0 is "r <= k-1", the last index is "r = 0".
    pub test_statistics: Vec<f64>,
    /// 90/95/99% critical values aligned with `test_statistics`.
    pub critical_values: Vec<[f64; 3]>,
    /// Count of supported long-run relationships in `0..k`.
    pub nrel: usize,
    /// Eigenvectors with the first metal normalized to 1; last entry is the deterministic term.
    pub vectors: Vec<Vec<f64>>,
    #[serde(skip)]
    pub(crate) raw_vectors: DMatrix<f64>,
}

impl RankTest {
    pub fn n_series(&self) -> usize {
        self.eigenvalues.len()
    }

    fn slot(&self, rank: usize) -> usize {
        self.n_series() - 1 - rank
    }

    /// Statistic for the null hypothesis "rank <= `rank`".
    pub fn statistic_for(&self, rank: usize) -> f64 {
        self.test_statistics[self.slot(rank)]
    }

    pub fn critical_10pct_for(&self, rank: usize) -> f64 {
        self.critical_values[self.slot(rank)][CV_10PCT]
    }

    /// First eigenvector split into metal coefficients and deterministic term.
    pub fn first_vector(&self) -> EquilibriumVector {
        let v = &self.vectors[0];
        let k = self.n_series();
        EquilibriumVector {
            coefficients: v[..k].to_vec(),
            deterministic: v.get(k).copied(),
        }
    }
}

/// Walk the ordered statistics from "r = 0" upward, counting rejected nulls and stopping
/// at the first non-rejection or at `k - 1`.
pub fn nested_rank(test_statistics: &[f64], critical_values: &[[f64; 3]]) -> usize {
    let k = test_statistics.len();
    let mut nrel = 0;
    while nrel + 1 < k {
        let slot = k - 1 - nrel;
        if test_statistics[slot] > critical_values[slot][CV_10PCT] {
            nrel += 1;
        } else {
            break;
        }
    }
    nrel
}

fn normalize_first(v: &[f64]) -> Option<Vec<f64>> {
    let head = *v.first()?;
    if head.abs() < 1e-12 {
        return None;
    }
    Some(v.iter().map(|x| x / head).collect())
}

pub fn rank_test(
    window: &ModelWindow<'_>,
    mode: DeterministicMode,
    statistic: RankStatistic,
    k_ar_diff: usize,
) -> Result<RankTest> {
    let k = window.n_series();
    if k > MAX_RANK_DIMENSION {
        return Err(ForecastError::UnsupportedDimension {
            got: k,
            max: MAX_RANK_DIMENSION,
        });
    }
    let eig = johansen_eigen(window.rows(), mode, k_ar_diff, window.as_of)?;
    let t = eig.nobs as f64;
    let log_terms: Vec<f64> = eig.eigenvalues.iter().map(|l| (1.0 - l).ln()).collect();

    let table = critical_table(mode, statistic);
    let mut test_statistics = Vec::with_capacity(k);
    let mut critical_values = Vec::with_capacity(k);
    for slot in 0..k {
        let rank = k - 1 - slot;
        let stat = match statistic {
            RankStatistic::Trace => -t * log_terms[rank..].iter().sum::<f64>(),
            RankStatistic::MaxEigen => -t * log_terms[rank],
        };
        test_statistics.push(stat);
        critical_values.push(table[k - rank - 1]);
    }
    let nrel = nested_rank(&test_statistics, &critical_values);

    let mut vectors = Vec::with_capacity(k);
    for c in 0..k {
        let col: Vec<f64> = eig.vectors.column(c).iter().copied().collect();
        let v = normalize_first(&col)
            .ok_or_else(|| ForecastError::singular(window.as_of, "eigenvector normalization"))?;
        vectors.push(v);
    }

    tracing::debug!(
        as_of = %window.as_of,
        mode = ?mode,
        k_ar_diff,
        nrel,
        stats = ?test_statistics,
        "Rank test"
    );
    Ok(RankTest {
        mode,
        statistic,
        k_ar_diff,
        nobs: eig.nobs,
        eigenvalues: eig.eigenvalues,
        test_statistics,
        critical_values,
        nrel,
        vectors,
        raw_vectors: eig.vectors,
    })
}
