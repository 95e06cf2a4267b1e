pub mod adf;
pub mod johansen;
pub mod lag;

use serde::Serialize;

use crate::error::Result;
use crate::model::ModelWindow;

pub use adf::{adf_test, AdfResult};
pub use johansen::{
    nested_rank, rank_test, DeterministicMode, RankStatistic, RankTest, CV_10PCT,
    MAX_RANK_DIMENSION,
};
pub use lag::{required_rows, select_lag, LagSelection, MAX_CANDIDATE_LAG, MIN_WORKING_LAG};

/// Everything decided about one window before a model is fitted.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    #[serde(skip)]
    pub lag: LagSelection,
    pub rank: RankTest,
    /// Advisory per-series unit-root checks; `None` where the regression was degenerate.
    pub series_adf: Vec<Option<AdfResult>>,
    /// ADF on the first eigenvector's linear combination of log-prices.
    pub equilibrium_adf: AdfResult,
}

impl Selection {
    pub fn nrel(&self) -> usize {
        self.rank.nrel
    }

    /// Lagged differences used by the rank test and the error-correction fit.
    pub fn k_ar_diff(&self) -> usize {
        self.lag.model_lag()
    }
}

/// Linear combination `v' [x_t, d_t]` over the window, where `d_t` is the mode's
/// restricted deterministic term.
pub fn equilibrium_series(window: &ModelWindow<'_>, rank: &RankTest) -> Vec<f64> {
    let v = &rank.vectors[0];
    let k = window.n_series();
    window
        .rows()
        .iter()
        .enumerate()
        .map(|(t, row)| {
            let level: f64 = row.iter().zip(&v[..k]).map(|(x, b)| x * b).sum();
            level + v[k] * johansen::restricted_term(rank.mode, t)
        })
        .collect()
}

pub fn select(
    window: &ModelWindow<'_>,
    mode: DeterministicMode,
    statistic: RankStatistic,
    max_lag: usize,
) -> Result<Selection> {
    let lag = select_lag(window, max_lag)?;
    let adf_lag = lag.aic_lag - 1;

    let series_adf = window
        .columns()
        .iter()
        .zip(window.metals())
        .map(|(series, metal)| match adf_test(series, adf_lag, window.as_of) {
            Ok(res) => {
                tracing::debug!(
                    as_of = %window.as_of,
                    metal = %metal,
                    statistic = res.statistic,
                    stationary_5pct = res.rejects_unit_root_5pct(),
                    "Series ADF"
                );
                Some(res)
            }
            Err(e) => {
                tracing::debug!(as_of = %window.as_of, metal = %metal, error = %e, "Series ADF skipped");
                None
            }
        })
        .collect();

    let rank = rank_test(window, mode, statistic, lag.model_lag())?;
    let combo = equilibrium_series(window, &rank);
    let equilibrium_adf = adf_test(&combo, adf_lag, window.as_of)?;
    tracing::debug!(
        as_of = %window.as_of,
        nrel = rank.nrel,
        adf = equilibrium_adf.statistic,
        stationary_5pct = equilibrium_adf.rejects_unit_root_5pct(),
        "Equilibrium combination ADF"
    );

    Ok(Selection {
        lag,
        rank,
        series_adf,
        equilibrium_adf,
    })
}
