use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{FitErrorPolicy, WalkForwardConfig};
use crate::error::{ForecastError, Result};
use crate::model::{
    AlignedRow, EquilibriumRow, EquilibriumVector, ForecastRow, LogPricePanel, ModelFamily,
};
use crate::predictor::ForecastingModel;
use crate::preprocess::window_volatility;
use crate::selector::{select, DeterministicMode, RankStatistic, Selection};

/// Panel row indices of the rebalancing dates: the first row on or after `run_start`,
/// then every `horizon` rows while the date is not past `run_end`.
pub fn rebalance_indices(panel: &LogPricePanel, cfg: &WalkForwardConfig) -> Vec<usize> {
    let dates = panel.dates();
    let first = match cfg.run_start {
        Some(start) => dates.partition_point(|d| *d < start),
        None => 0,
    };
    let step = cfg.prediction_horizon_days.max(1);
    (first..dates.len())
        .step_by(step)
        .take_while(|&i| cfg.run_end.map_or(true, |end| dates[i] <= end))
        .collect()
}

/// Result of one independent per-date unit of work.
#[derive(Debug, Clone)]
pub struct DateFit {
    /// Panel row index of the rebalancing date.
    pub idx: usize,
    pub date: NaiveDate,
    pub family: ModelFamily,
    pub nrel: usize,
    pub lag: usize,
    pub forecast: Vec<f64>,
    pub volatility: Vec<f64>,
    /// Freshly fitted vector; `None` for the autoregressive fallback.
    pub vector: Option<EquilibriumVector>,
}

/// Window, select, fit, and forecast one rebalancing date. Touches no shared state.
pub fn fit_date(panel: &LogPricePanel, idx: usize, cfg: &WalkForwardConfig) -> Result<DateFit> {
    let window = panel
        .window_ending_at(idx, cfg.window_length_months)
        .ok_or_else(|| ForecastError::Config(format!("rebalance index {} outside panel", idx)))?;
    let as_of = window.as_of;
    let selection = select(
        &window,
        DeterministicMode::ShortWindow,
        cfg.rank_statistic,
        cfg.max_lag,
    )?;
    let model = ForecastingModel::fit(&window, &selection)?;
    let forecast = model.forecast(cfg.prediction_horizon_days, as_of)?;
    tracing::debug!(
        date = %as_of,
        rows = window.len(),
        family = model.family().as_str(),
        nrel = selection.nrel(),
        lag = model.lag(),
        "Fitted rebalancing date"
    );
    Ok(DateFit {
        idx,
        date: as_of,
        family: model.family(),
        nrel: selection.nrel(),
        lag: model.lag(),
        forecast,
        volatility: window_volatility(&window),
        vector: model.equilibrium_vector(),
    })
}

/// A rebalancing date whose fit failed under the skip policy. It still enters the
/// portfolio as a zero-trade date at its panel prices.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub kind: &'static str,
    pub message: String,
    /// Log prices on the date.
    pub current: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct WalkForwardOutcome {
    pub forecasts: Vec<ForecastRow>,
    /// One row per fitted date once the first error-correction fit exists; fallback
    /// dates carry the previous vector forward.
    pub equilibrium: Vec<EquilibriumRow>,
    pub aligned: Vec<AlignedRow>,
    pub skipped: Vec<SkippedDate>,
    /// Dates that produced a forecast.
    pub total_rebalances: usize,
    pub fallback_count: usize,
}

impl WalkForwardOutcome {
    pub fn fallback_fraction(&self) -> Option<f64> {
        if self.total_rebalances == 0 {
            return None;
        }
        Some(self.fallback_count as f64 / self.total_rebalances as f64)
    }

    pub fn misaligned_count(&self) -> usize {
        self.aligned.iter().filter(|r| r.is_misaligned()).count()
    }
}

/// Folds per-date results in date order. Owns the only mutable state of a run: the
/// last fitted equilibrium vector and the counters.
#[derive(Debug, Default)]
struct Merge {
    out: WalkForwardOutcome,
    last_vector: Option<EquilibriumVector>,
}

impl Merge {
    fn push(&mut self, panel: &LogPricePanel, horizon: usize, fit: DateFit) {
        self.out.total_rebalances += 1;
        if fit.family == ModelFamily::Autoregressive {
            self.out.fallback_count += 1;
        }

        let fresh = fit.vector.is_some();
        if let Some(v) = fit.vector {
            self.last_vector = Some(v);
        }
        if let Some(v) = &self.last_vector {
            self.out.equilibrium.push(EquilibriumRow {
                date: fit.date,
                vector: v.clone(),
                fresh,
            });
        }

        let current = panel.row(fit.idx).map(|r| r.to_vec()).unwrap_or_default();
        let realized_idx = fit.idx + horizon;
        let realized = panel.row(realized_idx).map(|r| r.to_vec());
        let realized_date = panel.dates().get(realized_idx).copied();
        if realized.is_none() {
            let e = ForecastError::MisalignedDates {
                as_of: fit.date,
                horizon,
            };
            tracing::debug!(date = %fit.date, error = %e, "Realized value unavailable");
        }
        self.out.aligned.push(AlignedRow {
            date: fit.date,
            realized_date,
            current,
            forecast: fit.forecast.clone(),
            realized,
            volatility: fit.volatility.clone(),
            family: fit.family,
        });
        self.out.forecasts.push(ForecastRow {
            date: fit.date,
            forecast: fit.forecast,
            volatility: fit.volatility,
            family: fit.family,
            nrel: fit.nrel,
            lag: fit.lag,
        });
    }
}

/// Fit every rebalancing date (in parallel unless disabled), then merge sequentially.
pub fn run_walk_forward(
    panel: &LogPricePanel,
    cfg: &WalkForwardConfig,
) -> Result<WalkForwardOutcome> {
    let indices = rebalance_indices(panel, cfg);
    tracing::info!(
        dates = indices.len(),
        window_months = cfg.window_length_months,
        horizon = cfg.prediction_horizon_days,
        parallel = cfg.parallel,
        "Walk-forward started"
    );

    let results: Vec<(usize, Result<DateFit>)> = if cfg.parallel {
        indices
            .par_iter()
            .map(|&idx| (idx, fit_date(panel, idx, cfg)))
            .collect()
    } else {
        indices
            .iter()
            .map(|&idx| (idx, fit_date(panel, idx, cfg)))
            .collect()
    };

    merge_date_fits(panel, cfg, results)
}

/// Sequential pass over per-date results in date order: carry-forward, counters, the
/// skip/abort policy, and alignment with realized values.
pub fn merge_date_fits(
    panel: &LogPricePanel,
    cfg: &WalkForwardConfig,
    results: Vec<(usize, Result<DateFit>)>,
) -> Result<WalkForwardOutcome> {
    let mut merge = Merge::default();
    for (idx, res) in results {
        match res {
            Ok(fit) => merge.push(panel, cfg.prediction_horizon_days, fit),
            Err(e) => {
                let date = panel.dates().get(idx).copied().unwrap_or_default();
                if e.is_fatal() || cfg.on_fit_error == FitErrorPolicy::Abort {
                    tracing::error!(date = %date, kind = e.kind(), error = %e, "Walk-forward aborted");
                    return Err(e);
                }
                tracing::warn!(date = %date, kind = e.kind(), error = %e, "Rebalancing date skipped");
                merge.out.skipped.push(SkippedDate {
                    date,
                    kind: e.kind(),
                    message: e.to_string(),
                    current: panel.row(idx).map(|r| r.to_vec()).unwrap_or_default(),
                });
            }
        }
    }

    let out = merge.out;
    tracing::info!(
        fitted = out.total_rebalances,
        skipped = out.skipped.len(),
        fallback = out.fallback_count,
        misaligned = out.misaligned_count(),
        "Walk-forward finished"
    );
    Ok(out)
}

/// The single long-run-mode invocation over the whole panel.
#[derive(Debug, Clone, Serialize)]
pub struct FullHistoryDiagnostic {
    pub as_of: NaiveDate,
    pub rows: usize,
    pub aic_lag: usize,
    pub working_lag: usize,
    pub selection: Selection,
    pub family: ModelFamily,
    pub vector: Option<EquilibriumVector>,
}

pub fn full_history_diagnostic(
    panel: &LogPricePanel,
    statistic: RankStatistic,
    max_lag: usize,
) -> Result<FullHistoryDiagnostic> {
    let window = panel.full_window();
    let selection = select(&window, DeterministicMode::LongRun, statistic, max_lag)?;
    let model = ForecastingModel::fit(&window, &selection)?;
    tracing::info!(
        as_of = %window.as_of,
        rows = window.len(),
        nrel = selection.nrel(),
        lag = selection.lag.working_lag,
        "Full-history rank test"
    );
    Ok(FullHistoryDiagnostic {
        as_of: window.as_of,
        rows: window.len(),
        aic_lag: selection.lag.aic_lag,
        working_lag: selection.lag.working_lag,
        family: model.family(),
        vector: model.equilibrium_vector(),
        selection,
    })
}
