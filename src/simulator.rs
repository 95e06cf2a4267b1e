use chrono::NaiveDate;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::config::TradingConfig;
use crate::model::AlignedRow;
use crate::walk_forward::WalkForwardOutcome;

/// Dollar trade size for a volatility-normalized expected change `z`:
/// `base_size * sign(z) * ln(1 + |z| / base_change)`.
pub fn trade_size(z: f64, base_size: f64, base_change: f64) -> f64 {
    if z == 0.0 || !z.is_finite() {
        return 0.0;
    }
    base_size * z.signum() * (1.0 + z.abs() / base_change).ln()
}

/// Inputs for one rebalancing date: execution prices and dollar trade sizes. A `None`
/// size is an unavailable signal and trades nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationStep {
    pub date: NaiveDate,
    pub prices: Vec<f64>,
    pub trades: Vec<Option<f64>>,
}

/// Map the aligned stream to steps, trading at the price on each rebalancing date.
pub fn steps_from_aligned(rows: &[AlignedRow], cfg: &TradingConfig) -> Vec<SimulationStep> {
    rows.iter()
        .map(|row| SimulationStep {
            date: row.date,
            prices: row.current.iter().map(|v| v.exp()).collect(),
            trades: row
                .normalized_expected_change()
                .into_iter()
                .map(|z| z.map(|z| trade_size(z, cfg.base_size, cfg.base_change)))
                .collect(),
        })
        .collect()
}

/// Steps for every rebalancing date of a run in date order. Skipped dates trade nothing
/// but keep their place in the series so periods stay evenly spaced.
pub fn steps_from_outcome(outcome: &WalkForwardOutcome, cfg: &TradingConfig) -> Vec<SimulationStep> {
    let mut steps = steps_from_aligned(&outcome.aligned, cfg);
    steps.extend(outcome.skipped.iter().map(|s| SimulationStep {
        date: s.date,
        prices: s.current.iter().map(|v| v.exp()).collect(),
        trades: vec![None; s.current.len()],
    }));
    steps.sort_by_key(|s| s.date);
    steps
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioPoint {
    pub date: NaiveDate,
    pub prices: Vec<f64>,
    /// Dollar size traded per metal on this date (0 where no signal).
    pub trades: Vec<f64>,
    pub units_traded: Vec<f64>,
    pub holdings: Vec<f64>,
    pub cash: f64,
}

impl PortfolioPoint {
    /// `holdings . prices + cash`.
    pub fn value(&self) -> f64 {
        self.holdings
            .iter()
            .zip(&self.prices)
            .map(|(h, p)| h * p)
            .sum::<f64>()
            + self.cash
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PortfolioSeries {
    pub points: Vec<PortfolioPoint>,
}

impl PortfolioSeries {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value()).collect()
    }
}

/// Holdings and cash start flat and accumulate; nothing is ever reset.
pub fn simulate(steps: &[SimulationStep]) -> PortfolioSeries {
    let k = steps.first().map(|s| s.prices.len()).unwrap_or(0);
    let mut holdings = vec![0.0; k];
    let mut cash = 0.0;
    let mut points = Vec::with_capacity(steps.len());

    for step in steps {
        let mut trades = vec![0.0; k];
        let mut units_traded = vec![0.0; k];
        for j in 0..k {
            let price = step.prices.get(j).copied().unwrap_or(0.0);
            let size = step.trades.get(j).copied().flatten().unwrap_or(0.0);
            if size == 0.0 || !size.is_finite() || price <= f64::EPSILON {
                continue;
            }
            let units = size / price;
            trades[j] = size;
            units_traded[j] = units;
            holdings[j] += units;
            cash -= units * price;
        }
        points.push(PortfolioPoint {
            date: step.date,
            prices: step.prices.clone(),
            trades,
            units_traded,
            holdings: holdings.clone(),
            cash,
        });
    }
    PortfolioSeries { points }
}

/// Simple returns from the third observation on; the first transition is dropped since
/// the portfolio starts at or near zero value. Near-zero denominators are skipped.
pub fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .skip(1)
        .filter(|w| w[0].abs() > f64::EPSILON)
        .map(|w| w[1] / w[0] - 1.0)
        .filter(|r| r.is_finite())
        .collect()
}

/// Annual rate compounded down to one rebalancing period of `horizon_days`.
pub fn period_risk_free_rate(annual: f64, horizon_days: usize, days_per_year: f64) -> f64 {
    (1.0 + annual).powf(horizon_days as f64 / days_per_year) - 1.0
}

/// `(mean - rf) / std * sqrt(periods_per_year)`; `None` for fewer than two returns or a
/// flat series.
pub fn sharpe_ratio(returns: &[f64], rf_period: f64, periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let sd = returns.iter().std_dev();
    if sd <= f64::EPSILON || !sd.is_finite() {
        return None;
    }
    Some((returns.iter().mean() - rf_period) / sd * periods_per_year.sqrt())
}

/// Largest peak-to-trough drop of the value series, in value units.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for v in values {
        peak = peak.max(*v);
        worst = worst.max(peak - v);
    }
    worst
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    pub periods: usize,
    pub returns_used: usize,
    pub rf_period: f64,
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
    pub final_value: f64,
}

pub fn summarize(series: &PortfolioSeries, cfg: &TradingConfig, horizon_days: usize) -> PerformanceSummary {
    let values = series.values();
    let returns = period_returns(&values);
    let rf_period = period_risk_free_rate(
        cfg.annual_risk_free_rate,
        horizon_days,
        cfg.trading_days_per_year,
    );
    let periods_per_year = cfg.trading_days_per_year / horizon_days.max(1) as f64;
    let summary = PerformanceSummary {
        periods: values.len(),
        returns_used: returns.len(),
        rf_period,
        sharpe: sharpe_ratio(&returns, rf_period, periods_per_year),
        max_drawdown: max_drawdown(&values),
        final_value: values.last().copied().unwrap_or(0.0),
    };
    tracing::info!(
        periods = summary.periods,
        sharpe = ?summary.sharpe,
        final_value = summary.final_value,
        max_drawdown = summary.max_drawdown,
        "Portfolio simulated"
    );
    summary
}
