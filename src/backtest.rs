use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::evaluator::{evaluate, ForecastMetrics};
use crate::model::LogPricePanel;
use crate::run_store::RunArtifacts;
use crate::simulator::{
    simulate, steps_from_outcome, summarize, PerformanceSummary, PortfolioSeries,
};
use crate::walk_forward::{
    full_history_diagnostic, run_walk_forward, FullHistoryDiagnostic, WalkForwardOutcome,
};

/// A complete run: diagnostic, walk-forward stream, evaluation, and portfolio.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub run_id: Uuid,
    pub metals: Vec<String>,
    /// `None` when the full-history fit hit a non-fatal numerical problem.
    pub diagnostic: Option<FullHistoryDiagnostic>,
    pub outcome: WalkForwardOutcome,
    pub metrics: ForecastMetrics,
    pub portfolio: PortfolioSeries,
    pub summary: PerformanceSummary,
}

impl BacktestReport {
    pub fn artifacts(&self) -> RunArtifacts<'_> {
        RunArtifacts {
            run_id: self.run_id,
            metals: &self.metals,
            aligned: &self.outcome.aligned,
            metrics: &self.metrics,
            equilibrium: &self.outcome.equilibrium,
            portfolio: &self.portfolio,
            summary: &self.summary,
            skipped: &self.outcome.skipped,
            total_rebalances: self.outcome.total_rebalances,
            fallback_count: self.outcome.fallback_count,
        }
    }
}

pub fn run_backtest(panel: &LogPricePanel, config: &Config) -> Result<BacktestReport> {
    let wf = &config.walk_forward;
    let run_id = Uuid::new_v4();
    tracing::info!(run_id = %run_id, rows = panel.len(), "Backtest started");

    let diagnostic = match full_history_diagnostic(panel, wf.rank_statistic, wf.max_lag) {
        Ok(d) => Some(d),
        Err(e) if !e.is_fatal() => {
            tracing::warn!(kind = e.kind(), error = %e, "Full-history diagnostic unavailable");
            None
        }
        Err(e) => return Err(e),
    };

    let outcome = run_walk_forward(panel, wf)?;
    let metrics = evaluate(panel.metals(), &outcome.aligned);
    let steps = steps_from_outcome(&outcome, &config.trading);
    let portfolio = simulate(&steps);
    let summary = summarize(&portfolio, &config.trading, wf.prediction_horizon_days);

    tracing::info!(
        run_id = %run_id,
        rebalances = outcome.total_rebalances,
        skipped = outcome.skipped.len(),
        fallback_fraction = ?outcome.fallback_fraction(),
        sharpe = ?summary.sharpe,
        "Backtest finished"
    );
    Ok(BacktestReport {
        run_id,
        metals: panel.metals().to_vec(),
        diagnostic,
        outcome,
        metrics,
        portfolio,
        summary,
    })
}
