use crate::error::{ForecastError, Result};
use crate::model::ModelWindow;
use crate::predictor::var::var_aic;

/// Largest candidate VAR lag considered by AIC selection.
pub const MAX_CANDIDATE_LAG: usize = 15;
/// The rank test needs at least one lagged difference.
pub const MIN_WORKING_LAG: usize = 2;

#[derive(Debug, Clone)]
pub struct LagSelection {
    /// Raw AIC minimizer in `1..=max_lag`.
    pub aic_lag: usize,
    /// `aic_lag` floored at [`MIN_WORKING_LAG`]; feeds the rank test and model fit.
    pub working_lag: usize,
    pub criteria: Vec<(usize, f64)>,
}

impl LagSelection {
    /// Lagged differences handed to the rank test / VECM, and the lag of the VAR fallback.
    pub fn model_lag(&self) -> usize {
        self.working_lag - 1
    }
}

/// Rows needed so every candidate VAR has more observations than regressors.
pub fn required_rows(n_series: usize, max_lag: usize) -> usize {
    max_lag + n_series * max_lag + 2
}

pub fn select_lag(window: &ModelWindow<'_>, max_lag: usize) -> Result<LagSelection> {
    let rows = window.rows();
    let required = required_rows(window.n_series(), max_lag);
    if max_lag == 0 || rows.len() < required {
        return Err(ForecastError::InsufficientWindowData {
            as_of: window.as_of,
            rows: rows.len(),
            required,
        });
    }

    let mut criteria = Vec::with_capacity(max_lag);
    for lag in 1..=max_lag {
        let aic = var_aic(rows, lag, max_lag)
            .ok_or_else(|| ForecastError::singular(window.as_of, "lag selection"))?;
        criteria.push((lag, aic));
    }

    let mut best = criteria[0];
    for c in &criteria[1..] {
        if c.1 < best.1 {
            best = *c;
        }
    }
    let aic_lag = best.0;
    let working_lag = aic_lag.max(MIN_WORKING_LAG);
    tracing::debug!(
        as_of = %window.as_of,
        aic_lag,
        working_lag,
        "Lag selected"
    );
    Ok(LagSelection {
        aic_lag,
        working_lag,
        criteria,
    })
}
