use chrono::NaiveDate;
use serde::Serialize;

/// Which model family produced a date's forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    ErrorCorrection,
    Autoregressive,
}

impl ModelFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ErrorCorrection => "vecm",
            Self::Autoregressive => "var",
        }
    }
}

/// Cointegrating coefficients, first metal normalized to 1. `deterministic` holds the
/// restricted constant (or trend) coefficient when the fit carried one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquilibriumVector {
    pub coefficients: Vec<f64>,
    pub deterministic: Option<f64>,
}

impl EquilibriumVector {
    /// Linear combination `coefficients . x` (the deterministic term is left out).
    pub fn combine(&self, x: &[f64]) -> f64 {
        self.coefficients.iter().zip(x).map(|(b, v)| b * v).sum()
    }
}

/// Equilibrium vector exported for one rebalancing date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquilibriumRow {
    pub date: NaiveDate,
    pub vector: EquilibriumVector,
    /// `false` when the date fell back to the autoregressive model and the vector was
    /// carried forward from an earlier fit.
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    /// Log-price forecast `horizon` trading days ahead, one per metal.
    pub forecast: Vec<f64>,
    /// Sample standard deviation of log-prices over the fit window, one per metal.
    pub volatility: Vec<f64>,
    pub family: ModelFamily,
    pub nrel: usize,
    pub lag: usize,
}

/// A [`ForecastRow`] joined to the realized log price `horizon` trading days later.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    pub date: NaiveDate,
    pub realized_date: Option<NaiveDate>,
    pub current: Vec<f64>,
    pub forecast: Vec<f64>,
    pub realized: Option<Vec<f64>>,
    pub volatility: Vec<f64>,
    pub family: ModelFamily,
}

impl AlignedRow {
    pub fn expected_change(&self) -> Vec<f64> {
        self.forecast
            .iter()
            .zip(&self.current)
            .map(|(f, c)| f - c)
            .collect()
    }

    /// `None` marks a row whose realized value lies past the end of the panel.
    pub fn actual_change(&self) -> Option<Vec<f64>> {
        self.realized.as_ref().map(|r| {
            r.iter()
                .zip(&self.current)
                .map(|(a, c)| a - c)
                .collect()
        })
    }

    /// Expected change divided by window volatility; `None` per metal when the
    /// volatility is zero or not finite.
    pub fn normalized_expected_change(&self) -> Vec<Option<f64>> {
        self.expected_change()
            .iter()
            .zip(&self.volatility)
            .map(|(e, v)| {
                if *v > f64::EPSILON && v.is_finite() {
                    let z = e / v;
                    z.is_finite().then_some(z)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn is_misaligned(&self) -> bool {
        self.realized.is_none()
    }
}
