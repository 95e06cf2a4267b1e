pub mod var;
pub mod vecm;

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{EquilibriumVector, ModelFamily, ModelWindow};
use crate::selector::Selection;

pub use var::VarModel;
pub use vecm::VecmModel;

/// Model fitted for one rebalancing date, chosen by the rank decision.
#[derive(Debug, Clone)]
pub enum ForecastingModel {
    ErrorCorrection(VecmModel),
    Autoregressive(VarModel),
}

impl ForecastingModel {
    /// Error-correction fit when the rank test supports at least one relationship,
    /// otherwise an unrestricted VAR. Both use `working_lag - 1`.
    pub fn fit(window: &ModelWindow<'_>, selection: &Selection) -> Result<Self> {
        let nrel = selection.nrel();
        if nrel == 0 {
            let m = VarModel::fit(window, selection.lag.model_lag())?;
            Ok(Self::Autoregressive(m))
        } else {
            let m = VecmModel::fit(window, &selection.rank, nrel)?;
            Ok(Self::ErrorCorrection(m))
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            Self::ErrorCorrection(_) => ModelFamily::ErrorCorrection,
            Self::Autoregressive(_) => ModelFamily::Autoregressive,
        }
    }

    pub fn lag(&self) -> usize {
        match self {
            Self::ErrorCorrection(m) => m.k_ar_diff(),
            Self::Autoregressive(m) => m.lag(),
        }
    }

    pub fn forecast(&self, horizon: usize, as_of: NaiveDate) -> Result<Vec<f64>> {
        match self {
            Self::ErrorCorrection(m) => m.forecast(horizon, as_of),
            Self::Autoregressive(m) => m.forecast(horizon, as_of),
        }
    }

    /// Fresh equilibrium vector; `None` for the autoregressive fallback.
    pub fn equilibrium_vector(&self) -> Option<EquilibriumVector> {
        match self {
            Self::ErrorCorrection(m) => Some(m.equilibrium_vector()),
            Self::Autoregressive(_) => None,
        }
    }
}
