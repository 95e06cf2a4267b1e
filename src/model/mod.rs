pub mod forecast;
pub mod panel;

pub use forecast::{AlignedRow, EquilibriumRow, EquilibriumVector, ForecastRow, ModelFamily};
pub use panel::{LogPricePanel, ModelWindow, PricePanel, DAYS_PER_MONTH};
