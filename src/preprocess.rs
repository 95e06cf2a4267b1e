use statrs::statistics::Statistics;

use crate::error::Result;
use crate::model::{LogPricePanel, ModelWindow, PricePanel};

/// Log transform of a validated panel. Non-positive prices are rejected when the
/// [`PricePanel`] is built, so this step cannot fail once a panel exists.
pub fn log_prices(panel: &PricePanel) -> LogPricePanel {
    panel.to_log()
}

/// Validate raw rows and log-transform them in one pass.
pub fn log_panel_from_rows(
    metals: Vec<String>,
    dates: Vec<chrono::NaiveDate>,
    rows: Vec<Vec<f64>>,
) -> Result<LogPricePanel> {
    let panel = PricePanel::new(metals, dates, rows)?;
    Ok(panel.to_log())
}

/// Per-metal sample standard deviation (n - 1) of log-price levels over the window; 0
/// for a single-row window.
pub fn window_volatility(window: &ModelWindow<'_>) -> Vec<f64> {
    window
        .columns()
        .iter()
        .map(|c| {
            let sd = c.iter().std_dev();
            if sd.is_finite() {
                sd
            } else {
                0.0
            }
        })
        .collect()
}
