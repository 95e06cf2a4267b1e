use chrono::{Duration, NaiveDate};

use crate::error::{ForecastError, Result};

/// Calendar days per configured month. Flat 30-day months, kept for compatibility with
/// historical runs rather than true calendar arithmetic.
pub const DAYS_PER_MONTH: i64 = 30;

/// Daily price panel: one row per trading day, dates strictly increasing, one column per
/// metal in a fixed order. Read-only once built.
#[derive(Debug, Clone)]
pub struct PricePanel {
    metals: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl PricePanel {
    pub fn new(metals: Vec<String>, dates: Vec<NaiveDate>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if metals.len() < 2 {
            return Err(ForecastError::Config(format!(
                "price panel needs at least 2 metals, got {}",
                metals.len()
            )));
        }
        if dates.is_empty() {
            return Err(ForecastError::Config("price panel has no rows".to_string()));
        }
        if dates.len() != rows.len() {
            return Err(ForecastError::Config(format!(
                "price panel has {} dates but {} rows",
                dates.len(),
                rows.len()
            )));
        }
        for (i, w) in dates.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(ForecastError::InvalidPriceData {
                    metal: "*".to_string(),
                    date: w[1].to_string(),
                    reason: format!("date not strictly after previous row {}", i),
                });
            }
        }
        for (date, row) in dates.iter().zip(&rows) {
            if row.len() != metals.len() {
                return Err(ForecastError::InvalidPriceData {
                    metal: "*".to_string(),
                    date: date.to_string(),
                    reason: format!("expected {} prices, got {}", metals.len(), row.len()),
                });
            }
            for (metal, price) in metals.iter().zip(row) {
                if !price.is_finite() || *price <= f64::EPSILON {
                    return Err(ForecastError::InvalidPriceData {
                        metal: metal.clone(),
                        date: date.to_string(),
                        reason: format!("price {} is not strictly positive", price),
                    });
                }
            }
        }
        Ok(Self {
            metals,
            dates,
            rows,
        })
    }

    pub fn metals(&self) -> &[String] {
        &self.metals
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn to_log(&self) -> LogPricePanel {
        LogPricePanel {
            metals: self.metals.clone(),
            dates: self.dates.clone(),
            rows: self
                .rows
                .iter()
                .map(|r| r.iter().map(|p| p.ln()).collect())
                .collect(),
        }
    }
}

/// Elementwise natural log of a [`PricePanel`].
#[derive(Debug, Clone)]
pub struct LogPricePanel {
    metals: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl LogPricePanel {
    pub fn metals(&self) -> &[String] {
        &self.metals
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&[f64]> {
        self.rows.get(idx).map(|r| r.as_slice())
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Price-level view of one row, `exp` of the stored logs.
    pub fn prices_at(&self, idx: usize) -> Option<Vec<f64>> {
        self.row(idx).map(|r| r.iter().map(|v| v.exp()).collect())
    }

    /// Whole panel as one window. Used by the single full-history invocation.
    pub fn full_window(&self) -> ModelWindow<'_> {
        let end = self.len().saturating_sub(1);
        ModelWindow {
            as_of: self.dates.get(end).copied().unwrap_or_default(),
            start: 0,
            end,
            panel: self,
        }
    }

    /// Rows dated within `[as_of - 30 * months days, as_of]`. `as_of_idx` must be a row index.
    pub fn window_ending_at(&self, as_of_idx: usize, months: u32) -> Option<ModelWindow<'_>> {
        let as_of = *self.dates.get(as_of_idx)?;
        let window_start = as_of - Duration::days(DAYS_PER_MONTH * i64::from(months));
        let start = self.dates[..=as_of_idx].partition_point(|d| *d < window_start);
        Some(ModelWindow {
            as_of,
            start,
            end: as_of_idx,
            panel: self,
        })
    }
}

/// Contiguous slice of a [`LogPricePanel`] ending at `as_of` (inclusive).
#[derive(Debug, Clone, Copy)]
pub struct ModelWindow<'a> {
    pub as_of: NaiveDate,
    start: usize,
    end: usize,
    panel: &'a LogPricePanel,
}

impl<'a> ModelWindow<'a> {
    pub fn rows(&self) -> &'a [Vec<f64>] {
        &self.panel.rows[self.start..=self.end]
    }

    pub fn dates(&self) -> &'a [NaiveDate] {
        &self.panel.dates[self.start..=self.end]
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.panel.is_empty()
    }

    pub fn n_series(&self) -> usize {
        self.panel.metals.len()
    }

    pub fn metals(&self) -> &'a [String] {
        &self.panel.metals
    }

    pub fn start_index(&self) -> usize {
        self.start
    }

    pub fn end_index(&self) -> usize {
        self.end
    }

    /// Column-major copy: one `Vec` per metal.
    pub fn columns(&self) -> Vec<Vec<f64>> {
        let rows = self.rows();
        (0..self.n_series())
            .map(|j| rows.iter().map(|r| r[j]).collect())
            .collect()
    }

    pub fn last_row(&self) -> &'a [f64] {
        &self.panel.rows[self.end]
    }
}
