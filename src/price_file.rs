use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{ForecastError, Result};
use crate::model::PricePanel;

/// Layout of a price CSV: one date column plus one column per metal, in the order the
/// panel should use.
#[derive(Debug, Clone)]
pub struct PriceFileLayout {
    pub date_column: String,
    pub date_format: String,
    pub metals: Vec<String>,
}

pub fn load_price_file(path: &Path, layout: &PriceFileLayout) -> Result<PricePanel> {
    let file = std::fs::File::open(path)?;
    let panel = read_prices(file, layout)?;
    tracing::info!(
        path = %path.display(),
        rows = panel.len(),
        metals = panel.metals().len(),
        "Price file loaded"
    );
    Ok(panel)
}

/// Parse prices from any reader. Dates must already be strictly increasing; duplicate
/// dates, blank or non-numeric cells, and non-positive prices are rejected.
pub fn read_prices<R: Read>(reader: R, layout: &PriceFileLayout) -> Result<PricePanel> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| ForecastError::Config(format!("price file has no column '{}'", name)))
    };
    let date_col = column(&layout.date_column)?;
    let metal_cols = layout
        .metals
        .iter()
        .map(|m| column(m))
        .collect::<Result<Vec<_>>>()?;

    let mut records: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let raw_date = record.get(date_col).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, &layout.date_format).map_err(|e| {
            ForecastError::InvalidPriceData {
                metal: layout.date_column.clone(),
                date: raw_date.to_string(),
                reason: format!("unparseable date: {}", e),
            }
        })?;
        let mut row = Vec::with_capacity(metal_cols.len());
        for (metal, &col) in layout.metals.iter().zip(&metal_cols) {
            let cell = record.get(col).unwrap_or_default();
            let price: f64 = cell.parse().map_err(|_| ForecastError::InvalidPriceData {
                metal: metal.clone(),
                date: date.to_string(),
                reason: format!("missing or non-numeric price '{}'", cell),
            })?;
            row.push(price);
        }
        records.push((date, row));
    }

    if let Some(w) = records.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(ForecastError::InvalidPriceData {
            metal: "*".to_string(),
            date: w[0].0.to_string(),
            reason: "duplicate date".to_string(),
        });
    }

    let (dates, rows) = records.into_iter().unzip();
    PricePanel::new(layout.metals.clone(), dates, rows)
}
