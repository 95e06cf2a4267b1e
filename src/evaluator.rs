use serde::Serialize;
use statrs::distribution::{Binomial, DiscreteCDF};

use crate::model::AlignedRow;

/// Running error and direction tallies for one metal.
#[derive(Debug, Clone, Default)]
struct MetalAccumulator {
    /// (actual change, expected change) over rows with a defined actual change.
    pairs: Vec<(f64, f64)>,
    /// Expected changes on rows where the realized change was exactly zero.
    zero_change_expected: Vec<f64>,
}

impl MetalAccumulator {
    fn observe(&mut self, actual: f64, expected: f64) {
        if !actual.is_finite() || !expected.is_finite() {
            return;
        }
        self.pairs.push((actual, expected));
        if actual == 0.0 {
            self.zero_change_expected.push(expected);
        }
    }

    fn rmse(&self) -> Option<f64> {
        let n = self.pairs.len();
        if n == 0 {
            return None;
        }
        let sse = self
            .pairs
            .iter()
            .map(|(y, yhat)| (y - yhat) * (y - yhat))
            .sum::<f64>();
        Some((sse / n as f64).sqrt())
    }

    fn naive_rmse(&self) -> Option<f64> {
        let n = self.pairs.len();
        if n == 0 {
            return None;
        }
        let ss = self.pairs.iter().map(|(y, _)| y * y).sum::<f64>();
        Some((ss / n as f64).sqrt())
    }

    /// (hits, total) over rows with a nonzero realized change.
    fn direction(&self) -> (u64, u64) {
        let mut hits = 0;
        let mut total = 0;
        for (y, yhat) in &self.pairs {
            if *y == 0.0 {
                continue;
            }
            total += 1;
            if y.signum() == yhat.signum() && *yhat != 0.0 {
                hits += 1;
            }
        }
        (hits, total)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetalMetrics {
    pub metal: String,
    /// Rows with a defined actual change.
    pub samples: usize,
    pub rmse: Option<f64>,
    /// RMSE of the "no change" forecast on the same rows.
    pub naive_rmse: Option<f64>,
    pub direction_hits: u64,
    /// Rows with a nonzero realized change.
    pub direction_total: u64,
    pub directional_accuracy: Option<f64>,
    pub zero_change_expected: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastMetrics {
    pub per_metal: Vec<MetalMetrics>,
    pub pooled_hits: u64,
    pub pooled_total: u64,
    /// One-sided `P(X >= hits)` under a fair-coin binomial null.
    pub binomial_p_value: Option<f64>,
    /// Rows kept in the stream whose realized value was unavailable.
    pub misaligned_rows: usize,
}

impl ForecastMetrics {
    pub fn pooled_accuracy(&self) -> Option<f64> {
        (self.pooled_total > 0).then(|| self.pooled_hits as f64 / self.pooled_total as f64)
    }
}

/// `P(X >= hits)` for `X ~ Binomial(total, 0.5)`.
pub fn binomial_p_value(hits: u64, total: u64) -> Option<f64> {
    if total == 0 || hits > total {
        return None;
    }
    if hits == 0 {
        return Some(1.0);
    }
    let dist = Binomial::new(0.5, total).ok()?;
    Some(dist.sf(hits - 1).clamp(0.0, 1.0))
}

pub fn evaluate(metals: &[String], rows: &[AlignedRow]) -> ForecastMetrics {
    let mut acc = vec![MetalAccumulator::default(); metals.len()];
    let mut misaligned_rows = 0;
    for row in rows {
        let Some(actual) = row.actual_change() else {
            misaligned_rows += 1;
            continue;
        };
        let expected = row.expected_change();
        for (j, a) in acc.iter_mut().enumerate() {
            if let (Some(y), Some(yhat)) = (actual.get(j), expected.get(j)) {
                a.observe(*y, *yhat);
            }
        }
    }

    let mut pooled_hits = 0;
    let mut pooled_total = 0;
    let per_metal = metals
        .iter()
        .zip(&acc)
        .map(|(metal, a)| {
            let (hits, total) = a.direction();
            pooled_hits += hits;
            pooled_total += total;
            MetalMetrics {
                metal: metal.clone(),
                samples: a.pairs.len(),
                rmse: a.rmse(),
                naive_rmse: a.naive_rmse(),
                direction_hits: hits,
                direction_total: total,
                directional_accuracy: (total > 0).then(|| hits as f64 / total as f64),
                zero_change_expected: a.zero_change_expected.clone(),
            }
        })
        .collect();

    let metrics = ForecastMetrics {
        per_metal,
        pooled_hits,
        pooled_total,
        binomial_p_value: binomial_p_value(pooled_hits, pooled_total),
        misaligned_rows,
    };
    tracing::info!(
        hits = metrics.pooled_hits,
        total = metrics.pooled_total,
        p_value = ?metrics.binomial_p_value,
        misaligned = metrics.misaligned_rows,
        "Forecast evaluation"
    );
    metrics
}
