#![allow(dead_code)]

use basket_quant::model::{LogPricePanel, PricePanel};
use basket_quant::preprocess::log_panel_from_rows;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

pub const METALS: [&str; 5] = ["lithium", "cobalt", "nickel", "manganese", "copper"];
const LOADINGS: [f64; 5] = [1.0, 0.8, 1.2, 0.9, 1.1];
const BASE_PRICES: [f64; 5] = [12_000.0, 30_000.0, 18_000.0, 1_800.0, 8_500.0];

pub fn metal_names(k: usize) -> Vec<String> {
    METALS[..k].iter().map(|m| m.to_string()).collect()
}

/// Consecutive calendar days starting 2020-01-01.
pub fn daily_dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date");
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
}

/// Log prices `ln(base_j) + loading_j * F_t + e_jt` with `F` a shared random walk and
/// `e` independent noise: cointegrated with one common trend.
pub fn cointegrated_log_rows(
    seed: u64,
    n: usize,
    k: usize,
    factor_sd: f64,
    noise_sd: f64,
) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut factor = 0.0;
    let mut rows = Vec::with_capacity(n);
    for _ in 0..n {
        let step: f64 = rng.sample(StandardNormal);
        factor += factor_sd * step;
        let row = (0..k)
            .map(|j| {
                let e: f64 = rng.sample(StandardNormal);
                BASE_PRICES[j].ln() + LOADINGS[j] * factor + noise_sd * e
            })
            .collect();
        rows.push(row);
    }
    rows
}

pub fn price_panel_from_logs(rows: &[Vec<f64>]) -> PricePanel {
    let k = rows[0].len();
    let prices = rows
        .iter()
        .map(|r| r.iter().map(|v| v.exp()).collect())
        .collect();
    PricePanel::new(metal_names(k), daily_dates(rows.len()), prices).expect("valid panel")
}

pub fn cointegrated_panel(seed: u64, n: usize, k: usize) -> LogPricePanel {
    let rows = cointegrated_log_rows(seed, n, k, 0.005, 0.03);
    let prices = rows
        .iter()
        .map(|r| r.iter().map(|v| v.exp()).collect())
        .collect();
    log_panel_from_rows(metal_names(k), daily_dates(n), prices).expect("valid panel")
}

/// Independent random walks: no long-run relationship.
pub fn independent_walks(seed: u64, n: usize, k: usize, sd: f64) -> LogPricePanel {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut level: Vec<f64> = BASE_PRICES[..k].iter().map(|p| p.ln()).collect();
    let mut prices = Vec::with_capacity(n);
    for _ in 0..n {
        for l in level.iter_mut() {
            let e: f64 = rng.sample(StandardNormal);
            *l += sd * e;
        }
        prices.push(level.iter().map(|v| v.exp()).collect());
    }
    log_panel_from_rows(metal_names(k), daily_dates(n), prices).expect("valid panel")
}
