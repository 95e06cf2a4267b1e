mod common;

use basket_quant::error::ForecastError;
use basket_quant::model::PricePanel;
use basket_quant::preprocess::{log_prices, window_volatility};
use chrono::NaiveDate;

use common::{daily_dates, metal_names};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
}

#[test]
/// Log-transform followed by exponentiation returns the original prices.
fn log_transform_round_trips() {
    let rows = vec![
        vec![12_500.0, 0.75, 1e-6],
        vec![13_010.5, 0.80, 2.5e-6],
        vec![11_999.9, 1.25, 3.0],
        vec![1e9, 1e-4, 42.0],
    ];
    let panel = PricePanel::new(metal_names(3), daily_dates(4), rows.clone()).expect("panel");
    let logs = log_prices(&panel);
    for (i, row) in rows.iter().enumerate() {
        let back = logs.prices_at(i).expect("row exists");
        for (orig, rt) in row.iter().zip(&back) {
            assert!(((rt - orig) / orig).abs() < 1e-12);
        }
    }
}

#[test]
fn non_positive_price_is_invalid_price_data() {
    let rows = vec![vec![1.0, 2.0], vec![1.5, 0.0]];
    let err = PricePanel::new(metal_names(2), daily_dates(2), rows).unwrap_err();
    match err {
        ForecastError::InvalidPriceData { metal, .. } => assert_eq!(metal, "cobalt"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(PricePanel::new(metal_names(2), daily_dates(1), vec![vec![-3.0, 1.0]])
        .unwrap_err()
        .is_fatal());
}

#[test]
fn non_increasing_dates_are_rejected() {
    let dates = vec![d(2021, 1, 4), d(2021, 1, 4)];
    let rows = vec![vec![1.0, 2.0], vec![1.5, 2.5]];
    assert!(matches!(
        PricePanel::new(metal_names(2), dates, rows),
        Err(ForecastError::InvalidPriceData { .. })
    ));
}

#[test]
fn single_metal_panel_is_rejected() {
    let err = PricePanel::new(metal_names(1), daily_dates(2), vec![vec![1.0], vec![2.0]]);
    assert!(matches!(err, Err(ForecastError::Config(_))));
}

#[test]
/// Window start is `as_of - 30 * months` calendar days, inclusive, not calendar months.
fn window_uses_thirty_day_months() {
    let dates = vec![
        d(2021, 1, 1),
        d(2021, 1, 31),
        d(2021, 2, 1),
        d(2021, 2, 28),
        d(2021, 3, 1),
        d(2021, 3, 2),
    ];
    let rows = (0..dates.len()).map(|i| vec![1.0 + i as f64, 2.0]).collect();
    let logs = log_prices(&PricePanel::new(metal_names(2), dates, rows).expect("panel"));

    // 2021-03-02 minus 60 days is 2021-01-01.
    let w = logs.window_ending_at(5, 2).expect("window");
    assert_eq!(w.as_of, d(2021, 3, 2));
    assert_eq!(w.dates().first().copied(), Some(d(2021, 1, 1)));
    assert_eq!(w.len(), 6);

    // 2021-03-01 minus 30 days is 2021-01-30, so Jan 31 is the first row.
    let w = logs.window_ending_at(4, 1).expect("window");
    assert_eq!(w.dates().first().copied(), Some(d(2021, 1, 31)));
    assert_eq!(w.len(), 4);

    assert!(logs.window_ending_at(6, 1).is_none());
}

#[test]
/// Volatility is the sample deviation of log levels within the window.
fn window_volatility_is_sample_std_of_levels() {
    let rows = vec![
        vec![1.0, 10.0],
        vec![std::f64::consts::E, 10.0],
        vec![std::f64::consts::E.powi(2), 10.0],
    ];
    let logs = log_prices(&PricePanel::new(metal_names(2), daily_dates(3), rows).expect("panel"));
    let vol = window_volatility(&logs.full_window());
    assert!((vol[0] - 1.0).abs() < 1e-12);
    assert!(vol[1].abs() < 1e-12);
}

#[test]
fn single_row_window_has_zero_volatility() {
    let logs = log_prices(
        &PricePanel::new(metal_names(2), daily_dates(1), vec![vec![3.0, 4.0]]).expect("panel"),
    );
    assert_eq!(window_volatility(&logs.full_window()), vec![0.0, 0.0]);
}
