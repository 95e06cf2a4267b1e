mod common;

use basket_quant::error::ForecastError;
use basket_quant::model::LogPricePanel;
use basket_quant::preprocess::log_panel_from_rows;
use basket_quant::selector::{
    adf_test, nested_rank, rank_test, select, select_lag, DeterministicMode, RankStatistic,
    CV_10PCT, MAX_CANDIDATE_LAG, MIN_WORKING_LAG,
};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use common::{cointegrated_panel, daily_dates, independent_walks, metal_names};

fn cv(v: f64) -> [f64; 3] {
    [v, v + 2.0, v + 5.0]
}

#[test]
/// The walk stops at the first non-rejection even when a later (less restrictive)
/// hypothesis would be rejected.
fn nested_rank_stops_at_first_non_rejection() {
    // Order: r<=4, r<=3, r<=2, r<=1, r=0.
    let stats = [50.0, 1.0, 40.0, 5.0, 90.0];
    let cvs = [cv(7.5), cv(17.9), cv(32.0), cv(49.7), cv(71.9)];
    assert_eq!(nested_rank(&stats, &cvs), 1);
}

#[test]
fn nested_rank_zero_when_rank_zero_not_rejected() {
    let stats = [50.0, 50.0, 50.0, 50.0, 10.0];
    let cvs = [cv(7.5), cv(17.9), cv(32.0), cv(49.7), cv(71.9)];
    assert_eq!(nested_rank(&stats, &cvs), 0);
}

#[test]
fn nested_rank_caps_at_k_minus_one() {
    let stats = [100.0; 5];
    let cvs = [cv(7.5), cv(17.9), cv(32.0), cv(49.7), cv(71.9)];
    assert_eq!(nested_rank(&stats, &cvs), 4);
}

#[test]
/// A declared rank r means "rank <= r-1" was rejected and "rank <= r" was not.
fn rank_decision_is_monotone() {
    for seed in [3_u64, 11, 29] {
        let panel = cointegrated_panel(seed, 200, 5);
        let window = panel.window_ending_at(199, 4).expect("window");
        let test = rank_test(&window, DeterministicMode::ShortWindow, RankStatistic::Trace, 1)
            .expect("rank test");
        let r = test.nrel;
        let k = test.n_series();
        assert!(r < k);
        if r >= 1 {
            assert!(test.statistic_for(r - 1) > test.critical_10pct_for(r - 1));
        }
        if r < k - 1 {
            assert!(test.statistic_for(r) <= test.critical_10pct_for(r));
        }
        assert_eq!(
            test.critical_values[k - 1][CV_10PCT],
            test.critical_10pct_for(0)
        );
    }
}

#[test]
/// Shared random-walk factor plus noise must show at least one relationship on the
/// full-history long-run test in more than 90% of draws.
fn full_history_detects_cointegration() {
    let draws = 20;
    let mut detected = 0;
    for seed in 0..draws {
        let panel = cointegrated_panel(1_000 + seed, 200, 5);
        let window = panel.full_window();
        let selection = select(
            &window,
            DeterministicMode::LongRun,
            RankStatistic::Trace,
            MAX_CANDIDATE_LAG,
        )
        .expect("selection");
        if selection.nrel() >= 1 {
            detected += 1;
        }
    }
    assert!(detected as f64 / draws as f64 > 0.9, "detected {detected}/{draws}");
}

#[test]
fn eigenvalues_lie_in_unit_interval_and_descend() {
    let panel = independent_walks(7, 300, 3, 0.01);
    let test = rank_test(
        &panel.full_window(),
        DeterministicMode::ShortWindow,
        RankStatistic::Trace,
        1,
    )
    .expect("rank test");
    assert!(test.eigenvalues.iter().all(|l| (0.0..1.0).contains(l)));
    assert!(test.eigenvalues.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn eigenvectors_are_normalized_on_first_metal() {
    let panel = cointegrated_panel(5, 200, 4);
    let test = rank_test(
        &panel.full_window(),
        DeterministicMode::LongRun,
        RankStatistic::MaxEigen,
        2,
    )
    .expect("rank test");
    for v in &test.vectors {
        assert_eq!(v.len(), 5);
        assert!((v[0] - 1.0).abs() < 1e-12);
    }
    let first = test.first_vector();
    assert_eq!(first.coefficients.len(), 4);
    assert!(first.deterministic.is_some());
}

#[test]
fn lag_selection_floors_working_lag() {
    let panel = cointegrated_panel(17, 200, 3);
    let sel = select_lag(&panel.full_window(), 6).expect("lag selection");
    assert!((1..=6).contains(&sel.aic_lag));
    assert!(sel.working_lag >= MIN_WORKING_LAG);
    assert_eq!(sel.working_lag, sel.aic_lag.max(2));
    assert_eq!(sel.model_lag(), sel.working_lag - 1);
    assert_eq!(sel.criteria.len(), 6);
}

#[test]
fn short_window_is_insufficient_data() {
    let panel = cointegrated_panel(1, 60, 5);
    let err = select_lag(&panel.full_window(), MAX_CANDIDATE_LAG).unwrap_err();
    match err {
        ForecastError::InsufficientWindowData { rows, required, .. } => {
            assert_eq!(rows, 60);
            assert_eq!(required, 15 + 5 * 15 + 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!ForecastError::InsufficientWindowData {
        as_of: NaiveDate::default(),
        rows: 0,
        required: 1
    }
    .is_fatal());
}

#[test]
fn constant_prices_are_singular() {
    let rows = vec![vec![100.0, 200.0, 300.0]; 80];
    let panel: LogPricePanel =
        log_panel_from_rows(metal_names(3), daily_dates(80), rows).expect("panel");
    let err = select_lag(&panel.full_window(), 3).unwrap_err();
    assert!(matches!(err, ForecastError::SingularFit { .. }));
}

#[test]
fn more_than_ten_series_is_unsupported() {
    let k = 11;
    let mut rng = StdRng::seed_from_u64(8);
    let names: Vec<String> = (0..k).map(|i| format!("m{i}")).collect();
    let rows: Vec<Vec<f64>> = (0..120)
        .map(|_| {
            (0..k)
                .map(|_| {
                    let e: f64 = rng.sample(StandardNormal);
                    100.0 * (0.01 * e).exp()
                })
                .collect()
        })
        .collect();
    let panel = log_panel_from_rows(names, daily_dates(120), rows).expect("panel");
    let err = rank_test(
        &panel.full_window(),
        DeterministicMode::ShortWindow,
        RankStatistic::Trace,
        1,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ForecastError::UnsupportedDimension { got: 11, max: 10 }
    ));
}

#[test]
fn adf_rejects_unit_root_for_white_noise() {
    let mut rng = StdRng::seed_from_u64(21);
    let series: Vec<f64> = (0..400)
        .map(|_| {
            let e: f64 = rng.sample(StandardNormal);
            e
        })
        .collect();
    let res = adf_test(&series, 1, NaiveDate::default()).expect("adf");
    assert!(res.rejects_unit_root_5pct());
    assert_eq!(res.nobs, 398);
    // Large-sample 5% value is close to the asymptotic -2.86.
    assert!((res.critical_values[1] + 2.87).abs() < 0.02);
    assert!(res.critical_values[0] < res.critical_values[1]);
    assert!(res.critical_values[1] < res.critical_values[2]);
}

#[test]
fn selection_reports_equilibrium_adf() {
    let panel = cointegrated_panel(42, 200, 5);
    let window = panel.window_ending_at(199, 5).expect("window");
    let selection = select(
        &window,
        DeterministicMode::ShortWindow,
        RankStatistic::Trace,
        4,
    )
    .expect("selection");
    assert_eq!(selection.series_adf.len(), 5);
    assert_eq!(selection.rank.k_ar_diff, selection.k_ar_diff());
    assert!(selection.equilibrium_adf.statistic.is_finite());
}
