use std::io::Write;

use basket_quant::error::ForecastError;
use basket_quant::price_file::{load_price_file, read_prices, PriceFileLayout};
use chrono::NaiveDate;

fn layout(metals: &[&str]) -> PriceFileLayout {
    PriceFileLayout {
        date_column: "date".to_string(),
        date_format: "%Y-%m-%d".to_string(),
        metals: metals.iter().map(|m| m.to_string()).collect(),
    }
}

#[test]
/// Columns are picked by name in configured order; extra columns are ignored.
fn loads_configured_columns_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "Date,copper,lithium,ignored\n2021-01-04, 7900.5 ,12000,x\n2021-01-05,7950,12100.25,y"
    )
    .expect("write");

    let panel = load_price_file(file.path(), &layout(&["lithium", "copper"])).expect("load");
    assert_eq!(panel.metals(), ["lithium".to_string(), "copper".to_string()]);
    assert_eq!(
        panel.dates(),
        [
            NaiveDate::from_ymd_opt(2021, 1, 4).expect("date"),
            NaiveDate::from_ymd_opt(2021, 1, 5).expect("date"),
        ]
    );
    assert_eq!(panel.rows()[0], vec![12000.0, 7900.5]);
    assert_eq!(panel.rows()[1], vec![12100.25, 7950.0]);
}

#[test]
fn custom_date_format() {
    let csv = "day,a,b\n04/01/2021,1,2\n05/01/2021,1.5,2.5\n";
    let mut l = layout(&["a", "b"]);
    l.date_column = "day".to_string();
    l.date_format = "%d/%m/%Y".to_string();
    let panel = read_prices(csv.as_bytes(), &l).expect("parse");
    assert_eq!(
        panel.dates()[1],
        NaiveDate::from_ymd_opt(2021, 1, 5).expect("date")
    );
}

#[test]
fn missing_metal_column_is_config_error() {
    let csv = "date,a\n2021-01-04,1\n";
    let err = read_prices(csv.as_bytes(), &layout(&["a", "b"])).unwrap_err();
    assert!(matches!(err, ForecastError::Config(_)));
}

#[test]
fn blank_or_non_positive_price_is_invalid() {
    let blank = "date,a,b\n2021-01-04,1,\n";
    let err = read_prices(blank.as_bytes(), &layout(&["a", "b"])).unwrap_err();
    match err {
        ForecastError::InvalidPriceData { metal, .. } => assert_eq!(metal, "b"),
        other => panic!("unexpected error {other:?}"),
    }

    let negative = "date,a,b\n2021-01-04,1,2\n2021-01-05,-1,2\n";
    let err = read_prices(negative.as_bytes(), &layout(&["a", "b"])).unwrap_err();
    assert!(matches!(err, ForecastError::InvalidPriceData { .. }));
    assert!(err.is_fatal());
}

#[test]
fn duplicate_or_unsorted_dates_are_rejected() {
    let dup = "date,a,b\n2021-01-04,1,2\n2021-01-04,1,2\n";
    assert!(read_prices(dup.as_bytes(), &layout(&["a", "b"])).is_err());
    let unsorted = "date,a,b\n2021-01-05,1,2\n2021-01-04,1,2\n";
    assert!(read_prices(unsorted.as_bytes(), &layout(&["a", "b"])).is_err());
}

#[test]
fn bad_date_is_invalid_price_data() {
    let csv = "date,a,b\n2021-13-04,1,2\n";
    let err = read_prices(csv.as_bytes(), &layout(&["a", "b"])).unwrap_err();
    assert!(matches!(err, ForecastError::InvalidPriceData { .. }));
}
