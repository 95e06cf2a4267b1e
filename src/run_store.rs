use std::path::Path;

use csv::Writer as CsvWriter;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::evaluator::ForecastMetrics;
use crate::model::{AlignedRow, EquilibriumRow};
use crate::simulator::{PerformanceSummary, PortfolioSeries};
use crate::walk_forward::SkippedDate;

/// Everything a finished run exports, keyed by date.
#[derive(Debug, Clone, Copy)]
pub struct RunArtifacts<'a> {
    pub run_id: Uuid,
    pub metals: &'a [String],
    pub aligned: &'a [AlignedRow],
    pub metrics: &'a ForecastMetrics,
    pub equilibrium: &'a [EquilibriumRow],
    pub portfolio: &'a PortfolioSeries,
    pub summary: &'a PerformanceSummary,
    pub skipped: &'a [SkippedDate],
    pub total_rebalances: usize,
    pub fallback_count: usize,
}

const DETERMINISTIC_LABEL: &str = "deterministic";

fn opt_metal(values: Option<&Vec<f64>>, j: usize) -> Option<f64> {
    values.and_then(|v| v.get(j).copied())
}

pub fn persist_run_sqlite(path: &Path, run: &RunArtifacts<'_>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS runs (
            run_id TEXT PRIMARY KEY,
            created_at_ms INTEGER NOT NULL,
            metals TEXT NOT NULL,
            total_rebalances INTEGER NOT NULL,
            fallback_count INTEGER NOT NULL,
            skipped_count INTEGER NOT NULL,
            sharpe REAL,
            max_drawdown REAL NOT NULL,
            final_value REAL NOT NULL,
            binomial_p_value REAL
        );

        CREATE TABLE IF NOT EXISTS aligned_forecasts (
            run_id TEXT NOT NULL,
            date TEXT NOT NULL,
            metal TEXT NOT NULL,
            family TEXT NOT NULL,
            current REAL NOT NULL,
            forecast REAL NOT NULL,
            realized_date TEXT,
            realized REAL,
            volatility REAL NOT NULL,
            expected_change REAL NOT NULL,
            actual_change REAL,
            PRIMARY KEY(run_id, date, metal)
        );

        CREATE TABLE IF NOT EXISTS forecast_metrics (
            run_id TEXT NOT NULL,
            metal TEXT NOT NULL,
            samples INTEGER NOT NULL,
            rmse REAL,
            naive_rmse REAL,
            direction_hits INTEGER NOT NULL,
            direction_total INTEGER NOT NULL,
            directional_accuracy REAL,
            zero_change_expected TEXT NOT NULL,
            PRIMARY KEY(run_id, metal)
        );

        CREATE TABLE IF NOT EXISTS equilibrium_vectors (
            run_id TEXT NOT NULL,
            date TEXT NOT NULL,
            term TEXT NOT NULL,
            coefficient REAL NOT NULL,
            fresh INTEGER NOT NULL,
            PRIMARY KEY(run_id, date, term)
        );

        CREATE TABLE IF NOT EXISTS portfolio_series (
            run_id TEXT NOT NULL,
            date TEXT NOT NULL,
            cash REAL NOT NULL,
            value REAL NOT NULL,
            holdings TEXT NOT NULL,
            trades TEXT NOT NULL,
            PRIMARY KEY(run_id, date)
        );

        CREATE TABLE IF NOT EXISTS skipped_dates (
            run_id TEXT NOT NULL,
            date TEXT NOT NULL,
            kind TEXT NOT NULL,
            message TEXT NOT NULL,
            PRIMARY KEY(run_id, date)
        );
        "#,
    )?;

    let run_id = run.run_id.to_string();
    let now_ms = chrono::Utc::now().timestamp_millis();
    let tx = conn.transaction()?;

    tx.execute(
        r#"
        INSERT INTO runs (
            run_id, created_at_ms, metals, total_rebalances, fallback_count,
            skipped_count, sharpe, max_drawdown, final_value, binomial_p_value
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            run_id,
            now_ms,
            serde_json::to_string(run.metals)?,
            run.total_rebalances as i64,
            run.fallback_count as i64,
            run.skipped.len() as i64,
            run.summary.sharpe,
            run.summary.max_drawdown,
            run.summary.final_value,
            run.metrics.binomial_p_value,
        ],
    )?;

    for row in run.aligned {
        let expected = row.expected_change();
        let actual = row.actual_change();
        for (j, metal) in run.metals.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO aligned_forecasts (
                    run_id, date, metal, family, current, forecast, realized_date,
                    realized, volatility, expected_change, actual_change
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    run_id,
                    row.date.to_string(),
                    metal,
                    row.family.as_str(),
                    row.current[j],
                    row.forecast[j],
                    row.realized_date.map(|d| d.to_string()),
                    opt_metal(row.realized.as_ref(), j),
                    row.volatility[j],
                    expected[j],
                    opt_metal(actual.as_ref(), j),
                ],
            )?;
        }
    }

    for m in &run.metrics.per_metal {
        tx.execute(
            r#"
            INSERT INTO forecast_metrics (
                run_id, metal, samples, rmse, naive_rmse, direction_hits,
                direction_total, directional_accuracy, zero_change_expected
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                run_id,
                m.metal,
                m.samples as i64,
                m.rmse,
                m.naive_rmse,
                m.direction_hits as i64,
                m.direction_total as i64,
                m.directional_accuracy,
                serde_json::to_string(&m.zero_change_expected)?,
            ],
        )?;
    }

    for row in run.equilibrium {
        let terms = run
            .metals
            .iter()
            .map(String::as_str)
            .zip(row.vector.coefficients.iter().copied())
            .chain(
                row.vector
                    .deterministic
                    .map(|d| (DETERMINISTIC_LABEL, d)),
            );
        for (term, coefficient) in terms {
            tx.execute(
                r#"
                INSERT INTO equilibrium_vectors (run_id, date, term, coefficient, fresh)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![run_id, row.date.to_string(), term, coefficient, row.fresh],
            )?;
        }
    }

    for p in &run.portfolio.points {
        tx.execute(
            r#"
            INSERT INTO portfolio_series (run_id, date, cash, value, holdings, trades)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                run_id,
                p.date.to_string(),
                p.cash,
                p.value(),
                serde_json::to_string(&p.holdings)?,
                serde_json::to_string(&p.trades)?,
            ],
        )?;
    }

    for s in run.skipped {
        tx.execute(
            r#"
            INSERT INTO skipped_dates (run_id, date, kind, message)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![run_id, s.date.to_string(), s.kind, s.message],
        )?;
    }

    tx.commit()?;
    tracing::info!(path = %path.display(), run_id = %run.run_id, "Run persisted to sqlite");
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Four CSV tables under `dir`, file names prefixed with the run id.
pub fn write_run_csv(dir: &Path, run: &RunArtifacts<'_>) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let prefix = run.run_id.to_string();

    let mut wtr = CsvWriter::from_path(dir.join(format!("{}_aligned.csv", prefix)))?;
    wtr.write_record([
        "date",
        "metal",
        "family",
        "current",
        "forecast",
        "realized",
        "volatility",
        "expected_change",
        "actual_change",
    ])?;
    for row in run.aligned {
        let expected = row.expected_change();
        let actual = row.actual_change();
        for (j, metal) in run.metals.iter().enumerate() {
            wtr.write_record([
                row.date.to_string(),
                metal.clone(),
                row.family.as_str().to_string(),
                row.current[j].to_string(),
                row.forecast[j].to_string(),
                fmt_opt(opt_metal(row.realized.as_ref(), j)),
                row.volatility[j].to_string(),
                expected[j].to_string(),
                fmt_opt(opt_metal(actual.as_ref(), j)),
            ])?;
        }
    }
    wtr.flush()?;

    let mut wtr = CsvWriter::from_path(dir.join(format!("{}_metrics.csv", prefix)))?;
    wtr.write_record([
        "metal",
        "samples",
        "rmse",
        "naive_rmse",
        "direction_hits",
        "direction_total",
        "directional_accuracy",
    ])?;
    for m in &run.metrics.per_metal {
        wtr.write_record([
            m.metal.clone(),
            m.samples.to_string(),
            fmt_opt(m.rmse),
            fmt_opt(m.naive_rmse),
            m.direction_hits.to_string(),
            m.direction_total.to_string(),
            fmt_opt(m.directional_accuracy),
        ])?;
    }
    wtr.flush()?;

    let mut wtr = CsvWriter::from_path(dir.join(format!("{}_equilibrium.csv", prefix)))?;
    let mut header = vec!["date".to_string(), "fresh".to_string()];
    header.extend(run.metals.iter().cloned());
    header.push(DETERMINISTIC_LABEL.to_string());
    wtr.write_record(&header)?;
    for row in run.equilibrium {
        let mut rec = vec![row.date.to_string(), row.fresh.to_string()];
        rec.extend(row.vector.coefficients.iter().map(|c| c.to_string()));
        rec.push(fmt_opt(row.vector.deterministic));
        wtr.write_record(&rec)?;
    }
    wtr.flush()?;

    let mut wtr = CsvWriter::from_path(dir.join(format!("{}_portfolio.csv", prefix)))?;
    let mut header = vec!["date".to_string(), "cash".to_string(), "value".to_string()];
    header.extend(run.metals.iter().map(|m| format!("{}_holdings", m)));
    header.extend(run.metals.iter().map(|m| format!("{}_trade", m)));
    wtr.write_record(&header)?;
    for p in &run.portfolio.points {
        let mut rec = vec![p.date.to_string(), p.cash.to_string(), p.value().to_string()];
        rec.extend(p.holdings.iter().map(|h| h.to_string()));
        rec.extend(p.trades.iter().map(|t| t.to_string()));
        wtr.write_record(&rec)?;
    }
    wtr.flush()?;

    tracing::info!(dir = %dir.display(), run_id = %run.run_id, "Run written to csv");
    Ok(())
}
