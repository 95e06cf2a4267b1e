use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use basket_quant::backtest::{run_backtest, BacktestReport};
use basket_quant::config::{Config, LoggingConfig};
use basket_quant::preprocess::log_prices;
use basket_quant::price_file::{load_price_file, PriceFileLayout};
use basket_quant::run_store::{persist_run_sqlite, write_run_csv};

#[derive(Parser, Debug)]
#[command(name = "basket-quant")]
#[command(about = "Walk-forward cointegration forecasts and portfolio simulation for a metals basket")]
struct Cli {
    /// Config file (defaults to $BASKET_QUANT_CONFIG, then config/default.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Price CSV, overriding data.prices_path
    #[arg(long)]
    prices: Option<PathBuf>,

    /// Validate config and price panel, then exit
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(logging.file.is_none());
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn print_report(report: &BacktestReport) {
    println!("run {}", report.run_id);
    if let Some(d) = &report.diagnostic {
        println!(
            "full history: {} rows, lag {} (aic {}), nrel {}, model {}",
            d.rows,
            d.working_lag,
            d.aic_lag,
            d.selection.nrel(),
            d.family.as_str()
        );
    }
    let o = &report.outcome;
    println!(
        "rebalances {} | skipped {} | fallback {:.1}%",
        o.total_rebalances,
        o.skipped.len(),
        o.fallback_fraction().unwrap_or(0.0) * 100.0
    );
    for m in &report.metrics.per_metal {
        println!(
            "{:<12} rmse {:>9} naive {:>9} accuracy {:>6} ({}/{})",
            m.metal,
            m.rmse.map_or("-".to_string(), |v| format!("{:.5}", v)),
            m.naive_rmse.map_or("-".to_string(), |v| format!("{:.5}", v)),
            m.directional_accuracy
                .map_or("-".to_string(), |v| format!("{:.3}", v)),
            m.direction_hits,
            m.direction_total
        );
    }
    println!(
        "binomial p-value {}",
        report
            .metrics
            .binomial_p_value
            .map_or("-".to_string(), |v| format!("{:.4}", v))
    );
    let s = &report.summary;
    println!(
        "sharpe {} | final value {:.2} | max drawdown {:.2}",
        s.sharpe.map_or("-".to_string(), |v| format!("{:.3}", v)),
        s.final_value,
        s.max_drawdown
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging)?;

    let prices_path = cli
        .prices
        .clone()
        .unwrap_or_else(|| config.data.prices_path.clone());
    tracing::info!(
        prices = %prices_path.display(),
        metals = ?config.data.metals,
        window_months = config.walk_forward.window_length_months,
        horizon = config.walk_forward.prediction_horizon_days,
        "Starting basket-quant"
    );

    let layout = PriceFileLayout {
        date_column: config.data.date_column.clone(),
        date_format: config.data.date_format.clone(),
        metals: config.data.metals.clone(),
    };
    let panel = load_price_file(&prices_path, &layout)
        .with_context(|| format!("failed to load prices from {}", prices_path.display()))?;
    let log_panel = log_prices(&panel);

    if cli.dry_run {
        println!(
            "config ok, {} rows x {} metals from {} to {}",
            log_panel.len(),
            log_panel.metals().len(),
            log_panel.dates().first().map(|d| d.to_string()).unwrap_or_default(),
            log_panel.dates().last().map(|d| d.to_string()).unwrap_or_default()
        );
        return Ok(());
    }

    let report = run_backtest(&log_panel, &config).context("backtest aborted")?;

    if let Some(path) = &config.output.sqlite_path {
        persist_run_sqlite(path, &report.artifacts())
            .with_context(|| format!("failed to persist run to {}", path.display()))?;
    }
    if let Some(dir) = &config.output.csv_dir {
        write_run_csv(dir, &report.artifacts())
            .with_context(|| format!("failed to write csv to {}", dir.display()))?;
    }

    print_report(&report);
    Ok(())
}
