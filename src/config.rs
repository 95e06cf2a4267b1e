use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::selector::{RankStatistic, MAX_CANDIDATE_LAG};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "BASKET_QUANT_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub walk_forward: WalkForwardConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub prices_path: PathBuf,
    pub metals: Vec<String>,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitErrorPolicy {
    /// Record the date as skipped and keep going.
    #[default]
    Skip,
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalkForwardConfig {
    pub window_length_months: u32,
    pub prediction_horizon_days: usize,
    #[serde(default)]
    pub run_start: Option<NaiveDate>,
    #[serde(default)]
    pub run_end: Option<NaiveDate>,
    #[serde(default = "default_max_lag")]
    pub max_lag: usize,
    #[serde(default)]
    pub rank_statistic: RankStatistic,
    #[serde(default)]
    pub on_fit_error: FitErrorPolicy,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    pub base_size: f64,
    pub base_change: f64,
    #[serde(default)]
    pub annual_risk_free_rate: f64,
    #[serde(default = "default_trading_days")]
    pub trading_days_per_year: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    #[serde(default)]
    pub csv_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

fn default_date_column() -> String {
    "date".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_max_lag() -> usize {
    MAX_CANDIDATE_LAG
}

fn default_true() -> bool {
    true
}

fn default_trading_days() -> f64 {
    252.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load from `path`, else `$BASKET_QUANT_CONFIG`, else `config/default.toml`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };
        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config = Self::from_toml(&config_str)
            .with_context(|| format!("invalid config {}", config_path.display()))?;
        Ok(config)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let metals = &self.data.metals;
        if metals.len() < 2 {
            bail!("data.metals needs at least 2 entries, got {}", metals.len());
        }
        let mut seen = HashSet::new();
        for m in metals {
            if m.trim().is_empty() {
                bail!("data.metals contains an empty name");
            }
            if !seen.insert(m.as_str()) {
                bail!("data.metals contains '{}' twice", m);
            }
        }

        let wf = &self.walk_forward;
        if wf.window_length_months == 0 {
            bail!("walk_forward.window_length_months must be >= 1");
        }
        if wf.prediction_horizon_days == 0 {
            bail!("walk_forward.prediction_horizon_days must be >= 1");
        }
        if !(2..=MAX_CANDIDATE_LAG).contains(&wf.max_lag) {
            bail!(
                "walk_forward.max_lag must be in 2..={}, got {}",
                MAX_CANDIDATE_LAG,
                wf.max_lag
            );
        }
        if let (Some(start), Some(end)) = (wf.run_start, wf.run_end) {
            if start > end {
                bail!("walk_forward.run_start {} is after run_end {}", start, end);
            }
        }

        let tr = &self.trading;
        if !tr.base_size.is_finite() || tr.base_size <= 0.0 {
            bail!("trading.base_size must be > 0, got {}", tr.base_size);
        }
        if !tr.base_change.is_finite() || tr.base_change < 0.5 {
            bail!("trading.base_change must be >= 0.5, got {}", tr.base_change);
        }
        if !tr.annual_risk_free_rate.is_finite() || tr.annual_risk_free_rate <= -1.0 {
            bail!(
                "trading.annual_risk_free_rate must be > -1, got {}",
                tr.annual_risk_free_rate
            );
        }
        if !tr.trading_days_per_year.is_finite() || tr.trading_days_per_year <= 0.0 {
            bail!("trading.trading_days_per_year must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[data]
prices_path = "data/metals.csv"
metals = ["lithium", "cobalt", "nickel", "manganese", "copper"]

[walk_forward]
window_length_months = 12
prediction_horizon_days = 5
run_start = "2019-01-02"
run_end = "2021-12-31"

[trading]
base_size = 1000.0
base_change = 1.0
annual_risk_free_rate = 0.05

[output]
sqlite_path = "out/runs.sqlite"

[logging]
level = "debug"
"#;

    #[test]
    fn parse_sample_toml() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.data.metals.len(), 5);
        assert_eq!(config.data.date_column, "date");
        assert_eq!(config.data.date_format, "%Y-%m-%d");
        assert_eq!(config.walk_forward.window_length_months, 12);
        assert_eq!(config.walk_forward.max_lag, 15);
        assert_eq!(config.walk_forward.rank_statistic, RankStatistic::Trace);
        assert_eq!(config.walk_forward.on_fit_error, FitErrorPolicy::Skip);
        assert!(config.walk_forward.parallel);
        assert_eq!(
            config.walk_forward.run_start,
            NaiveDate::from_ymd_opt(2019, 1, 2)
        );
        assert!((config.trading.trading_days_per_year - 252.0).abs() < f64::EPSILON);
        assert!(config.output.csv_dir.is_none());
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json);
    }

    #[test]
    fn parse_rank_statistic_and_policy() {
        let s = SAMPLE.replace(
            "prediction_horizon_days = 5",
            "prediction_horizon_days = 5\nrank_statistic = \"max_eigen\"\non_fit_error = \"abort\"\nparallel = false",
        );
        let config = Config::from_toml(&s).unwrap();
        assert_eq!(config.walk_forward.rank_statistic, RankStatistic::MaxEigen);
        assert_eq!(config.walk_forward.on_fit_error, FitErrorPolicy::Abort);
        assert!(!config.walk_forward.parallel);
    }

    #[test]
    fn rejects_small_base_change() {
        let s = SAMPLE.replace("base_change = 1.0", "base_change = 0.25");
        assert!(Config::from_toml(&s).is_err());
    }

    #[test]
    fn rejects_single_metal_and_duplicates() {
        let single = SAMPLE.replace(
            r#"["lithium", "cobalt", "nickel", "manganese", "copper"]"#,
            r#"["lithium"]"#,
        );
        assert!(Config::from_toml(&single).is_err());
        let dup = SAMPLE.replace(
            r#"["lithium", "cobalt", "nickel", "manganese", "copper"]"#,
            r#"["lithium", "cobalt", "lithium"]"#,
        );
        assert!(Config::from_toml(&dup).is_err());
    }

    #[test]
    fn rejects_max_lag_outside_candidate_range() {
        let with_lag = |lag: usize| {
            SAMPLE.replace(
                "prediction_horizon_days = 5",
                &format!("prediction_horizon_days = 5\nmax_lag = {}", lag),
            )
        };
        assert!(Config::from_toml(&with_lag(15)).is_ok());
        assert!(Config::from_toml(&with_lag(2)).is_ok());
        assert!(Config::from_toml(&with_lag(16)).is_err());
        assert!(Config::from_toml(&with_lag(1)).is_err());
    }

    #[test]
    fn rejects_inverted_run_range_and_zero_horizon() {
        let inverted = SAMPLE.replace("run_end = \"2021-12-31\"", "run_end = \"2018-12-31\"");
        assert!(Config::from_toml(&inverted).is_err());
        let zero = SAMPLE.replace("prediction_horizon_days = 5", "prediction_horizon_days = 0");
        assert!(Config::from_toml(&zero).is_err());
    }
}
