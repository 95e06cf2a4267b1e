use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("invalid price data for {metal} at {date}: {reason}")]
    InvalidPriceData {
        metal: String,
        date: String,
        reason: String,
    },

    #[error("insufficient window data at {as_of}: have {rows} rows, need at least {required}")]
    InsufficientWindowData {
        as_of: NaiveDate,
        rows: usize,
        required: usize,
    },

    #[error("singular fit at {as_of} during {stage}")]
    SingularFit { as_of: NaiveDate, stage: String },

    #[error("no realized value {horizon} trading days after {as_of}")]
    MisalignedDates { as_of: NaiveDate, horizon: usize },

    #[error("rank test supports at most {max} series, got {got}")]
    UnsupportedDimension { got: usize, max: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForecastError {
    /// Whether the error must abort the whole run regardless of the skip policy.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InsufficientWindowData { .. }
            | Self::SingularFit { .. }
            | Self::MisalignedDates { .. } => false,
            Self::InvalidPriceData { .. }
            | Self::UnsupportedDimension { .. }
            | Self::Config(_)
            | Self::Io(_)
            | Self::Csv(_)
            | Self::Sqlite(_)
            | Self::Json(_) => true,
        }
    }

    /// Stable label used in skip reports and persisted run tables.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPriceData { .. } => "invalid_price_data",
            Self::InsufficientWindowData { .. } => "insufficient_window_data",
            Self::SingularFit { .. } => "singular_fit",
            Self::MisalignedDates { .. } => "misaligned_dates",
            Self::UnsupportedDimension { .. } => "unsupported_dimension",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Csv(_) => "csv",
            Self::Sqlite(_) => "sqlite",
            Self::Json(_) => "json",
        }
    }

    pub(crate) fn singular(as_of: NaiveDate, stage: &str) -> Self {
        Self::SingularFit {
            as_of,
            stage: stage.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
