use thiserror::Error;

/// Errors emitted while exporting, importing or comparing statistics.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("invalid statistics: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StatsError>;
