use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoinPulseError {
    #[error("Failed to fetch {what}: {reason}")]
    FetchFailed { what: &'static str, reason: String },

    #[error("Invalid alert threshold: {0} (must be a positive number)")]
    InvalidThreshold(f64),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoinPulseError {
    pub fn fetch(what: &'static str, reason: impl ToString) -> Self {
        CoinPulseError::FetchFailed {
            what,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoinPulseError>;
