//! Domain error types.

use chrono::NaiveDateTime;

/// Top-level error type for evotrader.
#[derive(Debug, thiserror::Error)]
pub enum EvotraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid strategy: {reason}")]
    InvalidStrategy { reason: String },

    #[error("market window is empty")]
    EmptyWindow,

    #[error("no price available at {timestamp}")]
    PriceUnavailable { timestamp: NaiveDateTime },

    #[error("unusable price {price} at {timestamp}")]
    InvalidPrice {
        timestamp: NaiveDateTime,
        price: f64,
    },

    #[error("market data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EvotraderError> for std::process::ExitCode {
    fn from(err: &EvotraderError) -> Self {
        let code: u8 = match err {
            EvotraderError::Io(_) => 1,
            EvotraderError::ConfigParse { .. }
            | EvotraderError::ConfigMissing { .. }
            | EvotraderError::ConfigInvalid { .. } => 2,
            EvotraderError::Data { .. } => 3,
            EvotraderError::InvalidStrategy { .. } | EvotraderError::Snapshot(_) => 4,
            EvotraderError::EmptyWindow
            | EvotraderError::PriceUnavailable { .. }
            | EvotraderError::InvalidPrice { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
