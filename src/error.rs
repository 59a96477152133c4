use thiserror::Error;

/// Main error type for the market-state engine.
///
/// Classification itself never fails: absent inputs become typed "missing"
/// markers and unresolved cases fall back to the conservative label. These
/// variants only cover the outer surface (configuration, input files, label
/// parsing).
#[derive(Error, Debug)]
pub enum MarketStateError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Input errors
    #[error("Invalid {kind} label: {value}")]
    InvalidLabel { kind: &'static str, value: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for MarketStateError
pub type Result<T> = std::result::Result<T, MarketStateError>;

impl MarketStateError {
    pub(crate) fn invalid_label(kind: &'static str, value: &str) -> Self {
        MarketStateError::InvalidLabel {
            kind,
            value: value.to_string(),
        }
    }
}
