use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Missing capability '{capability}': {hint}")]
    MissingCapability {
        capability: &'static str,
        hint: &'static str,
    },

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Forecast model error: {0}")]
    Model(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Ingestion error on line {line}: {details}")]
    Ingestion { line: u64, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Forecast did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    /// Whether retrying the same call may succeed. Missing capabilities,
    /// bad configuration and malformed input are fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalyticsError::Store(_) | AnalyticsError::Timeout(_) | AnalyticsError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
