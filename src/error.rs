//! Error types for Sleep Insights

use thiserror::Error;

/// Errors that can occur at the crate boundary.
///
/// The analysis stages never fail: malformed fields degrade to absent values.
/// Only whole documents that cannot be read, and invalid configuration, surface here.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid config file: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Invalid habit value: {0}")]
    InvalidHabitValue(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, InsightError>;
