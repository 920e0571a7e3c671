use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid source URL '{url}': {reason}")]
    InvalidSourceUrl { url: String, reason: String },

    #[error("Malformed row {index}: expected {expected} fields, found {found}")]
    MalformedRow {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Source download failed with HTTP status {0}")]
    DownloadStatus(u16),

    #[error("Pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Outcome aggregator stopped before signalling completion")]
    AggregatorLost,
}

pub type Result<T> = std::result::Result<T, ProcessorError>;
