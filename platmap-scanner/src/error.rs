use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Malformed map identifier: {0}")]
    MalformedIdentifier(String),

    #[error("Document {0} does not exist on the server")]
    DocumentAbsent(String),

    #[error("Fetch failed for {id}: {reason}")]
    FetchFailed { id: String, reason: String },

    #[error("No extraction strategy produced usable text")]
    ExtractionEmpty,

    #[error("Extraction strategy {strategy} failed: {reason}")]
    StrategyFailed {
        strategy: &'static str,
        reason: String,
    },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
