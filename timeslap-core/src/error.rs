use thiserror::Error;

/// Custom error types for timeslap-core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid aspect ratio: {0}")]
    RatioParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to start encoder process: {0}")]
    ProcessStart(String),

    #[error("Encoder process error: {0}")]
    Process(String),
}

/// Result type for timeslap-core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;
