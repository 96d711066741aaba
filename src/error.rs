use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported input format: {0} (expected .csv or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("No input files given, pass --nfl and/or --cfb")]
    NoInput,

    #[error("No game matching \"{0}\"")]
    GameNotFound(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
