use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid file format '{extension}'. Accepted: {accepted}")]
    UnsupportedFormat { extension: String, accepted: String },

    #[error("File exceeds {limit_mb}MB limit. Current size: {size_mb:.2}MB")]
    FileTooLarge { size_mb: f64, limit_mb: u64 },

    #[error("No data found in file")]
    EmptyFile,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("API Error ({status}): {body}")]
    RemoteServiceError { status: u16, body: String },

    #[error("Invalid response format from API: {0}")]
    InvalidResponseShape(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        Self::MalformedInput(detail.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
