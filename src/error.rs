//! Error types for validation, transport and construction

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UploaderError>;

/// Errors that keep an [`crate::UploadQueue`] from being built.
#[derive(Error, Debug)]
pub enum UploaderError {
    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),
    #[error("Invalid allowedTypes pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Why a candidate file was kept out of the queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("file is {size} bytes, limit is {max}")]
    FileTooLarge { size: u64, max: u64 },
    #[error("type '{mime_type}' is not allowed")]
    DisallowedType { mime_type: String },
    #[error("extension '{extension}' is not allowed")]
    DisallowedExtension { extension: String },
    #[error("queue already holds {max} files")]
    QueueFull { max: usize },
}

/// Terminal failure of a single upload.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Upload failed: {status} - {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}
