//! Transport error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid proxy URL: {0}")]
    InvalidProxy(String),

    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub type TransportResult<T> = Result<T, TransportError>;
